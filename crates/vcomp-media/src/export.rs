//! Platform Exporter.
//!
//! Re-encodes an approved master for each distribution profile and checks
//! the result against the profile. Compliance is advisory: a failed check is
//! a warning on the report, never an error.

use futures::future::join_all;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::fill_crop;
use crate::probe::{probe_video, VideoInfo};
use crate::render::cleanup_file;
use vcomp_models::{PlatformProfile, Resolution};

/// Default number of concurrent platform encodes.
pub const DEFAULT_EXPORT_CONCURRENCY: usize = 3;

/// Slack on the duration check, covering container rounding.
const DURATION_SLACK_SECS: f64 = 0.1;

/// One failed compliance check.
#[derive(Debug, Clone, PartialEq)]
pub enum ComplianceIssue {
    ResolutionMismatch { expected: Resolution, actual: Resolution },
    FrameRateOutOfTolerance { expected: u32, actual: f64 },
    FileTooLarge { limit: u64, actual: u64 },
    DurationExceeded { limit: f64, actual: f64 },
}

impl fmt::Display for ComplianceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResolutionMismatch { expected, actual } => {
                write!(f, "resolution {} does not match {}", actual, expected)
            }
            Self::FrameRateOutOfTolerance { expected, actual } => {
                write!(f, "frame rate {:.2} outside ±10% of {}", actual, expected)
            }
            Self::FileTooLarge { limit, actual } => {
                write!(f, "file size {} bytes exceeds {} bytes", actual, limit)
            }
            Self::DurationExceeded { limit, actual } => {
                write!(f, "duration {:.2}s exceeds {:.2}s", actual, limit)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplianceStatus {
    Compliant,
    Warning,
}

/// Result of checking an exported file against its profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceReport {
    pub status: ComplianceStatus,
    pub issues: Vec<ComplianceIssue>,
}

impl ComplianceReport {
    /// Check probed output properties against `profile`.
    pub fn check(info: &VideoInfo, profile: &PlatformProfile) -> Self {
        let mut issues = Vec::new();

        let actual = info.resolution();
        if actual != profile.resolution {
            issues.push(ComplianceIssue::ResolutionMismatch {
                expected: profile.resolution,
                actual,
            });
        }

        let (min_fps, max_fps) = profile.fps_tolerance();
        if info.fps < min_fps || info.fps > max_fps {
            issues.push(ComplianceIssue::FrameRateOutOfTolerance {
                expected: profile.fps,
                actual: info.fps,
            });
        }

        if info.size > profile.max_file_size {
            issues.push(ComplianceIssue::FileTooLarge {
                limit: profile.max_file_size,
                actual: info.size,
            });
        }

        if info.duration > profile.max_duration + DURATION_SLACK_SECS {
            issues.push(ComplianceIssue::DurationExceeded {
                limit: profile.max_duration,
                actual: info.duration,
            });
        }

        let status = if issues.is_empty() {
            ComplianceStatus::Compliant
        } else {
            ComplianceStatus::Warning
        };
        Self { status, issues }
    }

    pub fn is_compliant(&self) -> bool {
        self.status == ComplianceStatus::Compliant
    }

    /// Issues as display strings.
    pub fn issue_messages(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }
}

/// A platform-specific file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutput {
    pub profile: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub compliance: ComplianceReport,
}

/// Per-profile outcome of a batch export.
#[derive(Debug)]
pub struct ExportResult {
    pub profile: String,
    pub result: MediaResult<ExportOutput>,
}

/// Encodes masters for platform profiles.
#[derive(Debug, Clone)]
pub struct PlatformExporter {
    preset: String,
    timeout_secs: u64,
    concurrency: usize,
}

impl Default for PlatformExporter {
    fn default() -> Self {
        Self {
            preset: vcomp_models::encoding::DEFAULT_PRESET.to_string(),
            timeout_secs: 600,
            concurrency: DEFAULT_EXPORT_CONCURRENCY,
        }
    }
}

impl PlatformExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Build the export command for a master of `master_duration` seconds.
    pub fn build_command(
        &self,
        master: &Path,
        master_duration: f64,
        profile: &PlatformProfile,
        output: &Path,
    ) -> FfmpegCommand {
        let Resolution { width, height } = profile.resolution;
        let filter = format!("{},fps={},setsar=1", fill_crop(width, height), profile.fps);

        let mut rate_args = vec![
            "-b:v".to_string(),
            profile.video_bitrate.clone(),
            "-maxrate".to_string(),
            profile.video_bitrate.clone(),
        ];
        if let Some(bps) = profile.video_bitrate_bps() {
            rate_args.push("-bufsize".to_string());
            rate_args.push((bps * 2).to_string());
        }

        let mut cmd = FfmpegCommand::new(master, output)
            .video_filter(filter)
            .video_codec(&profile.video_codec)
            .output_args(["-preset", self.preset.as_str()])
            .output_args(rate_args)
            .output_args(["-r".to_string(), profile.fps.to_string()])
            .pixel_format("yuv420p")
            .audio_codec(&profile.audio_codec)
            .output_args(["-b:a", profile.audio_bitrate.as_str()])
            .output_args(["-movflags", "+faststart"]);

        if master_duration > profile.max_duration {
            cmd = cmd.duration(profile.max_duration);
        }
        cmd
    }

    /// Export `master` for one profile into `export_dir`.
    pub async fn export(
        &self,
        master: &Path,
        profile: &PlatformProfile,
        export_dir: &Path,
    ) -> MediaResult<ExportOutput> {
        if !master.exists() {
            return Err(MediaError::FileNotFound(master.to_path_buf()));
        }
        tokio::fs::create_dir_all(export_dir).await?;

        let master_info = probe_video(master).await?;
        let stem = master
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let output = export_dir.join(profile.output_name(&stem));

        if master_info.duration > profile.max_duration {
            info!(
                profile = %profile.id,
                duration = master_info.duration,
                max_duration = profile.max_duration,
                "Truncating master to profile limit"
            );
        }

        let cmd = self.build_command(master, master_info.duration, profile, &output);
        if let Err(e) = FfmpegRunner::new()
            .with_timeout(self.timeout_secs)
            .run(&cmd)
            .await
        {
            cleanup_file(&output).await;
            return Err(e);
        }

        let exported = probe_video(&output).await?;
        let compliance = ComplianceReport::check(&exported, profile);
        for issue in &compliance.issues {
            warn!(profile = %profile.id, issue = %issue, "Export compliance warning");
        }

        info!(
            profile = %profile.id,
            output = %output.display(),
            compliant = compliance.is_compliant(),
            "Export complete"
        );

        Ok(ExportOutput {
            profile: profile.id.clone(),
            path: output,
            size_bytes: exported.size,
            compliance,
        })
    }

    /// Export `master` for every profile on a bounded pool.
    ///
    /// Results come back in profile order; one failed export does not
    /// cancel the others.
    pub async fn export_all(
        &self,
        master: &Path,
        profiles: &[PlatformProfile],
        export_dir: &Path,
    ) -> Vec<ExportResult> {
        let permits = Arc::new(Semaphore::new(self.concurrency));

        let futures: Vec<_> = profiles
            .iter()
            .map(|profile| {
                let permits = Arc::clone(&permits);
                async move {
                    let result = match permits.acquire().await {
                        Ok(_permit) => self.export(master, profile, export_dir).await,
                        Err(_) => Err(MediaError::internal("export pool closed")),
                    };
                    if let Err(e) = &result {
                        warn!(profile = %profile.id, error = %e, "Export failed");
                    }
                    ExportResult {
                        profile: profile.id.clone(),
                        result,
                    }
                }
            })
            .collect();

        join_all(futures).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn info(width: u32, height: u32, fps: f64, size: u64, duration: f64) -> VideoInfo {
        VideoInfo {
            duration,
            width,
            height,
            fps,
            codec: "h264".to_string(),
            size,
            bitrate: 0,
            video_duration: Some(duration),
            audio_duration: Some(duration),
            has_audio: true,
        }
    }

    #[test]
    fn test_compliant_export() {
        let profile = PlatformProfile::builtin("youtube_shorts").unwrap();
        let report = ComplianceReport::check(&info(1080, 1920, 30.0, 10_000_000, 45.0), &profile);
        assert!(report.is_compliant());
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_every_issue_reported() {
        let profile = PlatformProfile::builtin("youtube_shorts").unwrap();
        let report =
            ComplianceReport::check(&info(720, 1280, 24.0, 300 * 1024 * 1024, 75.0), &profile);
        assert_eq!(report.status, ComplianceStatus::Warning);
        assert_eq!(report.issues.len(), 4);
        assert!(matches!(report.issues[0], ComplianceIssue::ResolutionMismatch { .. }));
        assert!(matches!(report.issues[1], ComplianceIssue::FrameRateOutOfTolerance { .. }));
        assert!(matches!(report.issues[2], ComplianceIssue::FileTooLarge { .. }));
        assert!(matches!(report.issues[3], ComplianceIssue::DurationExceeded { .. }));
        assert_eq!(report.issue_messages()[0], "resolution 720x1280 does not match 1080x1920");
    }

    #[test]
    fn test_frame_rate_tolerance() {
        let profile = PlatformProfile::builtin("tiktok").unwrap();
        assert!(ComplianceReport::check(&info(1080, 1920, 32.5, 1, 10.0), &profile).is_compliant());
        assert!(!ComplianceReport::check(&info(1080, 1920, 34.0, 1, 10.0), &profile).is_compliant());
    }

    #[test]
    fn test_export_command_truncates_long_master() {
        let profile = PlatformProfile::builtin("youtube_shorts").unwrap();
        let exporter = PlatformExporter::new();

        let args = exporter
            .build_command(Path::new("final.mp4"), 75.0, &profile, Path::new("final_youtube_shorts.mp4"))
            .build_args()
            .join(" ");
        assert!(args.contains(
            "-vf scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920,fps=30,setsar=1"
        ));
        assert!(args.contains("-b:v 8M -maxrate 8M -bufsize 16000000"));
        assert!(args.contains("-t 60.000"));
        assert!(args.contains("-movflags +faststart"));

        let short = exporter
            .build_command(Path::new("final.mp4"), 30.0, &profile, Path::new("out.mp4"))
            .build_args();
        assert!(!short.contains(&"-t".to_string()));
    }

    #[test]
    fn test_concurrency_floor() {
        assert_eq!(PlatformExporter::new().concurrency(), 3);
        assert_eq!(PlatformExporter::new().with_concurrency(0).concurrency(), 1);
    }

    #[tokio::test]
    async fn test_export_all_reports_each_failure() {
        let dir = TempDir::new().unwrap();
        let master = dir.path().join("missing.mp4");
        let profiles = PlatformProfile::builtins();

        let results = PlatformExporter::new()
            .export_all(&master, &profiles, dir.path())
            .await;

        assert_eq!(results.len(), profiles.len());
        for (result, profile) in results.iter().zip(&profiles) {
            assert_eq!(result.profile, profile.id);
            assert!(matches!(result.result, Err(MediaError::FileNotFound(_))));
        }
    }
}
