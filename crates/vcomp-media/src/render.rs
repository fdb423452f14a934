//! Renderer: one FFmpeg encode of a composed timeline.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::compose::ComposedTimeline;
use crate::error::{MediaError, MediaResult};
use vcomp_models::RenderSettings;

/// A finished encode.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub elapsed: Duration,
}

/// Encodes composed timelines with fixed settings.
#[derive(Debug, Clone)]
pub struct Renderer {
    settings: RenderSettings,
}

impl Renderer {
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Build the encode command for `timeline`.
    pub fn build_command(&self, timeline: &ComposedTimeline, output: &Path) -> FfmpegCommand {
        FfmpegCommand::with_inputs(timeline.inputs.clone(), output)
            .filter_complex(&timeline.filter_graph)
            .map(format!("[{}]", timeline.video_label))
            .map(format!("{}:a:0", timeline.audio_input))
            .output_args(self.settings.to_ffmpeg_args())
            .duration(timeline.duration)
    }

    /// Render `timeline` to `output`.
    ///
    /// A failed or timed-out encode removes any partial output.
    pub async fn render(&self, timeline: &ComposedTimeline, output: &Path) -> MediaResult<RenderOutput> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let cmd = self.build_command(timeline, output);
        let total = timeline.duration;
        let started = Instant::now();

        info!(
            output = %output.display(),
            duration = total,
            inputs = timeline.inputs.len(),
            timeout_secs = self.settings.timeout_secs,
            "Rendering timeline"
        );

        let result = FfmpegRunner::new()
            .with_timeout(self.settings.timeout_secs)
            .run_with_progress(&cmd, move |progress| {
                debug!(
                    percent = %format!("{:.1}", progress.percentage(total)),
                    eta_secs = ?progress.eta_seconds(total).map(|eta| eta.round()),
                    speed = progress.speed,
                    frame = progress.frame,
                    "Render progress"
                );
            })
            .await;

        if let Err(e) = result {
            match &e {
                MediaError::FfmpegFailed { stderr, exit_code, .. } => error!(
                    output = %output.display(),
                    exit_code = ?exit_code,
                    stderr = %stderr.as_deref().unwrap_or(""),
                    "Render failed"
                ),
                other => error!(output = %output.display(), error = %other, "Render failed"),
            }
            cleanup_file(output).await;
            return Err(e);
        }

        let size_bytes = tokio::fs::metadata(output).await?.len();
        let elapsed = started.elapsed();
        info!(
            output = %output.display(),
            size_mb = %format!("{:.2}", size_bytes as f64 / 1_000_000.0),
            elapsed_secs = %format!("{:.2}", elapsed.as_secs_f64()),
            "Render complete"
        );

        Ok(RenderOutput {
            path: output.to_path_buf(),
            size_bytes,
            elapsed,
        })
    }
}

/// Remove a file, ignoring errors.
pub async fn cleanup_file(path: &Path) {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            debug!(path = %path.display(), error = %e, "Failed to remove file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{CompositionInput, Compositor, SourceInfo};
    use tempfile::TempDir;
    use vcomp_models::{AudioTrack, TemplateConfig, VideoSegment};

    #[test]
    fn test_render_command_layout() {
        let dir = TempDir::new().unwrap();
        let mut segment = VideoSegment::new("clip.mp4", 6.5);
        segment.place(0.0, 6.5);
        let segments = vec![segment];
        let sources = vec![SourceInfo {
            width: 1280,
            height: 720,
            duration: 10.0,
        }];
        let audio = AudioTrack {
            path: "voice.m4a".into(),
            duration: 6.5,
        };
        let template = TemplateConfig::default();
        let timeline = Compositor::new(dir.path())
            .compose(CompositionInput {
                segments: &segments,
                sources: &sources,
                audio: &audio,
                captions: &[],
                template: &template,
                fps: 30,
            })
            .unwrap();

        let renderer = Renderer::new(RenderSettings::default());
        let args = renderer
            .build_command(&timeline, Path::new("out/final.mp4"))
            .build_args();

        let joined = args.join(" ");
        assert!(joined.contains("-i clip.mp4 -i voice.m4a"));
        assert!(joined.contains("-map [vout] -map 1:a:0"));
        assert!(joined.contains("-movflags +faststart"));
        assert!(joined.contains("-pix_fmt yuv420p"));
        assert!(joined.contains("-t 6.500"));
        assert_eq!(args.last().unwrap(), "out/final.mp4");
    }

    #[tokio::test]
    async fn test_cleanup_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.mp4");
        tokio::fs::write(&path, b"junk").await.unwrap();
        cleanup_file(&path).await;
        assert!(!path.exists());
        // Missing files are fine
        cleanup_file(&path).await;
    }
}
