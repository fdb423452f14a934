//! Engine configuration.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{EngineError, EngineResult};
use vcomp_media::export::DEFAULT_EXPORT_CONCURRENCY;
use vcomp_media::EvaluatorConfig;
use vcomp_models::encoding::DEFAULT_PRESET;
use vcomp_models::{QualityThresholds, RenderSettings};

/// Engine configuration, built once per process and shared read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Working directory for attempts and composition assets
    pub work_dir: PathBuf,
    /// Re-renders allowed after the first attempt
    pub max_retries: u32,
    /// Wall-clock limit for one encode
    pub render_timeout_secs: u64,
    /// Concurrent platform exports
    pub export_concurrency: usize,
    pub fps: u32,
    /// Primary render bitrate (FFmpeg syntax)
    pub video_bitrate: String,
    /// Bitrate the compression score is measured against
    pub target_bitrate_bps: u64,
    /// Encoder preset for the primary render and platform exports
    pub preset: String,
    pub thresholds: QualityThresholds,
    /// Optional JSON array of extra templates
    pub templates_file: Option<PathBuf>,
    /// Export masters that failed the quality gate
    pub export_unapproved: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("vcomp"),
            max_retries: 2,
            render_timeout_secs: 600,
            export_concurrency: DEFAULT_EXPORT_CONCURRENCY,
            fps: 30,
            video_bitrate: "6M".to_string(),
            target_bitrate_bps: 6_000_000,
            preset: DEFAULT_PRESET.to_string(),
            thresholds: QualityThresholds::default(),
            templates_file: None,
            export_unapproved: false,
        }
    }
}

impl EngineConfig {
    /// Create config from `VCOMP_*` environment variables.
    pub fn from_env() -> EngineResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> EngineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let thresholds = QualityThresholds {
            resolution: parse_var(&lookup, "VCOMP_MIN_RESOLUTION", defaults.thresholds.resolution)?,
            audio_sync: parse_var(&lookup, "VCOMP_MIN_AUDIO_SYNC", defaults.thresholds.audio_sync)?,
            clarity: parse_var(&lookup, "VCOMP_MIN_CLARITY", defaults.thresholds.clarity)?,
            overall: parse_var(&lookup, "VCOMP_MIN_OVERALL", defaults.thresholds.overall)?,
            ..defaults.thresholds
        };

        let config = Self {
            work_dir: lookup("VCOMP_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            max_retries: parse_var(&lookup, "VCOMP_MAX_RETRIES", defaults.max_retries)?,
            render_timeout_secs: parse_var(
                &lookup,
                "VCOMP_RENDER_TIMEOUT_SECS",
                defaults.render_timeout_secs,
            )?,
            export_concurrency: parse_var(
                &lookup,
                "VCOMP_EXPORT_CONCURRENCY",
                defaults.export_concurrency,
            )?,
            fps: parse_var(&lookup, "VCOMP_FPS", defaults.fps)?,
            video_bitrate: lookup("VCOMP_VIDEO_BITRATE").unwrap_or(defaults.video_bitrate),
            target_bitrate_bps: parse_var(
                &lookup,
                "VCOMP_TARGET_BITRATE_BPS",
                defaults.target_bitrate_bps,
            )?,
            preset: lookup("VCOMP_PRESET")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.preset),
            thresholds,
            templates_file: lookup("VCOMP_TEMPLATES_FILE").map(PathBuf::from),
            export_unapproved: parse_var(
                &lookup,
                "VCOMP_EXPORT_UNAPPROVED",
                defaults.export_unapproved,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> EngineResult<()> {
        if self.fps == 0 {
            return Err(EngineError::config_error("fps must be positive"));
        }
        if self.render_timeout_secs == 0 {
            return Err(EngineError::config_error("render timeout must be positive"));
        }
        if self.export_concurrency == 0 {
            return Err(EngineError::config_error("export concurrency must be positive"));
        }
        if self.preset.trim().is_empty() {
            return Err(EngineError::config_error("encoder preset must not be empty"));
        }
        if vcomp_models::encoding::parse_bitrate(&self.video_bitrate).is_none() {
            return Err(EngineError::config_error(format!(
                "invalid video bitrate: {}",
                self.video_bitrate
            )));
        }
        let t = &self.thresholds;
        let all = [t.resolution, t.audio_sync, t.clarity, t.compression, t.engagement, t.overall];
        if all.iter().any(|v| !(0.0..=1.0).contains(v)) {
            return Err(EngineError::config_error("quality thresholds must lie in [0, 1]"));
        }
        Ok(())
    }

    /// Encoder settings for the primary render.
    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            fps: self.fps,
            preset: self.preset.clone(),
            ..RenderSettings::default()
        }
        .with_video_bitrate(self.video_bitrate.clone())
        .with_timeout(self.render_timeout_secs)
    }

    /// Scoring references for the quality evaluator. The reference
    /// resolution is set per request from the template.
    pub fn evaluator_config(&self) -> EvaluatorConfig {
        EvaluatorConfig {
            target_fps: self.fps,
            target_bitrate_bps: self.target_bitrate_bps,
            ..EvaluatorConfig::default()
        }
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> EngineResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| EngineError::config_error(format!("{name} has invalid value '{raw}'"))),
        _ => Ok(default),
    }
}
