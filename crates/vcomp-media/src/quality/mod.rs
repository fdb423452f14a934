//! Quality Evaluator.
//!
//! Scores a rendered file with deterministic frame statistics and probe data.
//! The same file always yields the same [`QualityMetrics`].

pub mod metrics;

use std::path::Path;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};
use crate::frames::{extract_gray_frame, scaled_size};
use crate::probe::probe_video;
use vcomp_models::{QualityMetrics, Resolution};

pub use metrics::{laplacian_variance, mean_abs_diff, motion_between, normalize};

/// Relative offsets of the frames sampled for motion.
pub const MOTION_SAMPLE_OFFSETS: [f64; 5] = [0.1, 0.3, 0.5, 0.7, 0.9];

/// Scoring references and normalisation ceilings.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatorConfig {
    pub reference_resolution: Resolution,
    pub target_fps: u32,
    pub target_bitrate_bps: u64,
    /// Laplacian variance mapped to a clarity score of 1.0
    pub clarity_ceiling: f64,
    /// Mean absolute gray difference mapped to an engagement score of 1.0
    pub motion_ceiling: f64,
    /// Width of the frames sampled for motion
    pub analysis_width: u32,
    /// Audio/video length drift that scores 0
    pub sync_tolerance_secs: f64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            reference_resolution: Resolution::default(),
            target_fps: 30,
            target_bitrate_bps: 6_000_000,
            clarity_ceiling: 1000.0,
            motion_ceiling: 25.0,
            analysis_width: 360,
            sync_tolerance_secs: 0.5,
        }
    }
}

/// Computes [`QualityMetrics`] for rendered files.
#[derive(Debug, Clone, Default)]
pub struct QualityEvaluator {
    config: EvaluatorConfig,
}

impl QualityEvaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Score resolution and compliance against `resolution`.
    pub fn with_reference_resolution(mut self, resolution: Resolution) -> Self {
        self.config.reference_resolution = resolution;
        self
    }

    /// Score a rendered file.
    pub async fn evaluate(&self, path: impl AsRef<Path>) -> MediaResult<QualityMetrics> {
        let path = path.as_ref();
        let info = probe_video(path).await?;
        if info.duration <= 0.0 || info.width == 0 || info.height == 0 {
            return Err(MediaError::InvalidVideo(format!(
                "{} has no decodable video",
                path.display()
            )));
        }
        let config = &self.config;

        let resolution = metrics::resolution_score(info.resolution(), config.reference_resolution);

        // Clarity on the midpoint frame at native resolution
        let (native_w, native_h) = scaled_size(info.width, info.height, info.width);
        let midpoint = extract_gray_frame(path, info.duration * 0.5, native_w, native_h).await?;
        let sharpness = laplacian_variance(&midpoint);
        let clarity = normalize(sharpness, config.clarity_ceiling);

        let (motion_w, motion_h) = scaled_size(info.width, info.height, config.analysis_width);
        let mut samples = Vec::with_capacity(MOTION_SAMPLE_OFFSETS.len());
        for offset in MOTION_SAMPLE_OFFSETS {
            samples.push(extract_gray_frame(path, info.duration * offset, motion_w, motion_h).await?);
        }
        let motion = motion_between(&samples);
        let engagement = normalize(motion, config.motion_ceiling);

        let compression =
            metrics::compression_score(info.size, info.duration, config.target_bitrate_bps);

        let video_duration = info.video_duration.unwrap_or(info.duration);
        let audio_duration = if info.has_audio {
            info.audio_duration.or(Some(info.duration))
        } else {
            None
        };
        let audio_sync =
            metrics::audio_sync_score(video_duration, audio_duration, config.sync_tolerance_secs);

        let compliant = metrics::is_compliant(
            info.resolution(),
            info.fps,
            config.reference_resolution,
            config.target_fps,
        );

        debug!(
            path = %path.display(),
            sharpness = %format!("{:.1}", sharpness),
            motion = %format!("{:.2}", motion),
            video_duration,
            audio_duration = ?audio_duration,
            "Quality statistics"
        );

        let metrics = QualityMetrics::from_components(
            resolution,
            audio_sync,
            clarity,
            compression,
            engagement,
            compliant,
        );
        info!(path = %path.display(), metrics = %metrics, "Evaluated render");
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EvaluatorConfig::default();
        assert_eq!(config.reference_resolution, Resolution::new(1080, 1920));
        assert_eq!(config.clarity_ceiling, 1000.0);
        assert_eq!(config.motion_ceiling, 25.0);
        assert_eq!(config.analysis_width, 360);
    }

    #[test]
    fn test_reference_follows_template_size() {
        let evaluator = QualityEvaluator::default().with_reference_resolution(Resolution::new(1080, 1080));
        assert_eq!(evaluator.config().reference_resolution, Resolution::new(1080, 1080));
        assert_eq!(evaluator.config().clarity_ceiling, 1000.0);
    }

    #[test]
    fn test_motion_offsets_are_ordered() {
        assert!(MOTION_SAMPLE_OFFSETS.windows(2).all(|w| w[0] < w[1]));
        assert!(MOTION_SAMPLE_OFFSETS.iter().all(|o| *o > 0.0 && *o < 1.0));
    }

    #[tokio::test]
    async fn test_evaluate_missing_file() {
        let evaluator = QualityEvaluator::default();
        let result = evaluator.evaluate("/nonexistent/render.mp4").await;
        assert!(result.is_err());
    }
}
