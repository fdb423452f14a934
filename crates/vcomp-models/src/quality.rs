//! Quality metrics and quality gates.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Weight of the resolution score in the overall score.
pub const WEIGHT_RESOLUTION: f64 = 0.20;
/// Weight of the audio sync score in the overall score.
pub const WEIGHT_AUDIO_SYNC: f64 = 0.30;
/// Weight of the visual clarity score in the overall score.
pub const WEIGHT_CLARITY: f64 = 0.25;
/// Weight of the compression efficiency in the overall score.
pub const WEIGHT_COMPRESSION: f64 = 0.15;
/// Weight of the engagement potential in the overall score.
pub const WEIGHT_ENGAGEMENT: f64 = 0.10;

/// Scores computed from a rendered file. Every score lies in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QualityMetrics {
    pub resolution_score: f64,
    pub audio_sync_score: f64,
    pub visual_clarity_score: f64,
    pub compression_efficiency: f64,
    pub engagement_potential: f64,
    pub platform_compliance: bool,
    pub overall_score: f64,
}

impl QualityMetrics {
    /// Build metrics from component scores, clamping each to `[0, 1]` and
    /// deriving the weighted overall score.
    pub fn from_components(
        resolution: f64,
        audio_sync: f64,
        clarity: f64,
        compression: f64,
        engagement: f64,
        platform_compliance: bool,
    ) -> Self {
        let resolution_score = clamp_unit(resolution);
        let audio_sync_score = clamp_unit(audio_sync);
        let visual_clarity_score = clamp_unit(clarity);
        let compression_efficiency = clamp_unit(compression);
        let engagement_potential = clamp_unit(engagement);

        let overall = WEIGHT_RESOLUTION * resolution_score
            + WEIGHT_AUDIO_SYNC * audio_sync_score
            + WEIGHT_CLARITY * visual_clarity_score
            + WEIGHT_COMPRESSION * compression_efficiency
            + WEIGHT_ENGAGEMENT * engagement_potential;

        Self {
            resolution_score,
            audio_sync_score,
            visual_clarity_score,
            compression_efficiency,
            engagement_potential,
            platform_compliance,
            overall_score: clamp_unit(overall),
        }
    }

    /// Metrics recorded for an attempt whose render failed.
    pub fn failed() -> Self {
        Self::from_components(0.0, 0.0, 0.0, 0.0, 0.0, false)
    }

    /// Component scores paired with their gate.
    pub fn components(&self) -> [(QualityGate, f64); 6] {
        [
            (QualityGate::Resolution, self.resolution_score),
            (QualityGate::AudioSync, self.audio_sync_score),
            (QualityGate::Clarity, self.visual_clarity_score),
            (QualityGate::Compression, self.compression_efficiency),
            (QualityGate::Engagement, self.engagement_potential),
            (QualityGate::Overall, self.overall_score),
        ]
    }
}

impl fmt::Display for QualityMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "overall={:.3} res={:.3} sync={:.3} clarity={:.3} compression={:.3} engagement={:.3} compliant={}",
            self.overall_score,
            self.resolution_score,
            self.audio_sync_score,
            self.visual_clarity_score,
            self.compression_efficiency,
            self.engagement_potential,
            self.platform_compliance
        )
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// A single threshold comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QualityGate {
    Resolution,
    AudioSync,
    Clarity,
    Compression,
    Engagement,
    Overall,
}

impl fmt::Display for QualityGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QualityGate::Resolution => "resolution",
            QualityGate::AudioSync => "audio_sync",
            QualityGate::Clarity => "clarity",
            QualityGate::Compression => "compression",
            QualityGate::Engagement => "engagement",
            QualityGate::Overall => "overall",
        };
        f.write_str(name)
    }
}

/// Minimum score per component; unset components default to 0.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QualityThresholds {
    #[serde(default)]
    pub resolution: f64,
    #[serde(default)]
    pub audio_sync: f64,
    #[serde(default)]
    pub clarity: f64,
    #[serde(default)]
    pub compression: f64,
    #[serde(default)]
    pub engagement: f64,
    #[serde(default)]
    pub overall: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            resolution: 0.8,
            audio_sync: 0.85,
            clarity: 0.75,
            compression: 0.0,
            engagement: 0.0,
            overall: 0.8,
        }
    }
}

impl QualityThresholds {
    /// Thresholds that accept any render.
    pub fn permissive() -> Self {
        Self {
            resolution: 0.0,
            audio_sync: 0.0,
            clarity: 0.0,
            compression: 0.0,
            engagement: 0.0,
            overall: 0.0,
        }
    }

    fn minimum(&self, gate: QualityGate) -> f64 {
        match gate {
            QualityGate::Resolution => self.resolution,
            QualityGate::AudioSync => self.audio_sync,
            QualityGate::Clarity => self.clarity,
            QualityGate::Compression => self.compression,
            QualityGate::Engagement => self.engagement,
            QualityGate::Overall => self.overall,
        }
    }

    /// Gates the metrics fall below.
    pub fn failures(&self, metrics: &QualityMetrics) -> Vec<QualityGate> {
        metrics
            .components()
            .into_iter()
            .filter(|(gate, score)| *score < self.minimum(*gate))
            .map(|(gate, _)| gate)
            .collect()
    }

    /// Whether every gate passes.
    pub fn passes(&self, metrics: &QualityMetrics) -> bool {
        self.failures(metrics).is_empty()
    }
}
