//! Thumbnail options.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Post-processing applied to the extracted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailStyle {
    /// Frame as extracted
    #[default]
    Standard,
    /// Stronger contrast for small previews
    ContrastBoost,
    /// Darkened upper band to carry title text
    TextOverlay,
}

/// Thumbnail extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ThumbnailOptions {
    /// Extraction point as a fraction of the video duration
    #[serde(default = "default_relative_timestamp")]
    pub relative_timestamp: f64,
    #[serde(default)]
    pub style: ThumbnailStyle,
    /// JPEG quality (1-100)
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Output width in pixels (height keeps aspect)
    #[serde(default = "default_width")]
    pub width: u32,
    /// Extra evenly spaced frames to score; the sharpest frame wins
    #[serde(default)]
    pub candidates: u32,
}

fn default_relative_timestamp() -> f64 {
    0.3
}
fn default_quality() -> u8 {
    90
}
fn default_width() -> u32 {
    720
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self {
            relative_timestamp: default_relative_timestamp(),
            style: ThumbnailStyle::default(),
            quality: default_quality(),
            width: default_width(),
            candidates: 0,
        }
    }
}

impl ThumbnailOptions {
    /// Absolute extraction timestamp for a video of the given length.
    pub fn timestamp_for(&self, duration: f64) -> f64 {
        if !duration.is_finite() || duration <= 0.0 {
            return 0.0;
        }
        duration * self.relative_timestamp.clamp(0.0, 1.0)
    }

    /// JPEG quality clamped to the encoder's accepted range.
    pub fn jpeg_quality(&self) -> u8 {
        self.quality.clamp(1, 100)
    }
}
