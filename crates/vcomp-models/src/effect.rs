//! Visual effect definitions.
//!
//! Effects are a closed set: every variant maps to a fixed FFmpeg filter in
//! the compositor, and unknown effect names are rejected when parsed.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// A named visual transform applied to a segment or a whole template.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    /// Additive brightness shift (-1.0 to 1.0).
    Brightness { delta: f32 },
    /// Contrast multiplier (1.0 = unchanged).
    Contrast { factor: f32 },
    /// Saturation multiplier (1.0 = unchanged).
    Saturation { factor: f32 },
    /// Unsharp-mask luma amount (0.0 to 1.5).
    Sharpen { amount: f32 },
    /// Darkened frame edges.
    Vignette,
    /// Desaturate to black and white.
    Grayscale,
}

impl Effect {
    /// Legacy effect names accepted by [`Effect::from_str`].
    pub const NAMES: &'static [&'static str] = &[
        "brightness_up",
        "brightness_down",
        "contrast_boost",
        "saturation_boost",
        "sharpen",
        "vignette",
        "grayscale",
    ];

    /// Default sharpening applied by quality retries.
    pub fn sharpen() -> Self {
        Effect::Sharpen { amount: 0.8 }
    }

    /// Whether this is a sharpening effect.
    pub fn is_sharpen(&self) -> bool {
        matches!(self, Effect::Sharpen { .. })
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Brightness { delta } => write!(f, "brightness({:+.2})", delta),
            Effect::Contrast { factor } => write!(f, "contrast(x{:.2})", factor),
            Effect::Saturation { factor } => write!(f, "saturation(x{:.2})", factor),
            Effect::Sharpen { amount } => write!(f, "sharpen({:.2})", amount),
            Effect::Vignette => write!(f, "vignette"),
            Effect::Grayscale => write!(f, "grayscale"),
        }
    }
}

impl FromStr for Effect {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "brightness_up" => Ok(Effect::Brightness { delta: 0.1 }),
            "brightness_down" => Ok(Effect::Brightness { delta: -0.1 }),
            "contrast_boost" => Ok(Effect::Contrast { factor: 1.2 }),
            "saturation_boost" => Ok(Effect::Saturation { factor: 1.3 }),
            "sharpen" => Ok(Effect::sharpen()),
            "vignette" => Ok(Effect::Vignette),
            "grayscale" => Ok(Effect::Grayscale),
            _ => Err(ModelError::UnknownEffect(s.to_string())),
        }
    }
}
