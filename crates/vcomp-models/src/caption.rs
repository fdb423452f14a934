//! Timed caption text.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Vertical anchor of the caption panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptionAnchor {
    Top,
    Center,
    #[default]
    Bottom,
}

/// Panel and typography settings for a caption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionStyle {
    #[serde(default)]
    pub anchor: CaptionAnchor,
    /// Font size override; the template text size applies when unset
    #[serde(default)]
    pub font_size: Option<u32>,
    /// Line height as a multiple of the font size
    #[serde(default = "default_line_spacing")]
    pub line_spacing: f32,
    /// Panel fill color
    #[serde(default = "default_panel_color")]
    pub panel_color: String,
    /// Panel opacity (0.0 to 1.0)
    #[serde(default = "default_panel_opacity")]
    pub panel_opacity: f32,
    /// Distance from the anchored edge as a fraction of frame height
    #[serde(default = "default_margin_ratio")]
    pub margin_ratio: f64,
    /// Maximum panel width as a fraction of frame width
    #[serde(default = "default_max_width_ratio")]
    pub max_width_ratio: f64,
    /// Inner padding in pixels
    #[serde(default = "default_padding")]
    pub padding: u32,
    /// Panel corner radius in pixels
    #[serde(default = "default_corner_radius")]
    pub corner_radius: u32,
}

fn default_line_spacing() -> f32 {
    1.25
}
fn default_panel_color() -> String {
    "black".to_string()
}
fn default_panel_opacity() -> f32 {
    0.6
}
fn default_margin_ratio() -> f64 {
    0.12
}
fn default_max_width_ratio() -> f64 {
    0.85
}
fn default_padding() -> u32 {
    24
}
fn default_corner_radius() -> u32 {
    18
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            anchor: CaptionAnchor::default(),
            font_size: None,
            line_spacing: default_line_spacing(),
            panel_color: default_panel_color(),
            panel_opacity: default_panel_opacity(),
            margin_ratio: default_margin_ratio(),
            max_width_ratio: default_max_width_ratio(),
            padding: default_padding(),
            corner_radius: default_corner_radius(),
        }
    }
}

/// A caption entry, time-aligned to the audio track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Caption {
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    /// Per-caption style; the template caption defaults apply when unset
    #[serde(default)]
    pub style: Option<CaptionStyle>,
}

impl Caption {
    pub fn new(text: impl Into<String>, start_time: f64, end_time: f64) -> Self {
        Self {
            text: text.into(),
            start_time,
            end_time,
            style: None,
        }
    }

    pub fn with_style(mut self, style: CaptionStyle) -> Self {
        self.style = Some(style);
        self
    }

    /// Resolve the effective style.
    pub fn style_or<'a>(&'a self, defaults: &'a CaptionStyle) -> &'a CaptionStyle {
        self.style.as_ref().unwrap_or(defaults)
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Check the timing is usable.
    pub fn validate(&self) -> ModelResult<()> {
        if !self.start_time.is_finite() || !self.end_time.is_finite() {
            return Err(ModelError::InvalidCaption(format!(
                "non-finite timing for '{}'",
                self.text
            )));
        }
        if self.start_time < 0.0 || self.end_time <= self.start_time {
            return Err(ModelError::InvalidCaption(format!(
                "'{}' ends at {:.3}s before it starts at {:.3}s",
                self.text, self.end_time, self.start_time
            )));
        }
        Ok(())
    }
}
