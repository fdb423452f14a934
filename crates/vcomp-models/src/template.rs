//! Template configuration.
//!
//! Templates are named bundles of visual and timing defaults. They are
//! registered once and treated as read-only; quality retries work on clones.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::caption::CaptionStyle;
use crate::effect::Effect;
use crate::error::{ModelError, ModelResult};

/// Default output width (9:16 portrait).
pub const DEFAULT_WIDTH: u32 = 1080;
/// Default output height (9:16 portrait).
pub const DEFAULT_HEIGHT: u32 = 1920;
/// Default symmetric fade length at segment boundaries.
pub const DEFAULT_TRANSITION_SECS: f64 = 0.5;

/// Output frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count.
    pub fn pixel_area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Width divided by height.
    pub fn aspect(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }

    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Transition applied at every inter-segment boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionType {
    /// Fade out the preceding segment and fade in the following one.
    Fade { duration: f64 },
    /// Hard cut.
    Cut,
}

impl TransitionType {
    /// Fade length, or zero for hard cuts.
    pub fn fade_duration(&self) -> f64 {
        match self {
            TransitionType::Fade { duration } => duration.max(0.0),
            TransitionType::Cut => 0.0,
        }
    }
}

impl Default for TransitionType {
    fn default() -> Self {
        TransitionType::Fade {
            duration: DEFAULT_TRANSITION_SECS,
        }
    }
}

/// Default text rendering for captions and branding text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TextStyle {
    /// Font family name, or a path to a font file
    #[serde(default = "default_font")]
    pub font: String,
    /// Font size in pixels
    #[serde(default = "default_font_size")]
    pub size: u32,
    /// Fill color (FFmpeg color syntax)
    #[serde(default = "default_text_color")]
    pub color: String,
    /// Outline color
    #[serde(default = "default_stroke_color")]
    pub stroke_color: String,
    /// Outline width in pixels
    #[serde(default = "default_stroke_width")]
    pub stroke_width: u32,
}

fn default_font() -> String {
    "Arial".to_string()
}
fn default_font_size() -> u32 {
    56
}
fn default_text_color() -> String {
    "white".to_string()
}
fn default_stroke_color() -> String {
    "black".to_string()
}
fn default_stroke_width() -> u32 {
    3
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: default_font(),
            size: default_font_size(),
            color: default_text_color(),
            stroke_color: default_stroke_color(),
            stroke_width: default_stroke_width(),
        }
    }
}

impl TextStyle {
    /// Whether `font` names a font file rather than a family.
    pub fn is_font_file(&self) -> bool {
        let lower = self.font.to_lowercase();
        self.font.contains('/') || lower.ends_with(".ttf") || lower.ends_with(".otf")
    }
}

/// Frame corner used for branding placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

/// Logo and/or text tag overlaid for the full duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BrandingConfig {
    /// PNG logo (with transparency)
    #[serde(default)]
    pub logo_path: Option<PathBuf>,
    /// Text tag, e.g. a channel handle
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub corner: Corner,
    /// Opacity (0.0 to 1.0)
    #[serde(default = "default_branding_opacity")]
    pub opacity: f32,
    /// Margin from the frame edges in pixels
    #[serde(default = "default_branding_margin")]
    pub margin: u32,
    /// Logo width in pixels (height keeps aspect)
    #[serde(default = "default_logo_width")]
    pub logo_width: u32,
}

fn default_branding_opacity() -> f32 {
    0.7
}
fn default_branding_margin() -> u32 {
    40
}
fn default_logo_width() -> u32 {
    180
}

impl Default for BrandingConfig {
    fn default() -> Self {
        Self {
            logo_path: None,
            text: None,
            corner: Corner::default(),
            opacity: default_branding_opacity(),
            margin: default_branding_margin(),
            logo_width: default_logo_width(),
        }
    }
}

impl BrandingConfig {
    /// Whether anything would be drawn.
    pub fn is_empty(&self) -> bool {
        self.logo_path.is_none() && self.text.as_deref().map_or(true, str::is_empty)
    }
}

/// Immutable per-render configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TemplateConfig {
    /// Registry name
    pub name: String,
    #[serde(default)]
    pub resolution: Resolution,
    /// Nominal total duration in seconds (the audio track decides the real length)
    #[serde(default)]
    pub duration: f64,
    /// Fade-in from the background color at the start of the timeline
    #[serde(default)]
    pub intro_duration: f64,
    /// Fade-out to the background color at the end of the timeline
    #[serde(default)]
    pub outro_duration: f64,
    #[serde(default)]
    pub transition: TransitionType,
    /// Background color (FFmpeg color syntax)
    #[serde(default = "default_background_color")]
    pub background_color: String,
    #[serde(default)]
    pub text_style: TextStyle,
    #[serde(default)]
    pub caption_defaults: CaptionStyle,
    #[serde(default)]
    pub branding: Option<BrandingConfig>,
    /// Effects applied to every segment, after segment-level effects
    #[serde(default)]
    pub effects: Vec<Effect>,
    /// Background blur sigma
    #[serde(default = "default_background_blur")]
    pub background_blur: f32,
    /// Opacity of the letterbox bars drawn over the blurred background
    #[serde(default = "default_letterbox_opacity")]
    pub letterbox_opacity: f32,
}

fn default_background_color() -> String {
    "black".to_string()
}
fn default_background_blur() -> f32 {
    30.0
}
fn default_letterbox_opacity() -> f32 {
    0.35
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            resolution: Resolution::default(),
            duration: 60.0,
            intro_duration: 0.0,
            outro_duration: 0.0,
            transition: TransitionType::default(),
            background_color: default_background_color(),
            text_style: TextStyle::default(),
            caption_defaults: CaptionStyle::default(),
            branding: None,
            effects: Vec::new(),
            background_blur: default_background_blur(),
            letterbox_opacity: default_letterbox_opacity(),
        }
    }
}

impl TemplateConfig {
    /// Create a template with default settings.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> ModelResult<()> {
        let Resolution { width, height } = self.resolution;
        if width == 0 || height == 0 {
            return Err(ModelError::invalid_template(&self.name, "resolution must be non-zero"));
        }
        if width % 2 != 0 || height % 2 != 0 {
            return Err(ModelError::invalid_template(
                &self.name,
                format!("resolution {} must have even dimensions", self.resolution),
            ));
        }
        if self.intro_duration < 0.0 || self.outro_duration < 0.0 {
            return Err(ModelError::invalid_template(
                &self.name,
                "intro/outro durations must not be negative",
            ));
        }
        if !(0.0..=1.0).contains(&self.letterbox_opacity) {
            return Err(ModelError::invalid_template(
                &self.name,
                "letterbox opacity must be within 0..=1",
            ));
        }
        if self.text_style.size == 0 {
            return Err(ModelError::invalid_template(&self.name, "font size must be positive"));
        }
        Ok(())
    }

    /// Number of sharpening effects configured on the template.
    pub fn sharpen_count(&self) -> usize {
        self.effects.iter().filter(|e| e.is_sharpen()).count()
    }
}

/// Parse a color string into RGB.
///
/// Accepts `#RRGGBB`, `0xRRGGBB` and a handful of common names.
pub fn parse_rgb(color: &str) -> Option<[u8; 3]> {
    let color = color.trim();
    let hex = color
        .strip_prefix('#')
        .or_else(|| color.strip_prefix("0x"))
        .or_else(|| color.strip_prefix("0X"));

    if let Some(hex) = hex {
        if hex.len() < 6 {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        return Some([r, g, b]);
    }

    match color.to_lowercase().as_str() {
        "black" => Some([0, 0, 0]),
        "white" => Some([255, 255, 255]),
        "red" => Some([255, 0, 0]),
        "green" => Some([0, 128, 0]),
        "blue" => Some([0, 0, 255]),
        "yellow" => Some([255, 255, 0]),
        "gray" | "grey" => Some([128, 128, 128]),
        _ => None,
    }
}
