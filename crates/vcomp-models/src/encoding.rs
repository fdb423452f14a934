//! Render encoding settings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Default output frame rate
pub const DEFAULT_FPS: u32 = 30;
/// Default target video bitrate
pub const DEFAULT_VIDEO_BITRATE: &str = "6M";
/// Default peak video bitrate
pub const DEFAULT_MAX_BITRATE: &str = "8M";
/// Default rate-control buffer
pub const DEFAULT_BUFFER_SIZE: &str = "12M";
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";
/// Default pixel format (widest player support)
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";
/// Default wall-clock limit for a single encode
pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 600;

/// Encoder parameters for the primary render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderSettings {
    /// Output frame rate
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Video codec (e.g., "libx264", "h264_nvenc")
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    /// Encoding preset (e.g., "fast", "medium", "slow")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Target video bitrate (FFmpeg syntax, e.g. "6M")
    #[serde(default = "default_video_bitrate")]
    pub video_bitrate: String,

    /// Peak video bitrate
    #[serde(default = "default_max_bitrate")]
    pub max_bitrate: String,

    /// Rate-control buffer size
    #[serde(default = "default_buffer_size")]
    pub buffer_size: String,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Output pixel format
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,

    /// Move the MP4 index to the front for streaming playback
    #[serde(default = "default_true")]
    pub faststart: bool,

    /// Wall-clock timeout for one encode, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Use hardware acceleration (NVENC)
    #[serde(default)]
    pub use_nvenc: bool,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_fps() -> u32 {
    DEFAULT_FPS
}
fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_video_bitrate() -> String {
    DEFAULT_VIDEO_BITRATE.to_string()
}
fn default_max_bitrate() -> String {
    DEFAULT_MAX_BITRATE.to_string()
}
fn default_buffer_size() -> String {
    DEFAULT_BUFFER_SIZE.to_string()
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}
fn default_pixel_format() -> String {
    DEFAULT_PIXEL_FORMAT.to_string()
}
fn default_true() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    DEFAULT_RENDER_TIMEOUT_SECS
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            video_codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            video_bitrate: DEFAULT_VIDEO_BITRATE.to_string(),
            max_bitrate: DEFAULT_MAX_BITRATE.to_string(),
            buffer_size: DEFAULT_BUFFER_SIZE.to_string(),
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
            faststart: true,
            timeout_secs: DEFAULT_RENDER_TIMEOUT_SECS,
            use_nvenc: false,
            extra_args: Vec::new(),
        }
    }
}

impl RenderSettings {
    /// Create settings with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns new settings with an updated target bitrate.
    pub fn with_video_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.video_bitrate = bitrate.into();
        self
    }

    /// Returns new settings with an updated timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Enable NVENC hardware acceleration.
    pub fn with_nvenc(mut self) -> Self {
        self.use_nvenc = true;
        self.video_codec = "h264_nvenc".to_string();
        self
    }

    /// Target bitrate in bits per second, if parseable.
    pub fn video_bitrate_bps(&self) -> Option<u64> {
        parse_bitrate(&self.video_bitrate)
    }

    /// Convert to FFmpeg output arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.video_codec.clone(),
            // NVENC presets use a different vocabulary
            "-preset".to_string(),
            if self.use_nvenc {
                "p4".to_string()
            } else {
                self.preset.clone()
            },
            "-b:v".to_string(),
            self.video_bitrate.clone(),
            "-maxrate".to_string(),
            self.max_bitrate.clone(),
            "-bufsize".to_string(),
            self.buffer_size.clone(),
            "-r".to_string(),
            self.fps.to_string(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ];

        if self.faststart {
            args.extend_from_slice(&["-movflags".to_string(), "+faststart".to_string()]);
        }

        args.extend(self.extra_args.clone());

        args
    }
}

/// Parse an FFmpeg-style bitrate ("6M", "192k", "800000") into bits/second.
pub fn parse_bitrate(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let (number, multiplier) = match value.chars().last()? {
        'k' | 'K' => (&value[..value.len() - 1], 1_000.0),
        'm' | 'M' => (&value[..value.len() - 1], 1_000_000.0),
        'g' | 'G' => (&value[..value.len() - 1], 1_000_000_000.0),
        _ => (value, 1.0),
    };
    let number: f64 = number.parse().ok()?;
    if !number.is_finite() || number < 0.0 {
        return None;
    }
    Some((number * multiplier).round() as u64)
}
