//! Platform export profiles.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::encoding::parse_bitrate;
use crate::error::{ModelError, ModelResult};
use crate::template::Resolution;

const MIB: u64 = 1024 * 1024;

/// Named export target for a distribution channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlatformProfile {
    /// Stable identifier, used in output file names
    pub id: String,
    /// Display name
    pub name: String,
    pub resolution: Resolution,
    pub fps: u32,
    /// Longest accepted upload in seconds
    pub max_duration: f64,
    /// Target video bitrate (FFmpeg syntax)
    pub video_bitrate: String,
    #[serde(default = "default_video_codec")]
    pub video_codec: String,
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
    /// Hard upload size ceiling in bytes
    pub max_file_size: u64,
}

fn default_video_codec() -> String {
    "libx264".to_string()
}
fn default_audio_codec() -> String {
    "aac".to_string()
}
fn default_audio_bitrate() -> String {
    "128k".to_string()
}

impl PlatformProfile {
    /// Identifiers of the built-in profiles.
    pub const BUILTIN_IDS: [&'static str; 4] =
        ["youtube_shorts", "tiktok", "instagram_reels", "facebook_reels"];

    fn portrait(id: &str, name: &str, max_duration: f64, bitrate: &str, max_mib: u64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            resolution: Resolution::new(1080, 1920),
            fps: 30,
            max_duration,
            video_bitrate: bitrate.to_string(),
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            max_file_size: max_mib * MIB,
        }
    }

    /// Look up a built-in profile by identifier.
    pub fn builtin(id: &str) -> ModelResult<Self> {
        let profile = match id {
            "youtube_shorts" => Self::portrait(id, "YouTube Shorts", 60.0, "8M", 256),
            "tiktok" => Self::portrait(id, "TikTok", 180.0, "6M", 287),
            "instagram_reels" => Self::portrait(id, "Instagram Reels", 90.0, "5M", 250),
            "facebook_reels" => Self::portrait(id, "Facebook Reels", 90.0, "5M", 250),
            other => return Err(ModelError::UnknownPlatform(other.to_string())),
        };
        Ok(profile)
    }

    /// All built-in profiles.
    pub fn builtins() -> Vec<Self> {
        Self::BUILTIN_IDS
            .iter()
            .filter_map(|id| Self::builtin(id).ok())
            .collect()
    }

    /// Deterministic export file name for a master file stem.
    pub fn output_name(&self, master_stem: &str) -> String {
        format!("{}_{}.mp4", master_stem, self.id)
    }

    /// Target bitrate in bits per second.
    pub fn video_bitrate_bps(&self) -> Option<u64> {
        parse_bitrate(&self.video_bitrate)
    }

    /// Frame-rate window accepted as compliant (±10%).
    pub fn fps_tolerance(&self) -> (f64, f64) {
        let fps = self.fps as f64;
        (fps * 0.9, fps * 1.1)
    }
}

impl FromStr for PlatformProfile {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::builtin(s.trim())
    }
}
