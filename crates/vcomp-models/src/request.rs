//! Composition request definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::caption::Caption;
use crate::error::ModelResult;
use crate::quality::QualityThresholds;
use crate::segment::VideoSegment;
use crate::thumbnail::ThumbnailOptions;

/// Unique identifier for a composition request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a new random request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Finished narration track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AudioTrack {
    pub path: PathBuf,
    /// Duration in seconds
    pub duration: f64,
}

/// Everything needed to produce one short-form video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CompositionRequest {
    #[serde(default)]
    pub id: RequestId,
    pub audio: AudioTrack,
    /// Candidate clips, in timeline order
    pub segments: Vec<VideoSegment>,
    /// Registered template name
    #[serde(default = "default_template")]
    pub template: String,
    /// Captions aligned to the audio track
    #[serde(default)]
    pub captions: Vec<Caption>,
    /// Primary output file
    pub output_path: PathBuf,
    /// Platform profile identifiers to export after approval
    #[serde(default)]
    pub platforms: Vec<String>,
    /// Thumbnail settings; `null` disables thumbnail extraction
    #[serde(default = "default_thumbnail")]
    pub thumbnail: Option<ThumbnailOptions>,
    /// Quality gate override for this request
    #[serde(default)]
    pub thresholds: Option<QualityThresholds>,
    /// Retry budget override for this request
    #[serde(default)]
    pub max_retries: Option<u32>,
}

fn default_template() -> String {
    "default".to_string()
}

fn default_thumbnail() -> Option<ThumbnailOptions> {
    Some(ThumbnailOptions::default())
}

impl CompositionRequest {
    /// Create a request using the default template.
    pub fn new(
        audio: AudioTrack,
        segments: Vec<VideoSegment>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: RequestId::new(),
            audio,
            segments,
            template: default_template(),
            captions: Vec::new(),
            output_path: output_path.into(),
            platforms: Vec::new(),
            thumbnail: default_thumbnail(),
            thresholds: None,
            max_retries: None,
        }
    }

    pub fn with_template(mut self, name: impl Into<String>) -> Self {
        self.template = name.into();
        self
    }

    pub fn with_captions(mut self, captions: Vec<Caption>) -> Self {
        self.captions = captions;
        self
    }

    pub fn with_platforms(mut self, platforms: Vec<String>) -> Self {
        self.platforms = platforms;
        self
    }

    /// Validate the caption schedule.
    pub fn validate_captions(&self) -> ModelResult<()> {
        for caption in &self.captions {
            caption.validate()?;
        }
        Ok(())
    }

    /// Whether the audio duration can drive a timeline.
    pub fn has_valid_audio_duration(&self) -> bool {
        self.audio.duration.is_finite() && self.audio.duration > 0.0
    }

    /// Stem of the output file, used to name sidecars and exports.
    pub fn output_stem(&self) -> String {
        self.output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.id.to_string())
    }
}
