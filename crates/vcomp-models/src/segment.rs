//! Candidate video segments.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::effect::Effect;

/// A candidate clip contributing a contiguous slice of the final timeline.
///
/// `duration`, `start_time` and `end_time` are reassigned by the scheduler;
/// before scheduling `duration` holds the clip's preferred length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoSegment {
    /// Input media file
    pub path: PathBuf,
    /// Duration in seconds
    pub duration: f64,
    /// Position of the segment start within the final timeline
    #[serde(default)]
    pub start_time: f64,
    /// Position of the segment end within the final timeline
    #[serde(default)]
    pub end_time: f64,
    /// Ordered effects applied to this segment only
    #[serde(default)]
    pub effects: Vec<Effect>,
    /// Preferred alignment timestamps
    #[serde(default)]
    pub sync_points: Vec<f64>,
}

impl VideoSegment {
    /// Create an unscheduled segment with a preferred duration.
    pub fn new(path: impl AsRef<Path>, duration: f64) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            duration,
            start_time: 0.0,
            end_time: 0.0,
            effects: Vec::new(),
            sync_points: Vec::new(),
        }
    }

    /// Add an effect.
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Set preferred sync points.
    pub fn with_sync_points(mut self, points: Vec<f64>) -> Self {
        self.sync_points = points;
        self
    }

    /// Whether the declared duration can be scheduled at all.
    pub fn has_valid_duration(&self) -> bool {
        self.duration.is_finite() && self.duration > 0.0
    }

    /// Place the segment on the timeline.
    pub fn place(&mut self, start: f64, duration: f64) {
        self.start_time = start;
        self.duration = duration;
        self.end_time = start + duration;
    }
}
