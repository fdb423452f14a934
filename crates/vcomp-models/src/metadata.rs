//! Render metadata sidecar records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::quality::QualityMetrics;
use crate::request::RequestId;

/// Outcome of one platform export, as recorded in the sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExportSummary {
    /// Platform profile identifier
    pub profile: String,
    /// Exported file, absent when the export failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Whether every compliance check passed
    pub compliant: bool,
    /// Human-readable compliance warnings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
    /// Export failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExportSummary {
    /// Summary for an export that failed to produce a file.
    pub fn failed(profile: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            path: None,
            compliant: false,
            issues: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// JSON record persisted next to every primary render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderMetadata {
    pub request_id: RequestId,
    pub generated_at: DateTime<Utc>,
    /// Whether the render passed every quality gate
    pub quality_validated: bool,
    /// Number of re-renders after the first attempt
    pub retry_count: u32,
    /// Total render attempts
    pub attempts: u32,
    /// Input segment paths as requested, including ones left out of the timeline
    pub segments: Vec<PathBuf>,
    /// Segment paths placed on the timeline, in order
    #[serde(default)]
    pub scheduled: Vec<PathBuf>,
    /// Template name the render started from
    pub template: String,
    /// Timeline duration in seconds
    pub duration: f64,
    /// Metrics of the returned render
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<QualityMetrics>,
    #[serde(default)]
    pub exports: Vec<ExportSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<PathBuf>,
}

impl RenderMetadata {
    /// Create a record stamped with the current time.
    pub fn new(request_id: RequestId, template: impl Into<String>) -> Self {
        Self {
            request_id,
            generated_at: Utc::now(),
            quality_validated: false,
            retry_count: 0,
            attempts: 0,
            segments: Vec::new(),
            scheduled: Vec::new(),
            template: template.into(),
            duration: 0.0,
            metrics: None,
            exports: Vec::new(),
            thumbnail: None,
        }
    }

    /// Sidecar file name for an output stem.
    pub fn sidecar_name(output_stem: &str) -> String {
        format!("{output_stem}.metadata.json")
    }
}
