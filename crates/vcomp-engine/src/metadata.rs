//! Metadata sidecar persisted next to the primary render.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::EngineResult;
use crate::retry::RetryOutcome;
use vcomp_media::ExportResult;
use vcomp_models::{ExportSummary, RenderMetadata, RequestId, VideoSegment};

/// Assemble the sidecar record for a finished request.
pub fn build_metadata(
    request_id: &RequestId,
    template: &str,
    inputs: &[VideoSegment],
    scheduled: &[VideoSegment],
    duration: f64,
    outcome: &RetryOutcome,
) -> RenderMetadata {
    let mut metadata = RenderMetadata::new(request_id.clone(), template);
    metadata.quality_validated = outcome.quality_validated();
    metadata.retry_count = outcome.retry_count;
    metadata.attempts = outcome.attempts;
    metadata.segments = inputs.iter().map(|s| s.path.clone()).collect();
    metadata.scheduled = scheduled.iter().map(|s| s.path.clone()).collect();
    metadata.duration = duration;
    metadata.metrics = outcome.metrics;
    metadata
}

/// Sidecar summary of one export result.
pub fn summarize_export(result: &ExportResult) -> ExportSummary {
    match &result.result {
        Ok(output) => ExportSummary {
            profile: result.profile.clone(),
            path: Some(output.path.clone()),
            compliant: output.compliance.is_compliant(),
            issues: output.compliance.issue_messages(),
            error: None,
        },
        Err(e) => ExportSummary::failed(&result.profile, e.to_string()),
    }
}

/// Sidecar path for a primary output.
pub fn sidecar_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output.with_file_name(RenderMetadata::sidecar_name(&stem))
}

/// Write the sidecar as pretty JSON next to `output`.
pub async fn write_sidecar(metadata: &RenderMetadata, output: &Path) -> EngineResult<PathBuf> {
    let path = sidecar_path(output);
    let json = serde_json::to_vec_pretty(metadata)?;
    tokio::fs::write(&path, json).await?;
    debug!(path = %path.display(), "Wrote metadata sidecar");
    Ok(path)
}
