//! Render metrics.
//!
//! Recorded through the `metrics` facade; the embedding process decides
//! whether an exporter is installed.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const RENDER_ATTEMPTS_TOTAL: &str = "vcomp_render_attempts_total";
    pub const RENDERS_APPROVED_TOTAL: &str = "vcomp_renders_approved_total";
    pub const RENDERS_EXHAUSTED_TOTAL: &str = "vcomp_renders_exhausted_total";
    pub const EXPORT_COMPLIANCE_WARNINGS_TOTAL: &str = "vcomp_export_compliance_warnings_total";
    pub const RENDER_DURATION_SECONDS: &str = "vcomp_render_duration_seconds";
}

/// Record one render attempt and whether it produced a file.
pub fn record_render_attempt(template: &str, rendered: bool) {
    let labels = [
        ("template", template.to_string()),
        ("outcome", if rendered { "rendered" } else { "failed" }.to_string()),
    ];
    counter!(names::RENDER_ATTEMPTS_TOTAL, &labels).increment(1);
}

/// Record encode wall time.
pub fn record_render_duration(template: &str, duration_secs: f64) {
    let labels = [("template", template.to_string())];
    histogram!(names::RENDER_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_render_approved(template: &str, retries: u32) {
    let labels = [
        ("template", template.to_string()),
        ("retries", retries.to_string()),
    ];
    counter!(names::RENDERS_APPROVED_TOTAL, &labels).increment(1);
}

pub fn record_render_exhausted(template: &str) {
    let labels = [("template", template.to_string())];
    counter!(names::RENDERS_EXHAUSTED_TOTAL, &labels).increment(1);
}

/// Record compliance warnings for one export.
pub fn record_compliance_warnings(profile: &str, count: usize) {
    if count == 0 {
        return;
    }
    let labels = [("profile", profile.to_string())];
    counter!(names::EXPORT_COMPLIANCE_WARNINGS_TOTAL, &labels).increment(count as u64);
}
