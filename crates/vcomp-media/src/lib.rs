#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper and file-level primitives for the composition engine.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with a wall-clock timeout
//! - Progress parsing from `-progress pipe:2`
//! - Probing and raw frame extraction
//! - The layout compositor (segments, captions, branding) and renderer
//! - Deterministic quality scoring
//! - Platform export with advisory compliance checks
//! - Thumbnail extraction

pub mod branding;
pub mod command;
pub mod compose;
pub mod error;
pub mod export;
pub mod filters;
pub mod frames;
pub mod probe;
pub mod progress;
pub mod quality;
pub mod render;
pub mod thumbnail;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegInput, FfmpegRunner};
pub use compose::{ComposedTimeline, CompositionInput, Compositor, SourceInfo};
pub use error::{MediaError, MediaResult};
pub use export::{
    ComplianceIssue, ComplianceReport, ComplianceStatus, ExportOutput, ExportResult, PlatformExporter,
};
pub use frames::GrayFrame;
pub use probe::{probe_duration, probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use quality::{EvaluatorConfig, QualityEvaluator};
pub use render::{RenderOutput, Renderer};
pub use thumbnail::{generate_thumbnail, ThumbnailOutput};
