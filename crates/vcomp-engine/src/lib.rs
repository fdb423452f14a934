//! Composition engine.
//!
//! This crate provides:
//! - Segment scheduling against a narration track
//! - Template registry
//! - Quality-gated rendering with bounded retries
//! - Platform export, thumbnail and metadata sidecar
//! - Structured logging and metrics

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod metrics;
pub mod retry;
pub mod scheduler;
pub mod templates;

pub use config::EngineConfig;
pub use engine::{CompositionEngine, CompositionResult};
pub use error::{EngineError, EngineResult};
pub use logging::{init_tracing, RenderLogger};
pub use retry::{
    AttemptRecord, AttemptRunner, ImprovementPolicy, RenderState, RenderStatus, RetryController,
    RetryOutcome,
};
pub use scheduler::{filter_segments, Schedule, SegmentScheduler, MIN_SEGMENT_DURATION};
pub use templates::{TemplateRegistry, DEFAULT_TEMPLATE};
