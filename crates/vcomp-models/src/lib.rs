//! Shared data models for the VComp composition engine.
//!
//! This crate provides Serde-serializable types for:
//! - Composition requests, segments and captions
//! - Templates and visual effects
//! - Render settings and platform export profiles
//! - Quality metrics and quality gates
//! - Render metadata sidecars

pub mod caption;
pub mod effect;
pub mod encoding;
pub mod error;
pub mod metadata;
pub mod platform;
pub mod quality;
pub mod request;
pub mod segment;
pub mod template;
pub mod thumbnail;

// Re-export common types
pub use caption::{Caption, CaptionAnchor, CaptionStyle};
pub use effect::Effect;
pub use encoding::RenderSettings;
pub use error::{ModelError, ModelResult};
pub use metadata::{ExportSummary, RenderMetadata};
pub use platform::PlatformProfile;
pub use quality::{QualityGate, QualityMetrics, QualityThresholds};
pub use request::{AudioTrack, CompositionRequest, RequestId};
pub use segment::VideoSegment;
pub use template::{BrandingConfig, Corner, Resolution, TemplateConfig, TextStyle, TransitionType};
pub use thumbnail::{ThumbnailOptions, ThumbnailStyle};
