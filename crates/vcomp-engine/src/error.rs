//! Engine error types.

use std::path::PathBuf;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Fatal engine errors.
///
/// Quality-gate and compliance failures are values, not errors; render
/// failures are absorbed by the retry loop and only surface here as
/// [`EngineError::NoRenderedOutput`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No valid segments to schedule")]
    NoValidSegments,

    #[error("Input not found: {0}")]
    MissingInput(PathBuf),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No render attempt produced an output file ({attempts} attempts)")]
    NoRenderedOutput { attempts: u32 },

    #[error("Media error: {0}")]
    Media(#[from] vcomp_media::MediaError),

    #[error("Model error: {0}")]
    Model(#[from] vcomp_models::ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether the error was raised before any render attempt.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            EngineError::NoValidSegments
                | EngineError::MissingInput(_)
                | EngineError::InvalidInput(_)
                | EngineError::TemplateNotFound(_)
                | EngineError::Model(_)
        )
    }
}
