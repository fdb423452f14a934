//! Model-level validation errors.

use thiserror::Error;

/// Result type for model construction and validation.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while building or validating model values.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("Unknown effect: {0}")]
    UnknownEffect(String),

    #[error("Unknown platform profile: {0}")]
    UnknownPlatform(String),

    #[error("Invalid template '{name}': {reason}")]
    InvalidTemplate { name: String, reason: String },

    #[error("Invalid caption: {0}")]
    InvalidCaption(String),
}

impl ModelError {
    /// Create an invalid template error.
    pub fn invalid_template(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
