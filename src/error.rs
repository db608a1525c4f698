//! Error types for the Mathesis classifier subsystem
//!
//! This module provides structured error handling using thiserror for
//! error definitions and anyhow for propagation at the boundaries.

use crate::types::TrainingJobStatus;
use thiserror::Error;

/// Main error type for Mathesis operations
#[derive(Error, Debug)]
pub enum MathesisError {
    /// Entity failed validation; reports the offending field
    #[error("Validation error on field '{field}': {message}")]
    Validation { field: String, message: String },

    /// A required precondition was not met (e.g. ML classification disabled)
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// The interaction type has no classifier support
    #[error("No classifier found for interaction: {0}")]
    UnsupportedInteraction(String),

    /// Neither a rule match nor a default outcome exists for the answer
    #[error("No match for answer: {0}")]
    NoMatch(String),

    /// Illegal training job status change
    #[error("The status change {from} to {to} is not valid")]
    StateTransition {
        from: TrainingJobStatus,
        to: TrainingJobStatus,
    },

    /// Missing job, mapping, or classifier data record
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Resource already exists
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Storage operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl MathesisError {
    /// Shorthand for a validation failure on a named field
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        MathesisError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for Mathesis operations
pub type Result<T> = std::result::Result<T, MathesisError>;

/// Convert anyhow::Error to MathesisError
impl From<anyhow::Error> for MathesisError {
    fn from(err: anyhow::Error) -> Self {
        MathesisError::Other(err.to_string())
    }
}
