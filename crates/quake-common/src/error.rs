//! Error types for the record model

use thiserror::Error;

/// Result type alias for record-level operations
pub type Result<T> = std::result::Result<T, QuakeError>;

/// Errors raised while (de)serializing or validating earthquake records
#[derive(Error, Debug)]
pub enum QuakeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid coordinate {field}: {value}")]
    InvalidCoordinate { field: &'static str, value: String },
}
