//! Error types for cfpq core

use std::time::Duration;

use thiserror::Error;

/// Result type alias using the crate's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Path query error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Unsupported query: {0}")]
    Unsupported(String),

    #[error("Iteration limit exceeded: {iterations} (max {max})")]
    LimitExceeded { iterations: u64, max: u64 },

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Query cancelled")]
    Cancelled,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
