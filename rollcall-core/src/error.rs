//! Error types for the rollcall ecosystem.

use thiserror::Error;

/// Errors that can occur in rollcall operations.
#[derive(Error, Debug)]
pub enum RollcallError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Backend request timed out after {0}s")]
    BackendTimeout(u64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown attendance status: {0}")]
    UnknownStatus(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),
}

/// Result type alias for rollcall operations.
pub type RollcallResult<T> = Result<T, RollcallError>;
