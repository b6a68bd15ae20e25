//! Query error types.

use thiserror::Error;

/// Errors from query and export operations.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Unknown export format name.
    #[error("unknown export format: {0}")]
    UnknownFormat(String),

    /// JSON encoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;
