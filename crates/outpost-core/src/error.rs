//! Core error types.

use thiserror::Error;

/// Errors raised while parsing or validating core model values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Unknown severity name.
    #[error("unknown severity: {0}")]
    InvalidSeverity(String),

    /// Unknown resource kind.
    #[error("unknown resource kind: {0}")]
    InvalidResource(String),

    /// Unknown or malformed HTTP method.
    #[error("unknown method: {0}")]
    InvalidMethod(String),

    /// Malformed event identifier.
    #[error("invalid event id: {0}")]
    InvalidId(String),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
