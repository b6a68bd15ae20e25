//! Queue error types.

use outpost_config::ConfigError;
use outpost_storage::StorageError;
use thiserror::Error;

/// Errors from local store operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The durable write failed. The in-memory state already reflects the
    /// change and is written again on the next mutation or flush.
    #[error("persistence failure: {0}")]
    Persistence(#[from] StorageError),

    /// A policy update failed validation.
    #[error("invalid policy: {0}")]
    InvalidPolicy(#[from] ConfigError),
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;
