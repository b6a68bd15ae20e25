//! Runtime error types.

use outpost_config::ConfigError;
use outpost_query::QueryError;
use outpost_queue::QueueError;
use outpost_storage::StorageError;
use outpost_sync::{RemoteError, SyncError};
use thiserror::Error;

/// Errors surfaced to callers of explicit operations.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration or policy validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The storage backend could not be opened or closed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A local store operation failed.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The remote client could not be built.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Reconciliation failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Export failed.
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
