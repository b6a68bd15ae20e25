//! Prelude module - commonly used types for convenient import.
//!
//! Use `use outpost_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{CoreError, CoreResult};

// Queue model
pub use crate::{EventKind, EventOrigin, QueuedEvent, SyncState};

// Capture kinds
pub use crate::{AuditRecord, DeferredOperation, Method, Operation, ReplayRequest};

// Common types
pub use crate::{EventId, ResourceKind, RetryPolicy, Severity, Timestamp};
