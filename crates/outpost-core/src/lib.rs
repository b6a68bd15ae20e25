//! Outpost Core - data model for the local-first event queue.
//!
//! This crate provides the types shared by every other Outpost crate:
//! - [`QueuedEvent`], the unit of work held in the local queue
//! - [`AuditRecord`] and [`DeferredOperation`], the two capture kinds
//! - [`Severity`] and [`ResourceKind`], closed enums used for filtering
//!   and cache invalidation
//! - [`RetryPolicy`], backoff arithmetic for failed deliveries
//!
//! # Example
//!
//! ```rust
//! use outpost_core::prelude::*;
//!
//! let record = AuditRecord::new("u-17", "Dana", "invoices", "void")
//!     .with_severity(Severity::Warning)
//!     .with_target("invoice", "INV-204", "INV-204");
//! let event = QueuedEvent::new(EventKind::Audit(record));
//!
//! assert!(event.sync_state.is_pending_delivery());
//! assert_eq!(event.kind.category(), "invoices");
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod event;
mod operation;
mod record;
mod retry;
mod types;

pub use error::{CoreError, CoreResult};
pub use event::{EventKind, EventOrigin, QueuedEvent, SyncState};
pub use operation::{
    DeferredOperation, Method, OPERATION_SCHEMA_VERSION, Operation, ReplayRequest,
};
pub use record::AuditRecord;
pub use retry::RetryPolicy;
pub use types::{EventId, ResourceKind, Severity, Timestamp};
