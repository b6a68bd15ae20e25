//! Outpost Query - read-side helpers over a list of events.
//!
//! Everything here is a pure function of its input; callers pass either the
//! local cache or a reconciled view.
//!
//! ```rust
//! use outpost_core::prelude::*;
//! use outpost_query::{EventCriteria, ExportFormat, export, filter, stats};
//!
//! let events = vec![QueuedEvent::new(EventKind::Audit(
//!     AuditRecord::new("u-1", "Ana", "invoices", "void").with_severity(Severity::Warning),
//! ))];
//!
//! let warnings = filter(&events, &EventCriteria::new().min_severity(Severity::Warning));
//! assert_eq!(stats(&warnings).by_category["invoices"], 1);
//! assert!(export(&warnings, ExportFormat::Csv).unwrap().starts_with("Timestamp,"));
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod criteria;
mod error;
mod export;
mod stats;

pub use criteria::{EventCriteria, SeverityMatch, filter};
pub use error::{QueryError, QueryResult};
pub use export::{CSV_HEADER, ExportFormat, csv_row, export, export_with_offset};
pub use stats::{ActorCount, EventStats, stats};
