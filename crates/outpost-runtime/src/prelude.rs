//! Prelude module - commonly used types for convenient import.

pub use crate::{Outpost, OutpostStatus, RuntimeError, RuntimeResult};

pub use outpost_query::{EventCriteria, EventStats, ExportFormat};
pub use outpost_queue::CaptureOutcome;
pub use outpost_sync::{HistoryQuery, MergedView, SyncOutcome, SyncReport};
