//! Prelude module - commonly used types for convenient import.

pub use crate::{
    EventCriteria, EventStats, ExportFormat, QueryError, QueryResult, SeverityMatch, export,
    filter, stats,
};
