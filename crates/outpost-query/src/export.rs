//! Serialization of event lists.
//!
//! JSON output is a pretty-printed array of the full records and parses
//! back to an equal list. CSV output has one header row and one row per
//! event; the description is always quoted, any other field is quoted
//! when it contains a delimiter, quote or line break, and quotes inside
//! quoted fields are doubled.

use std::str::FromStr;

use chrono::{FixedOffset, Local, Offset};
use outpost_core::{EventKind, Operation, QueuedEvent};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{QueryError, QueryResult};

/// Header row of the CSV export.
pub const CSV_HEADER: &str = "Timestamp,Actor,Role,Module,Action,Severity,Target Type,Target ID,Target Name,Description,Success,Error";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";

/// Export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Pretty-printed JSON array.
    Json,
    /// Comma-separated values with a header row.
    Csv,
}

impl ExportFormat {
    /// Lowercase name, also the usual file extension.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(QueryError::UnknownFormat(s.to_string())),
        }
    }
}

/// Export with timestamps in the machine's local offset.
///
/// # Errors
///
/// Returns [`QueryError::Serialization`] if JSON encoding fails.
pub fn export(events: &[QueuedEvent], format: ExportFormat) -> QueryResult<String> {
    export_with_offset(events, format, Local::now().offset().fix())
}

/// Export with CSV timestamps rendered at `offset`. JSON keeps UTC.
///
/// # Errors
///
/// Returns [`QueryError::Serialization`] if JSON encoding fails.
pub fn export_with_offset(
    events: &[QueuedEvent],
    format: ExportFormat,
    offset: FixedOffset,
) -> QueryResult<String> {
    debug!(format = format.as_str(), count = events.len(), "Exporting events");
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(events)?),
        ExportFormat::Csv => {
            let mut out = String::with_capacity(events.len().saturating_add(1).saturating_mul(160));
            out.push_str(CSV_HEADER);
            out.push('\n');
            for event in events {
                out.push_str(&csv_row(event, offset));
                out.push('\n');
            }
            Ok(out)
        },
    }
}

/// One CSV row, without the line terminator.
#[must_use]
pub fn csv_row(event: &QueuedEvent, offset: FixedOffset) -> String {
    let timestamp = event
        .created_at
        .0
        .with_timezone(&offset)
        .format(TIMESTAMP_FORMAT)
        .to_string();

    let mut row = String::new();
    match &event.kind {
        EventKind::Audit(r) => {
            let fields: [&str; 9] = [
                &timestamp,
                &r.actor_name,
                &r.actor_role,
                &r.module,
                &r.action,
                r.severity.as_str(),
                &r.target_type,
                &r.target_id,
                &r.target_name,
            ];
            push_fields(&mut row, &fields);
            push_quoted(&mut row, &r.description);
            row.push(',');
            row.push_str(if r.success { "true" } else { "false" });
            row.push(',');
            push_field(&mut row, r.error_message.as_deref().unwrap_or_default());
        },
        EventKind::Operation(op) => {
            let request = op.request();
            let target_id = match &op.operation {
                Operation::Update { id, .. } | Operation::Delete { id } => id.as_str(),
                Operation::Create { .. } | Operation::Custom { .. } => "",
            };
            let fields: [&str; 9] = [
                &timestamp,
                "",
                "",
                op.module(),
                op.operation.action(),
                "",
                op.resource.as_str(),
                target_id,
                "",
            ];
            push_fields(&mut row, &fields);
            push_quoted(
                &mut row,
                &format!("{} {}", request.method.as_str(), request.path),
            );
            row.push_str(",,");
            push_field(&mut row, event.sync_state.reason().unwrap_or_default());
        },
    }
    row
}

fn push_fields(row: &mut String, fields: &[&str]) {
    for field in fields {
        push_field(row, field);
        row.push(',');
    }
}

fn push_field(row: &mut String, value: &str) {
    if value.contains([',', '"', '\n', '\r']) {
        push_quoted(row, value);
    } else {
        row.push_str(value);
    }
}

fn push_quoted(row: &mut String, value: &str) {
    row.push('"');
    row.push_str(&value.replace('"', "\"\""));
    row.push('"');
}
