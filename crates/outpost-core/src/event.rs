//! The queued event and its delivery state.

use serde::{Deserialize, Serialize};

use crate::operation::DeferredOperation;
use crate::record::AuditRecord;
use crate::types::{EventId, Severity, Timestamp};

/// What was captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// An audit trail entry, delivered to `POST /events`.
    Audit(AuditRecord),
    /// A mutation to replay against the resource's endpoint.
    Operation(DeferredOperation),
}

impl EventKind {
    /// Category tag: the audit module, or the operation's resource.
    #[must_use]
    pub fn category(&self) -> &str {
        match self {
            Self::Audit(record) => &record.module,
            Self::Operation(op) => op.module(),
        }
    }

    /// Action tag.
    #[must_use]
    pub fn action(&self) -> &str {
        match self {
            Self::Audit(record) => &record.action,
            Self::Operation(op) => op.operation.action(),
        }
    }

    /// Severity, present only for audit records.
    #[must_use]
    pub fn severity(&self) -> Option<Severity> {
        match self {
            Self::Audit(record) => Some(record.severity),
            Self::Operation(_) => None,
        }
    }

    /// The audit record, if this is one.
    #[must_use]
    pub fn as_audit(&self) -> Option<&AuditRecord> {
        match self {
            Self::Audit(record) => Some(record),
            Self::Operation(_) => None,
        }
    }

    /// Short kind name for logs.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Audit(_) => "audit",
            Self::Operation(_) => "operation",
        }
    }
}

/// Delivery state of a queued event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncState {
    /// Not yet delivered.
    #[default]
    Pending,
    /// Accepted by the remote; eligible for removal and never re-sent.
    Synced,
    /// Last delivery attempt failed; retried on a later run.
    Failed {
        /// Why the last attempt failed.
        reason: String,
    },
    /// Retries exhausted; kept for inspection, never retried automatically.
    DeadLetter {
        /// Why the final attempt failed.
        reason: String,
    },
}

impl SyncState {
    /// `Pending` or `Failed`: still owed to the remote.
    #[must_use]
    pub fn is_pending_delivery(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed { .. })
    }

    /// Whether the remote accepted the event.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }

    /// Whether retries were exhausted.
    #[must_use]
    pub fn is_dead_letter(&self) -> bool {
        matches!(self, Self::DeadLetter { .. })
    }

    /// The recorded failure reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Failed { reason } | Self::DeadLetter { reason } => Some(reason),
            Self::Pending | Self::Synced => None,
        }
    }

    /// Lowercase state name.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Failed { .. } => "failed",
            Self::DeadLetter { .. } => "dead_letter",
        }
    }
}

/// Where a queued event came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOrigin {
    /// Captured on this device.
    #[default]
    Local,
    /// Fetched from remote history during reconciliation.
    Remote,
}

/// The unit of work placed in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedEvent {
    /// Locally generated identifier.
    pub id: EventId,
    /// Capture time; immutable, used for ordering.
    pub created_at: Timestamp,
    /// The captured payload.
    #[serde(flatten)]
    pub kind: EventKind,
    /// Delivery state.
    #[serde(default)]
    pub sync_state: SyncState,
    /// Delivery attempts made so far.
    #[serde(default)]
    pub attempts: u32,
    /// Earliest time the next automatic attempt may run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<Timestamp>,
    /// Local capture or remote history.
    #[serde(default)]
    pub origin: EventOrigin,
}

impl QueuedEvent {
    /// Capture `kind` now with a fresh ID.
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: EventId::new(),
            created_at: Timestamp::now(),
            kind,
            sync_state: SyncState::Pending,
            attempts: 0,
            next_attempt_at: None,
            origin: EventOrigin::Local,
        }
    }

    /// Override the capture time.
    #[must_use]
    pub fn with_created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = created_at;
        self
    }

    /// Override the identifier.
    #[must_use]
    pub fn with_id(mut self, id: EventId) -> Self {
        self.id = id;
        self
    }

    /// Whether an automatic run may attempt delivery at `now`.
    #[must_use]
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.next_attempt_at.is_none_or(|at| at <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::DeferredOperation;
    use crate::types::ResourceKind;
    use std::time::Duration;

    fn audit() -> EventKind {
        EventKind::Audit(
            AuditRecord::new("u-1", "Ana", "inventory", "adjust").with_severity(Severity::Error),
        )
    }

    #[test]
    fn test_new_event_is_pending() {
        let event = QueuedEvent::new(audit());
        assert_eq!(event.sync_state, SyncState::Pending);
        assert_eq!(event.attempts, 0);
        assert_eq!(event.origin, EventOrigin::Local);
        assert!(event.is_due(Timestamp::now()));
    }

    #[test]
    fn test_kind_accessors() {
        let kind = audit();
        assert_eq!(kind.category(), "inventory");
        assert_eq!(kind.action(), "adjust");
        assert_eq!(kind.severity(), Some(Severity::Error));

        let op = EventKind::Operation(DeferredOperation::delete(ResourceKind::Customers, "9"));
        assert_eq!(op.category(), "customers");
        assert_eq!(op.action(), "delete");
        assert!(op.severity().is_none());
        assert!(op.as_audit().is_none());
    }

    #[test]
    fn test_sync_state_predicates() {
        assert!(SyncState::Pending.is_pending_delivery());
        assert!(
            SyncState::Failed {
                reason: "503".into()
            }
            .is_pending_delivery()
        );
        assert!(!SyncState::Synced.is_pending_delivery());
        let dead = SyncState::DeadLetter {
            reason: "gone".into(),
        };
        assert!(!dead.is_pending_delivery());
        assert_eq!(dead.reason(), Some("gone"));
        assert_eq!(dead.label(), "dead_letter");
    }

    #[test]
    fn test_backoff_window() {
        let now = Timestamp::now();
        let mut event = QueuedEvent::new(audit());
        event.next_attempt_at = Some(now.after(Duration::from_secs(60)));
        assert!(!event.is_due(now));
        assert!(event.is_due(now.after(Duration::from_secs(61))));
    }

    #[test]
    fn test_serde_shape() {
        let event = QueuedEvent::new(audit());
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "audit");
        assert_eq!(value["actor_name"], "Ana");
        assert_eq!(value["sync_state"]["state"], "pending");

        let back: QueuedEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }
}
