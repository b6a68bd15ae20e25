//! The remote boundary.

use async_trait::async_trait;
use outpost_core::{
    AuditRecord, DeferredOperation, EventId, EventKind, EventOrigin, QueuedEvent, Severity,
    SyncState, Timestamp,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RemoteError;
use crate::severity::infer_severity;

/// Default page size for history reads.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// The system of record.
///
/// Implementations must treat redelivery of an already accepted event ID
/// as a no-op; the engine delivers at least once.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Deliver an audit event.
    async fn send_audit(&self, event: &QueuedEvent, record: &AuditRecord)
    -> Result<(), RemoteError>;

    /// Replay a deferred operation captured as `id`.
    async fn replay_operation(
        &self,
        id: EventId,
        operation: &DeferredOperation,
    ) -> Result<(), RemoteError>;

    /// Read history matching `query`, at most `query.limit` records.
    async fn fetch_history(&self, query: &HistoryQuery) -> Result<Vec<QueuedEvent>, RemoteError>;

    /// Deliver `event` through the call matching its kind.
    async fn deliver(&self, event: &QueuedEvent) -> Result<(), RemoteError> {
        match &event.kind {
            EventKind::Audit(record) => self.send_audit(event, record).await,
            EventKind::Operation(operation) => self.replay_operation(event.id, operation).await,
        }
    }
}

/// Filter for history reads. Every set field must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Inclusive lower bound on `created_at`.
    pub from: Option<Timestamp>,
    /// Inclusive upper bound on `created_at`.
    pub to: Option<Timestamp>,
    /// Acting user.
    pub actor_id: Option<String>,
    /// Category tag.
    pub category: Option<String>,
    /// Page size.
    pub limit: usize,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            actor_id: None,
            category: None,
            limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl HistoryQuery {
    /// Everything, one default page.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to `[from, to]`.
    #[must_use]
    pub fn between(mut self, from: Option<Timestamp>, to: Option<Timestamp>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    /// Restrict to one actor.
    #[must_use]
    pub fn by_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    /// Restrict to one category.
    #[must_use]
    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the page size.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Whether a local event falls inside this query.
    #[must_use]
    pub fn matches(&self, event: &QueuedEvent) -> bool {
        if self.from.is_some_and(|from| event.created_at < from) {
            return false;
        }
        if self.to.is_some_and(|to| event.created_at > to) {
            return false;
        }
        if let Some(actor) = &self.actor_id
            && event.kind.as_audit().is_none_or(|r| &r.actor_id != actor)
        {
            return false;
        }
        if let Some(category) = &self.category
            && event.kind.category() != category
        {
            return false;
        }
        true
    }

    /// URL query parameters.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(5);
        if let Some(from) = self.from {
            pairs.push(("from", from.0.to_rfc3339()));
        }
        if let Some(to) = self.to {
            pairs.push(("to", to.0.to_rfc3339()));
        }
        if let Some(actor) = &self.actor_id {
            pairs.push(("actor", actor.clone()));
        }
        if let Some(category) = &self.category {
            pairs.push(("category", category.clone()));
        }
        pairs.push(("limit", self.limit.to_string()));
        pairs
    }
}

/// An audit event as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    /// Locally generated ID, doubling as the idempotency key.
    pub id: String,
    /// Capture time.
    pub created_at: Timestamp,
    /// Acting user.
    pub actor_id: String,
    /// Acting user's display name.
    #[serde(default)]
    pub actor_name: String,
    /// Acting user's role.
    #[serde(default)]
    pub actor_role: String,
    /// Category tag.
    pub module: String,
    /// Action tag.
    pub action: String,
    /// Absent on records written by older clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Type of the affected entity.
    #[serde(default)]
    pub target_type: String,
    /// Identifier of the affected entity.
    #[serde(default)]
    pub target_id: String,
    /// Display name of the affected entity.
    #[serde(default)]
    pub target_name: String,
    /// Human-readable summary.
    #[serde(default)]
    pub description: String,
    /// Snapshot before the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<Value>,
    /// Snapshot after the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
    /// Whether the audited action succeeded.
    #[serde(default = "default_success")]
    pub success: bool,
    /// Failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

fn default_success() -> bool {
    true
}

impl RemoteRecord {
    /// Wire form of a queued audit event.
    #[must_use]
    pub fn from_audit(event: &QueuedEvent, record: &AuditRecord) -> Self {
        Self {
            id: event.id.to_string(),
            created_at: event.created_at,
            actor_id: record.actor_id.clone(),
            actor_name: record.actor_name.clone(),
            actor_role: record.actor_role.clone(),
            module: record.module.clone(),
            action: record.action.clone(),
            severity: Some(record.severity),
            target_type: record.target_type.clone(),
            target_id: record.target_id.clone(),
            target_name: record.target_name.clone(),
            description: record.description.clone(),
            previous_value: record.previous_value.clone(),
            new_value: record.new_value.clone(),
            success: record.success,
            error_message: record.error_message.clone(),
        }
    }

    /// Map to the local shape. Missing severity is inferred from the action.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidResponse`] if the ID is not a UUID.
    pub fn into_event(self) -> Result<QueuedEvent, RemoteError> {
        let id: EventId = self
            .id
            .parse()
            .map_err(|_| RemoteError::InvalidResponse(format!("bad record id '{}'", self.id)))?;
        let severity = self.severity.unwrap_or_else(|| infer_severity(&self.action));

        let record = AuditRecord {
            actor_id: self.actor_id,
            actor_name: self.actor_name,
            actor_role: self.actor_role,
            module: self.module,
            action: self.action,
            severity,
            target_type: self.target_type,
            target_id: self.target_id,
            target_name: self.target_name,
            description: self.description,
            previous_value: self.previous_value,
            new_value: self.new_value,
            success: self.success,
            error_message: self.error_message,
        };

        let mut event = QueuedEvent::new(EventKind::Audit(record))
            .with_id(id)
            .with_created_at(self.created_at);
        event.sync_state = SyncState::Synced;
        event.origin = EventOrigin::Remote;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_record_infers_severity() {
        let id = EventId::new();
        let raw = json!({
            "id": id.to_string(),
            "createdAt": "2026-03-01T10:00:00Z",
            "actorId": "u-2",
            "actorName": "Lee",
            "module": "invoices",
            "action": "refund_issued",
        });
        let event = serde_json::from_value::<RemoteRecord>(raw)
            .unwrap()
            .into_event()
            .unwrap();
        assert_eq!(event.id, id);
        assert_eq!(event.origin, EventOrigin::Remote);
        assert!(event.sync_state.is_synced());
        assert_eq!(event.kind.severity(), Some(Severity::Warning));
        assert!(event.kind.as_audit().unwrap().success);
    }

    #[test]
    fn test_explicit_severity_kept() {
        let event = QueuedEvent::new(EventKind::Audit(
            AuditRecord::new("u-1", "Ana", "payroll", "view").with_severity(Severity::Critical),
        ));
        let record = RemoteRecord::from_audit(&event, event.kind.as_audit().unwrap());
        let wire = serde_json::to_value(&record).unwrap();
        assert_eq!(wire["severity"], "critical");
        assert_eq!(wire["actorId"], "u-1");

        let back = record.into_event().unwrap();
        assert_eq!(back.id, event.id);
        assert_eq!(back.kind, event.kind);
    }

    #[test]
    fn test_bad_id_rejected() {
        let mut record = RemoteRecord::from_audit(
            &QueuedEvent::new(EventKind::Audit(AuditRecord::new("u", "U", "m", "a"))),
            &AuditRecord::new("u", "U", "m", "a"),
        );
        record.id = "srv-17".into();
        assert!(matches!(
            record.into_event(),
            Err(RemoteError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_history_query_matches() {
        let event = QueuedEvent::new(EventKind::Audit(AuditRecord::new(
            "u-9", "Sam", "payroll", "approve",
        )));
        assert!(HistoryQuery::new().matches(&event));
        assert!(HistoryQuery::new().by_actor("u-9").matches(&event));
        assert!(!HistoryQuery::new().by_actor("u-1").matches(&event));
        assert!(!HistoryQuery::new().in_category("invoices").matches(&event));
        let later = event.created_at.after(std::time::Duration::from_secs(60));
        assert!(!HistoryQuery::new().between(Some(later), None).matches(&event));

        let pairs = HistoryQuery::new().in_category("payroll").with_limit(20).query_pairs();
        assert_eq!(
            pairs,
            vec![("category", "payroll".to_owned()), ("limit", "20".to_owned())]
        );
    }
}
