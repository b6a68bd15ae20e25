//! Test fixtures for common types.

use std::time::Duration;

use serde_json::json;

use outpost_core::{
    AuditRecord, DeferredOperation, EventKind, EventOrigin, QueuedEvent, ResourceKind, Severity,
    SyncState, Timestamp,
};

/// An `Info` audit record by a fixed test user.
#[must_use]
pub fn test_audit() -> AuditRecord {
    AuditRecord::new("user-1", "Test User", "invoices", "update")
        .with_role("admin")
        .with_target("invoice", "INV-1", "Invoice 1")
        .with_description("Updated invoice")
}

/// An audit record for a specific module, action and severity.
#[must_use]
pub fn test_audit_for(
    module: impl Into<String>,
    action: impl Into<String>,
    severity: Severity,
) -> AuditRecord {
    AuditRecord::new("user-1", "Test User", module, action).with_severity(severity)
}

/// A queued audit event created `age` ago.
#[must_use]
pub fn test_audit_at(record: AuditRecord, age: Duration) -> QueuedEvent {
    QueuedEvent::new(EventKind::Audit(record)).with_created_at(Timestamp::now().before(age))
}

/// A deferred create with a small JSON body.
#[must_use]
pub fn test_create(resource: ResourceKind) -> DeferredOperation {
    DeferredOperation::create(resource, json!({ "name": "test", "quantity": 1 }))
}

/// A deferred delete.
#[must_use]
pub fn test_delete(resource: ResourceKind, id: impl Into<String>) -> DeferredOperation {
    DeferredOperation::delete(resource, id)
}

/// An already-synced event as it comes back from the remote.
#[must_use]
pub fn remote_event(record: AuditRecord, age: Duration) -> QueuedEvent {
    let mut event = test_audit_at(record, age);
    event.origin = EventOrigin::Remote;
    event.sync_state = SyncState::Synced;
    event
}
