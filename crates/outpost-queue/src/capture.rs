//! Capture API.
//!
//! [`Recorder::try_record`] is the internal, `Result`-returning path. The
//! public entry points wrap it and always resolve to a [`CaptureOutcome`]:
//! capture must never break the business action that triggered it.

use std::sync::Arc;

use outpost_core::{AuditRecord, DeferredOperation, EventId, EventKind, QueuedEvent};
use outpost_events::{EventBus, EventMetadata, OutpostEvent};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::QueueError;
use crate::policy::{RejectReason, evaluate};
use crate::store::LocalStore;

const SOURCE: &str = "capture";

/// How a capture call resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Queued and durably written.
    Stored(EventId),
    /// Queued in memory; the durable write failed and will be retried with
    /// the next mutation.
    StoredInMemory(EventId),
    /// Declined by the capture policy.
    Rejected(RejectReason),
}

impl CaptureOutcome {
    /// The queued item's ID, unless the capture was rejected.
    #[must_use]
    pub fn event_id(&self) -> Option<EventId> {
        match self {
            Self::Stored(id) | Self::StoredInMemory(id) => Some(*id),
            Self::Rejected(_) => None,
        }
    }

    /// Whether the item entered the queue.
    #[must_use]
    pub fn is_queued(&self) -> bool {
        self.event_id().is_some()
    }
}

/// Why [`Recorder::try_record`] did not fully succeed.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Declined by the capture policy.
    #[error("capture rejected: {0}")]
    Rejected(RejectReason),

    /// Queued in memory, but the durable write failed.
    #[error("event {id} not persisted: {source}")]
    NotPersisted {
        /// The queued item.
        id: EventId,
        /// Underlying store error.
        #[source]
        source: QueueError,
    },
}

/// Evaluates the capture policy and appends accepted items to the store.
///
/// Cheap to clone; clones share the store, bus and sync signal.
#[derive(Debug, Clone)]
pub struct Recorder {
    store: Arc<LocalStore>,
    bus: EventBus,
    sync_signal: Option<Arc<Notify>>,
}

impl Recorder {
    /// Create a recorder writing to `store` and announcing on `bus`.
    #[must_use]
    pub fn new(store: Arc<LocalStore>, bus: EventBus) -> Self {
        Self {
            store,
            bus,
            sync_signal: None,
        }
    }

    /// Wake `signal` after every accepted capture.
    #[must_use]
    pub fn with_sync_signal(mut self, signal: Arc<Notify>) -> Self {
        self.sync_signal = Some(signal);
        self
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    /// Capture `kind`, reporting every failure.
    ///
    /// The policy is read fresh from the store on each call.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::Rejected`] if the policy declines the item
    /// - [`CaptureError::NotPersisted`] if the item is queued but the write
    ///   failed
    pub async fn try_record(&self, kind: EventKind) -> Result<EventId, CaptureError> {
        let policy = self.store.policy().await;
        if let Err(reason) = evaluate(&kind, &policy) {
            debug!(
                category = kind.category(),
                action = kind.action(),
                %reason,
                "Capture declined by policy"
            );
            self.bus.publish(OutpostEvent::CaptureRejected {
                metadata: EventMetadata::new(SOURCE),
                category: kind.category().to_owned(),
                action: kind.action().to_owned(),
                reason: reason.to_string(),
            });
            return Err(CaptureError::Rejected(reason));
        }

        let event = QueuedEvent::new(kind);
        let id = event.id;
        let kind_name = event.kind.kind_name();
        let category = event.kind.category().to_owned();

        let appended = self.store.append(event).await;
        self.wake_sync();

        match appended {
            Ok(_) => {
                debug!(event_id = %id, kind = kind_name, %category, "Captured event");
                self.bus.publish(OutpostEvent::EventCaptured {
                    metadata: EventMetadata::new(SOURCE),
                    event_id: id,
                    kind: kind_name.to_owned(),
                    category,
                });
                Ok(id)
            },
            Err(source) => {
                self.bus.publish(OutpostEvent::CaptureNotPersisted {
                    metadata: EventMetadata::new(SOURCE),
                    event_id: id,
                    error: source.to_string(),
                });
                Err(CaptureError::NotPersisted { id, source })
            },
        }
    }

    /// Capture `kind`. Never fails.
    pub async fn record(&self, kind: EventKind) -> CaptureOutcome {
        match self.try_record(kind).await {
            Ok(id) => CaptureOutcome::Stored(id),
            Err(CaptureError::Rejected(reason)) => CaptureOutcome::Rejected(reason),
            Err(CaptureError::NotPersisted { id, source }) => {
                warn!(event_id = %id, error = %source, "Captured event held in memory only");
                CaptureOutcome::StoredInMemory(id)
            },
        }
    }

    /// Capture an audit record. Never fails.
    pub async fn record_audit(&self, record: AuditRecord) -> CaptureOutcome {
        self.record(EventKind::Audit(record)).await
    }

    /// Queue a mutation for replay against the remote. Never fails.
    pub async fn defer_operation(&self, operation: DeferredOperation) -> CaptureOutcome {
        self.record(EventKind::Operation(operation)).await
    }

    /// Capture `kind` on a background task and return immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn record_detached(&self, kind: EventKind) -> JoinHandle<CaptureOutcome> {
        let recorder = self.clone();
        tokio::spawn(async move { recorder.record(kind).await })
    }

    fn wake_sync(&self) {
        if let Some(signal) = &self.sync_signal {
            signal.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FlakyKv, scoped};
    use outpost_config::RetentionPolicy;
    use outpost_core::{ResourceKind, Severity, SyncState};
    use outpost_storage::MemoryKvStore;
    use serde_json::json;
    use std::time::Duration;

    async fn recorder_with(policy: RetentionPolicy) -> Recorder {
        let store = LocalStore::open(scoped(Arc::new(MemoryKvStore::new())), 100, policy)
            .await
            .unwrap();
        Recorder::new(Arc::new(store), EventBus::new())
    }

    fn audit(action: &str, severity: Severity) -> AuditRecord {
        AuditRecord::new("u-7", "Kim", "invoicing", action).with_severity(severity)
    }

    #[tokio::test]
    async fn test_minimum_severity_filters() {
        let recorder =
            recorder_with(RetentionPolicy::default().with_minimum_severity(Severity::Warning))
                .await;

        let outcome = recorder.record_audit(audit("view", Severity::Info)).await;
        assert!(matches!(
            outcome,
            CaptureOutcome::Rejected(RejectReason::BelowMinimumSeverity { .. })
        ));

        let outcome = recorder.record_audit(audit("void", Severity::Error)).await;
        assert!(matches!(outcome, CaptureOutcome::Stored(_)));

        let events = recorder.store().snapshot().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sync_state, SyncState::Pending);
        assert_eq!(events[0].kind.action(), "void");
    }

    #[tokio::test]
    async fn test_disabled_rejects_operations_too() {
        let recorder = recorder_with(RetentionPolicy::default().disabled()).await;
        let op = DeferredOperation::create(ResourceKind::Invoices, json!({"total": 10}));
        let outcome = recorder.defer_operation(op).await;
        assert_eq!(outcome, CaptureOutcome::Rejected(RejectReason::Disabled));
        assert!(recorder.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_policy_change_applies_to_next_capture() {
        let recorder = recorder_with(RetentionPolicy::default()).await;
        assert!(recorder.record_audit(audit("print", Severity::Info)).await.is_queued());

        recorder
            .store()
            .update_policy(RetentionPolicy::default().excluding_action("print"))
            .await
            .unwrap();
        assert!(!recorder.record_audit(audit("print", Severity::Info)).await.is_queued());
        assert_eq!(recorder.store().len().await, 1);
    }

    #[tokio::test]
    async fn test_write_failure_is_not_surfaced() {
        let kv = Arc::new(FlakyKv::default());
        let store = LocalStore::open(scoped(kv.clone()), 10, RetentionPolicy::default())
            .await
            .unwrap();
        let recorder = Recorder::new(Arc::new(store), EventBus::new());
        let mut events = recorder.bus.subscribe();

        kv.set_failing(true);
        let outcome = recorder.record_audit(audit("refund", Severity::Warning)).await;
        let CaptureOutcome::StoredInMemory(id) = outcome else {
            panic!("expected in-memory capture, got {outcome:?}");
        };
        assert_eq!(recorder.store().snapshot().await[0].id, id);

        let published = events.try_recv().unwrap();
        assert_eq!(published.event_type(), "capture_not_persisted");
    }

    #[tokio::test]
    async fn test_try_record_reports_rejection() {
        let recorder = recorder_with(RetentionPolicy::default().excluding_module("invoicing")).await;
        let err = recorder
            .try_record(EventKind::Audit(audit("void", Severity::Error)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Rejected(RejectReason::ExcludedModule { .. })
        ));
    }

    #[tokio::test]
    async fn test_accepted_capture_wakes_sync() {
        let signal = Arc::new(Notify::new());
        let recorder = recorder_with(RetentionPolicy::default())
            .await
            .with_sync_signal(Arc::clone(&signal));

        recorder.record_audit(audit("void", Severity::Error)).await;
        tokio::time::timeout(Duration::from_secs(1), signal.notified())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_record_detached() {
        let recorder = recorder_with(RetentionPolicy::default()).await;
        let handle =
            recorder.record_detached(EventKind::Audit(audit("login", Severity::Info)));
        assert!(handle.await.unwrap().is_queued());
        assert_eq!(recorder.store().len().await, 1);
    }
}
