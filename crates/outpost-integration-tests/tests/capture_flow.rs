//! Capture path: bounded cache, policy gate, storage failures.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{OutpostHarness, quiet_config, wait_for};
use outpost_config::RetentionPolicy;
use outpost_core::{AuditRecord, ResourceKind, Severity};
use outpost_events::EventBus;
use outpost_queue::{CaptureOutcome, LocalStore, RejectReason, Recorder};
use outpost_storage::{KvStore, ScopedKvStore};
use outpost_test::{FailingKvStore, MockRemote, test_audit, test_audit_for, test_create};

#[tokio::test]
async fn test_cache_keeps_newest_within_bound() {
    let mut config = quiet_config();
    config.storage.cache_bound = 3;
    let h = OutpostHarness::with_config(config, MockRemote::new()).await;
    let mut ids = Vec::new();
    for action in ["a", "b", "c", "d"] {
        let outcome = h
            .outpost
            .capture_audit(test_audit_for("invoices", action, Severity::Info))
            .await;
        ids.push(outcome.event_id().unwrap());
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let view: Vec<_> = h.outpost.view().await.iter().map(|e| e.id).collect();
    assert_eq!(view, vec![ids[3], ids[2], ids[1]]);
    assert_eq!(h.outpost.status().await.total, 3);
}

#[tokio::test]
async fn test_exclusions_apply_to_both_kinds_and_severity_to_audits_only() {
    let h = OutpostHarness::new().await;
    h.outpost
        .update_policy(
            RetentionPolicy::default()
                .with_minimum_severity(Severity::Warning)
                .excluding_module("payroll"),
        )
        .await
        .unwrap();

    let low = h
        .outpost
        .capture_audit(test_audit_for("invoices", "view", Severity::Info))
        .await;
    assert!(matches!(
        low,
        CaptureOutcome::Rejected(RejectReason::BelowMinimumSeverity { .. })
    ));

    let excluded = h
        .outpost
        .capture_audit(test_audit_for("payroll", "approve", Severity::Critical))
        .await;
    assert!(matches!(
        excluded,
        CaptureOutcome::Rejected(RejectReason::ExcludedModule { .. })
    ));

    let kept = h
        .outpost
        .capture_audit(test_audit_for("invoices", "void", Severity::Critical))
        .await;
    assert!(kept.is_queued());

    let excluded_op = h
        .outpost
        .defer_operation(test_create(ResourceKind::Payroll))
        .await;
    assert!(matches!(
        excluded_op,
        CaptureOutcome::Rejected(RejectReason::ExcludedModule { .. })
    ));

    // Operations carry no severity, so the threshold does not apply.
    let op = h
        .outpost
        .defer_operation(test_create(ResourceKind::Invoices))
        .await;
    assert!(op.is_queued());
    assert_eq!(h.outpost.status().await.total, 2);
}

#[tokio::test]
async fn test_disabled_policy_rejects_everything_audited() {
    let h = OutpostHarness::new().await;
    h.outpost
        .update_policy(RetentionPolicy::default().disabled())
        .await
        .unwrap();

    let outcome = h.outpost.capture_audit(test_audit()).await;
    assert_eq!(outcome, CaptureOutcome::Rejected(RejectReason::Disabled));
    assert_eq!(h.outpost.status().await.total, 0);
}

#[tokio::test]
async fn test_capture_is_kept_in_memory_when_disk_fails() {
    let kv = Arc::new(FailingKvStore::new());
    let scoped = || {
        let kv: Arc<dyn KvStore> = kv.clone();
        ScopedKvStore::new(kv, "outpost:it").unwrap()
    };
    let store = Arc::new(
        LocalStore::open(scoped(), 100, RetentionPolicy::default())
            .await
            .unwrap(),
    );
    let recorder = Recorder::new(Arc::clone(&store), EventBus::new());

    kv.set_failing(true);
    let first = recorder
        .record_audit(AuditRecord::new("u-1", "Ana", "invoices", "void"))
        .await;
    assert!(matches!(first, CaptureOutcome::StoredInMemory(_)));
    assert!(store.is_dirty().await);

    kv.set_failing(false);
    let second = recorder
        .record_audit(AuditRecord::new("u-1", "Ana", "invoices", "refund"))
        .await;
    assert!(matches!(second, CaptureOutcome::Stored(_)));

    let reopened = LocalStore::open(scoped(), 100, RetentionPolicy::default())
        .await
        .unwrap();
    assert_eq!(reopened.len().await, 2);
}

#[tokio::test]
async fn test_capture_wakes_sync_when_enabled() {
    let mut config = quiet_config();
    config.sync.sync_on_capture = true;
    let h = OutpostHarness::with_config(config, MockRemote::new()).await;
    let mut events = h.outpost.bus().subscribe();

    let id = h
        .outpost
        .capture_audit(test_audit())
        .await
        .event_id()
        .unwrap();
    wait_for(&mut events, "sync_completed").await;

    assert!(h.remote.accepted(id));
    assert_eq!(h.outpost.status().await.total, 0);
}
