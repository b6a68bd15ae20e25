//! The synchronization engine.
//!
//! At most one run executes at a time. A run:
//!
//! 1. purges expired delivered/dead-lettered items
//! 2. snapshots the undelivered items, oldest first; outside manual runs
//!    the snapshot ends at the first item still inside its backoff window,
//!    so newer items never overtake an older retry
//! 3. delivers each item in turn; a failure is recorded on that item and
//!    the run moves on
//! 4. announces invalidated resources, drops synced items from the cache
//!    and folds the run into the queue metadata
//!
//! The single-flight flag is released by a drop guard, so a run that
//! panics or is cancelled still frees the engine.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use outpost_core::{EventKind, QueuedEvent, ResourceKind, RetryPolicy, SyncState, Timestamp};
use outpost_events::{EventBus, EventMetadata, OutpostEvent};
use outpost_queue::LocalStore;
use serde::Serialize;
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::connectivity::Connectivity;
use crate::remote::RemoteApi;

const SOURCE: &str = "sync";

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    /// Explicit user request; ignores backoff.
    Manual,
    /// The interval timer.
    Periodic,
    /// Connectivity came back.
    Reconnected,
    /// A capture was accepted.
    Capture,
}

impl SyncTrigger {
    /// Snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Periodic => "periodic",
            Self::Reconnected => "reconnected",
            Self::Capture => "capture",
        }
    }

    /// Whether items inside their backoff window are attempted anyway.
    #[must_use]
    pub const fn ignores_backoff(self) -> bool {
        matches!(self, Self::Manual)
    }
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts from one completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// What started the run.
    pub trigger: SyncTrigger,
    /// Items selected for delivery.
    pub attempted: usize,
    /// Items the remote accepted.
    pub synced: usize,
    /// Items that failed and stay queued for retry.
    pub failed: usize,
    /// Items moved to the dead-letter state.
    pub dead_lettered: usize,
    /// Items left untried because connectivity dropped mid-run.
    pub skipped: usize,
    /// Synced items removed from the cache.
    pub removed: usize,
    /// Expired items purged before the run.
    pub purged: usize,
    /// Run start.
    pub started_at: Timestamp,
    /// Run end.
    pub finished_at: Timestamp,
}

impl SyncReport {
    fn new(trigger: SyncTrigger, started_at: Timestamp) -> Self {
        Self {
            trigger,
            attempted: 0,
            synced: 0,
            failed: 0,
            dead_lettered: 0,
            skipped: 0,
            removed: 0,
            purged: 0,
            started_at,
            finished_at: started_at,
        }
    }
}

/// How a call to [`SyncEngine::run_once`] resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The run executed.
    Completed(SyncReport),
    /// Another run was in progress; nothing was done.
    AlreadyRunning,
    /// The device is offline; nothing was done.
    Offline,
}

impl SyncOutcome {
    /// The report, if the run executed.
    #[must_use]
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::AlreadyRunning | Self::Offline => None,
        }
    }
}

/// Clears the single-flight flag when dropped.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drains the local queue to the remote.
pub struct SyncEngine {
    store: Arc<LocalStore>,
    remote: Arc<dyn RemoteApi>,
    bus: EventBus,
    connectivity: Connectivity,
    retry: RetryPolicy,
    /// Items due within this window of a run's start count as due.
    due_window: Duration,
    running: AtomicBool,
}

impl fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("retry", &self.retry)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Create an engine.
    #[must_use]
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteApi>,
        bus: EventBus,
        connectivity: Connectivity,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            remote,
            bus,
            connectivity,
            retry,
            due_window: Duration::ZERO,
            running: AtomicBool::new(false),
        }
    }

    /// Treat retries falling due before `window` has passed as due now.
    ///
    /// Set to the tick interval so a retry scheduled between two ticks is
    /// taken by the earlier one.
    #[must_use]
    pub fn with_due_window(mut self, window: Duration) -> Self {
        self.due_window = window;
        self
    }

    /// Whether a run is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// The connectivity flag the engine consults.
    #[must_use]
    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    /// The retry schedule applied to failures.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Execute one run unless offline or already running.
    pub async fn run_once(&self, trigger: SyncTrigger) -> SyncOutcome {
        if !self.connectivity.is_online() {
            debug!(%trigger, "Offline, sync skipped");
            return SyncOutcome::Offline;
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(%trigger, "Sync already running, trigger ignored");
            return SyncOutcome::AlreadyRunning;
        }
        let _guard = RunGuard(&self.running);

        let started_at = Timestamp::now();
        let mut report = SyncReport::new(trigger, started_at);
        let correlation = Uuid::new_v4();

        report.purged = self
            .store
            .purge_expired(started_at)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Retention purge not persisted");
                0
            });

        let due_at = (!trigger.ignores_backoff()).then(|| started_at.after(self.due_window));
        let batch = self.store.pending_snapshot(due_at).await;
        report.attempted = batch.len();

        self.publish(
            correlation,
            OutpostEvent::SyncStarted {
                metadata: EventMetadata::new(SOURCE),
                trigger: trigger.to_string(),
                pending: batch.len(),
            },
        );

        let mut invalidated = BTreeSet::new();
        for (index, event) in batch.iter().enumerate() {
            if !self.connectivity.is_online() {
                report.skipped = batch.len().saturating_sub(index);
                info!(skipped = report.skipped, "Connectivity lost, run stopped early");
                break;
            }
            self.deliver(event, correlation, &mut report, &mut invalidated)
                .await;
        }

        for resource in invalidated {
            self.publish(
                correlation,
                OutpostEvent::ResourceInvalidated {
                    metadata: EventMetadata::new(SOURCE),
                    resource,
                },
            );
        }

        if report.synced > 0 {
            report.removed = self.store.remove_synced().await.unwrap_or_else(|e| {
                warn!(error = %e, "Removal of synced events not persisted");
                0
            });
        }
        if let Err(e) = self
            .store
            .record_run(report.synced, report.dead_lettered)
            .await
        {
            warn!(error = %e, "Sync metadata not persisted");
        }

        report.finished_at = Timestamp::now();
        info!(
            %trigger,
            attempted = report.attempted,
            synced = report.synced,
            failed = report.failed,
            dead_lettered = report.dead_lettered,
            "Sync run finished"
        );
        self.publish(
            correlation,
            OutpostEvent::SyncCompleted {
                metadata: EventMetadata::new(SOURCE),
                synced: report.synced,
                failed: report.failed,
                dead_lettered: report.dead_lettered,
            },
        );

        SyncOutcome::Completed(report)
    }

    async fn deliver(
        &self,
        event: &QueuedEvent,
        correlation: Uuid,
        report: &mut SyncReport,
        invalidated: &mut BTreeSet<ResourceKind>,
    ) {
        let id = event.id;
        let result = self.remote.deliver(event).await;

        let dead_reason = match result {
            Ok(()) => {
                debug!(event_id = %id, "Delivered");
                if let Err(e) = self.store.mark_synced(id).await {
                    warn!(event_id = %id, error = %e, "Synced state not persisted");
                }
                report.synced = report.synced.saturating_add(1);
                invalidated.insert(match &event.kind {
                    EventKind::Audit(_) => ResourceKind::AuditLogs,
                    EventKind::Operation(op) => op.resource,
                });
                return;
            },
            Err(e) if e.is_permanent() => {
                warn!(event_id = %id, error = %e, "Delivery rejected permanently");
                let reason = e.to_string();
                if let Err(pe) = self.store.mark_dead_letter(id, reason.clone()).await {
                    warn!(event_id = %id, error = %pe, "Dead-letter state not persisted");
                }
                reason
            },
            Err(e) => {
                debug!(event_id = %id, error = %e, "Delivery failed");
                match self.store.mark_failed(id, e.to_string(), &self.retry).await {
                    Ok(Some(SyncState::DeadLetter { reason })) => {
                        warn!(event_id = %id, %reason, "Retries exhausted");
                        reason
                    },
                    Ok(_) => {
                        report.failed = report.failed.saturating_add(1);
                        return;
                    },
                    Err(pe) => {
                        warn!(event_id = %id, error = %pe, "Failed state not persisted");
                        report.failed = report.failed.saturating_add(1);
                        return;
                    },
                }
            },
        };

        report.dead_lettered = report.dead_lettered.saturating_add(1);
        self.publish(
            correlation,
            OutpostEvent::ItemDeadLettered {
                metadata: EventMetadata::new(SOURCE),
                event_id: id,
                reason: dead_reason,
            },
        );
    }

    fn publish(&self, correlation: Uuid, mut event: OutpostEvent) {
        event.metadata_mut().correlation_id = Some(correlation);
        self.bus.publish(event);
    }
}

/// Drive `engine` until `shutdown` fires or its sender is dropped.
///
/// Runs on every `interval` tick starting one interval after spawn, on
/// every offline to online transition, and whenever `capture_signal` is
/// notified.
/// Runs started here never overlap; a trigger that arrives mid-run is
/// served by the next loop iteration.
pub fn spawn_sync_loop(
    engine: Arc<SyncEngine>,
    interval: Duration,
    capture_signal: Arc<Notify>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    let mut online = engine.connectivity().subscribe();
    online.mark_unchanged();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.reset();

        debug!(interval_secs = interval.as_secs(), "Sync loop started");
        loop {
            let trigger = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                Ok(()) = online.changed() => {
                    if *online.borrow_and_update() {
                        SyncTrigger::Reconnected
                    } else {
                        continue;
                    }
                },
                () = capture_signal.notified() => SyncTrigger::Capture,
                _ = ticker.tick() => SyncTrigger::Periodic,
            };
            engine.run_once(trigger).await;
        }
        debug!("Sync loop stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::remote::HistoryQuery;
    use async_trait::async_trait;
    use outpost_config::RetentionPolicy;
    use outpost_core::{AuditRecord, DeferredOperation, EventId, Severity};
    use outpost_storage::{MemoryKvStore, ScopedKvStore};
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Fails the listed IDs, records every call, optionally waits on a gate.
    #[derive(Default)]
    struct StubRemote {
        failing: Mutex<HashSet<EventId>>,
        error: Option<RemoteError>,
        calls: Mutex<Vec<EventId>>,
        gate: Option<Arc<Notify>>,
    }

    impl StubRemote {
        fn calls(&self) -> Vec<EventId> {
            self.calls.lock().unwrap().clone()
        }

        async fn outcome(&self, id: EventId) -> Result<(), RemoteError> {
            self.calls.lock().unwrap().push(id);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.failing.lock().unwrap().contains(&id) {
                return Err(self
                    .error
                    .clone()
                    .unwrap_or_else(|| RemoteError::Network("connection reset".into())));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RemoteApi for StubRemote {
        async fn send_audit(
            &self,
            event: &QueuedEvent,
            _record: &AuditRecord,
        ) -> Result<(), RemoteError> {
            self.outcome(event.id).await
        }

        async fn replay_operation(
            &self,
            id: EventId,
            _operation: &DeferredOperation,
        ) -> Result<(), RemoteError> {
            self.outcome(id).await
        }

        async fn fetch_history(
            &self,
            _query: &HistoryQuery,
        ) -> Result<Vec<QueuedEvent>, RemoteError> {
            Ok(Vec::new())
        }
    }

    async fn store() -> Arc<LocalStore> {
        let kv = ScopedKvStore::new(Arc::new(MemoryKvStore::new()), "outpost:test").unwrap();
        Arc::new(
            LocalStore::open(kv, 100, RetentionPolicy::default())
                .await
                .unwrap(),
        )
    }

    fn engine(store: &Arc<LocalStore>, remote: Arc<StubRemote>, online: bool) -> SyncEngine {
        let bus = EventBus::new();
        SyncEngine::new(
            Arc::clone(store),
            remote,
            bus.clone(),
            Connectivity::new(online, bus),
            RetryPolicy::default(),
        )
    }

    async fn queue(store: &LocalStore, action: &str, secs: u64) -> EventId {
        let base = Timestamp::now().before(Duration::from_secs(3600));
        let event = QueuedEvent::new(EventKind::Audit(
            AuditRecord::new("u-1", "Ana", "sales", action).with_severity(Severity::Warning),
        ))
        .with_created_at(base.after(Duration::from_secs(secs)));
        let id = event.id;
        store.append(event).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_delivers_oldest_first_and_removes_synced() {
        let store = store().await;
        let c = queue(&store, "c", 30).await;
        let a = queue(&store, "a", 10).await;
        let b = queue(&store, "b", 20).await;
        let remote = Arc::new(StubRemote::default());
        let engine = engine(&store, Arc::clone(&remote), true);

        let outcome = engine.run_once(SyncTrigger::Manual).await;
        let report = outcome.report().unwrap();
        assert_eq!(report.synced, 3);
        assert_eq!(report.removed, 3);
        assert_eq!(remote.calls(), vec![a, b, c]);
        assert!(store.is_empty().await);
        assert!(!engine.is_running());
        assert_eq!(store.meta().await.total_synced, 3);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_batch() {
        let store = store().await;
        let _a = queue(&store, "a", 1).await;
        let b = queue(&store, "b", 2).await;
        let _c = queue(&store, "c", 3).await;
        let remote = Arc::new(StubRemote::default());
        remote.failing.lock().unwrap().insert(b);
        let engine = engine(&store, Arc::clone(&remote), true);

        let report = engine
            .run_once(SyncTrigger::Periodic)
            .await
            .report()
            .cloned()
            .unwrap();
        assert_eq!((report.synced, report.failed), (2, 1));
        assert_eq!(remote.calls().len(), 3);

        let left = store.snapshot().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, b);
        assert!(matches!(left[0].sync_state, SyncState::Failed { .. }));
        assert_eq!(left[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_backoff_respected_except_manual() {
        let store = store().await;
        let a = queue(&store, "a", 1).await;
        let remote = Arc::new(StubRemote::default());
        remote.failing.lock().unwrap().insert(a);
        let engine = engine(&store, Arc::clone(&remote), true);

        engine.run_once(SyncTrigger::Periodic).await;
        let report = engine.run_once(SyncTrigger::Periodic).await;
        assert_eq!(report.report().unwrap().attempted, 0);

        let report = engine.run_once(SyncTrigger::Manual).await;
        assert_eq!(report.report().unwrap().attempted, 1);
        assert_eq!(remote.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_holds_back_newer_items() {
        let store = store().await;
        let a = queue(&store, "a", 1).await;
        let remote = Arc::new(StubRemote::default());
        remote.failing.lock().unwrap().insert(a);
        let engine = engine(&store, Arc::clone(&remote), true);

        engine.run_once(SyncTrigger::Periodic).await;
        let b = queue(&store, "b", 2).await;
        remote.failing.lock().unwrap().clear();

        let report = engine.run_once(SyncTrigger::Periodic).await;
        assert_eq!(report.report().unwrap().attempted, 0);
        assert_eq!(remote.calls(), vec![a]);

        let report = engine.run_once(SyncTrigger::Manual).await;
        assert_eq!(report.report().unwrap().synced, 2);
        assert_eq!(remote.calls(), vec![a, a, b]);
    }

    #[tokio::test]
    async fn test_retry_due_before_next_tick_runs_now() {
        let store = store().await;
        let a = queue(&store, "a", 1).await;
        let b = queue(&store, "b", 2).await;
        let remote = Arc::new(StubRemote::default());
        remote.failing.lock().unwrap().insert(a);
        // The default first retry delay is 30s.
        let engine =
            engine(&store, Arc::clone(&remote), true).with_due_window(Duration::from_secs(30));

        engine.run_once(SyncTrigger::Periodic).await;
        remote.failing.lock().unwrap().clear();

        let report = engine.run_once(SyncTrigger::Periodic).await;
        assert_eq!(report.report().unwrap().synced, 1);
        assert_eq!(remote.calls(), vec![a, b, a]);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_permanent_error_dead_letters() {
        let store = store().await;
        let a = queue(&store, "a", 1).await;
        let remote = Arc::new(StubRemote {
            error: Some(RemoteError::Status {
                status: 422,
                body: "bad payload".into(),
            }),
            ..StubRemote::default()
        });
        remote.failing.lock().unwrap().insert(a);
        let engine = engine(&store, Arc::clone(&remote), true);
        let mut events = engine.bus.subscribe();

        let report = engine.run_once(SyncTrigger::Manual).await;
        assert_eq!(report.report().unwrap().dead_lettered, 1);
        assert!(store.pending_snapshot(None).await.is_empty());

        let mut seen = Vec::new();
        while let Some(event) = events.try_recv() {
            seen.push(event.event_type());
        }
        assert_eq!(
            seen,
            vec!["sync_started", "item_dead_lettered", "sync_completed"]
        );
    }

    #[tokio::test]
    async fn test_offline_does_nothing() {
        let store = store().await;
        queue(&store, "a", 1).await;
        let remote = Arc::new(StubRemote::default());
        let engine = engine(&store, Arc::clone(&remote), false);

        assert_eq!(engine.run_once(SyncTrigger::Manual).await, SyncOutcome::Offline);
        assert!(remote.calls().is_empty());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_single_flight() {
        let store = store().await;
        queue(&store, "a", 1).await;
        let gate = Arc::new(Notify::new());
        let remote = Arc::new(StubRemote {
            gate: Some(Arc::clone(&gate)),
            ..StubRemote::default()
        });
        let engine = Arc::new(engine(&store, Arc::clone(&remote), true));

        let first = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.run_once(SyncTrigger::Manual).await }
        });
        while remote.calls().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(engine.is_running());
        assert_eq!(
            engine.run_once(SyncTrigger::Manual).await,
            SyncOutcome::AlreadyRunning
        );

        gate.notify_one();
        let outcome = first.await.unwrap();
        assert_eq!(outcome.report().unwrap().synced, 1);
        assert_eq!(remote.calls().len(), 1);
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn test_guard_released_on_cancel() {
        let store = store().await;
        queue(&store, "a", 1).await;
        let remote = Arc::new(StubRemote {
            gate: Some(Arc::new(Notify::new())),
            ..StubRemote::default()
        });
        let engine = Arc::new(engine(&store, Arc::clone(&remote), true));

        let run = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.run_once(SyncTrigger::Manual).await }
        });
        while remote.calls().is_empty() {
            tokio::task::yield_now().await;
        }
        run.abort();
        assert!(run.await.unwrap_err().is_cancelled());
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn test_synced_operation_invalidates_resource() {
        let store = store().await;
        store
            .append(QueuedEvent::new(EventKind::Operation(
                DeferredOperation::create(ResourceKind::Invoices, json!({"total": 5})),
            )))
            .await
            .unwrap();
        let engine = engine(&store, Arc::new(StubRemote::default()), true);
        let mut invoices = engine.bus.subscribe_resource(ResourceKind::Invoices);

        engine.run_once(SyncTrigger::Capture).await;
        let event = invoices.try_recv().unwrap();
        assert_eq!(event.resource(), Some(ResourceKind::Invoices));
        assert!(event.metadata().correlation_id.is_some());
    }

    #[tokio::test]
    async fn test_loop_sees_reconnect_before_first_poll() {
        let store = store().await;
        let remote = Arc::new(StubRemote::default());
        let engine = Arc::new(engine(&store, Arc::clone(&remote), false));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let mut events = engine.bus.subscribe();
        let a = queue(&store, "a", 1).await;

        let handle = spawn_sync_loop(
            Arc::clone(&engine),
            Duration::from_secs(3600),
            Arc::new(Notify::new()),
            shutdown_rx,
        );
        engine.connectivity().set_online(true);

        tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(event) = events.recv().await {
                if event.event_type() == "sync_completed" {
                    break;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(remote.calls(), vec![a]);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_reacts_to_reconnect_and_capture() {
        let store = store().await;
        let remote = Arc::new(StubRemote::default());
        let engine = Arc::new(engine(&store, Arc::clone(&remote), false));
        let signal = Arc::new(Notify::new());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let mut events = engine.bus.subscribe();

        let handle = spawn_sync_loop(
            Arc::clone(&engine),
            Duration::from_secs(30),
            Arc::clone(&signal),
            shutdown_rx,
        );
        tokio::task::yield_now().await;

        queue(&store, "a", 1).await;
        engine.connectivity().set_online(true);
        loop {
            let event = events.recv().await.unwrap();
            if event.event_type() == "sync_completed" {
                break;
            }
        }
        assert_eq!(remote.calls().len(), 1);

        queue(&store, "b", 2).await;
        signal.notify_one();
        loop {
            let event = events.recv().await.unwrap();
            if event.event_type() == "sync_completed" {
                break;
            }
        }
        assert_eq!(remote.calls().len(), 2);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
