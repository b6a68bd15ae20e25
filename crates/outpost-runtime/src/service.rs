//! The assembled service.

use std::sync::{Arc, PoisonError};

use outpost_config::{Config, RetentionPolicy, StorageBackend};
use outpost_core::{AuditRecord, DeferredOperation, EventOrigin, QueuedEvent, SyncState};
use outpost_events::{EventBus, EventMetadata, OutpostEvent};
use outpost_query::{EventCriteria, EventStats, ExportFormat};
use outpost_queue::{CaptureOutcome, LocalStore, QueueError, QueueMeta, Recorder};
use outpost_storage::{KvStore, MemoryKvStore, ScopedKvStore, SurrealKvStore};
use outpost_sync::{
    Connectivity, HistoryQuery, HttpRemote, MergedView, Reconciler, RemoteApi, SyncEngine,
    SyncOutcome, SyncTrigger, merge_events, spawn_sync_loop,
};
use serde::Serialize;
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{RuntimeError, RuntimeResult};

/// Point-in-time view of the queue and engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutpostStatus {
    /// Cached events.
    pub total: usize,
    /// Awaiting first delivery.
    pub pending: usize,
    /// Failed at least once, retry scheduled.
    pub failed: usize,
    /// Delivered but not yet removed.
    pub synced: usize,
    /// Retries exhausted or rejected permanently.
    pub dead_lettered: usize,
    /// Connectivity flag.
    pub online: bool,
    /// Whether a sync run is in progress.
    pub syncing: bool,
    /// Persisted queue metadata.
    pub meta: QueueMeta,
}

/// A running Outpost instance.
pub struct Outpost {
    config: Config,
    store: Arc<LocalStore>,
    bus: EventBus,
    recorder: Recorder,
    engine: Arc<SyncEngine>,
    reconciler: Reconciler,
    connectivity: Connectivity,
    shutdown_tx: broadcast::Sender<()>,
    sync_loop: std::sync::Mutex<Option<JoinHandle<()>>>,
    surreal: Option<Arc<SurrealKvStore>>,
}

impl std::fmt::Debug for Outpost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outpost")
            .field("namespace", &self.config.storage.namespace)
            .field("online", &self.connectivity.is_online())
            .finish_non_exhaustive()
    }
}

impl Outpost {
    /// Open the configured store and talk to the configured remote over HTTP.
    ///
    /// Must be called from within a Tokio runtime; the sync loop is spawned
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote URL is invalid or the store cannot be
    /// opened.
    pub async fn open(config: Config) -> RuntimeResult<Self> {
        let remote = Arc::new(HttpRemote::from_section(&config.remote)?);
        Self::with_remote(config, remote).await
    }

    /// Process-memory store with default settings, for previews and tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be initialised.
    pub async fn in_memory(remote: Arc<dyn RemoteApi>) -> RuntimeResult<Self> {
        let mut config = Config::default();
        config.storage.backend = StorageBackend::Memory;
        Self::with_remote(config, remote).await
    }

    /// Open the configured store with a caller-supplied remote.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the store cannot
    /// be opened.
    pub async fn with_remote(config: Config, remote: Arc<dyn RemoteApi>) -> RuntimeResult<Self> {
        outpost_config::validate::validate(&config)?;

        let (kv, surreal): (Arc<dyn KvStore>, Option<Arc<SurrealKvStore>>) =
            match config.storage.backend {
                StorageBackend::SurrealKv => {
                    let dir = config.storage.resolve_directory()?;
                    let store = Arc::new(SurrealKvStore::open(&dir)?);
                    info!(path = %dir.display(), "Opened local queue");
                    let kv: Arc<dyn KvStore> = store.clone();
                    (kv, Some(store))
                },
                StorageBackend::Memory => {
                    debug!("Using in-memory local queue");
                    let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
                    (kv, None)
                },
            };

        let scoped = ScopedKvStore::new(kv, config.storage.namespace.clone())?;
        let store = Arc::new(
            LocalStore::open(scoped, config.storage.cache_bound, config.policy.clone()).await?,
        );

        let bus = EventBus::new();
        let connectivity = Connectivity::new(true, bus.clone());
        let capture_signal = Arc::new(Notify::new());

        let mut recorder = Recorder::new(Arc::clone(&store), bus.clone());
        if config.sync.sync_on_capture {
            recorder = recorder.with_sync_signal(Arc::clone(&capture_signal));
        }

        let engine = Arc::new(SyncEngine::new(
            Arc::clone(&store),
            Arc::clone(&remote),
            bus.clone(),
            connectivity.clone(),
            config.sync.retry.to_policy(),
        )
        .with_due_window(config.sync.interval()));
        let reconciler = Reconciler::new(
            Arc::clone(&store),
            remote,
            bus.clone(),
            config.remote.history_limit,
        );

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let sync_loop = spawn_sync_loop(
            Arc::clone(&engine),
            config.sync.interval(),
            capture_signal,
            shutdown_rx,
        );

        info!(
            namespace = %config.storage.namespace,
            bound = store.bound(),
            queued = store.len().await,
            "Outpost started"
        );

        Ok(Self {
            config,
            store,
            bus,
            recorder,
            engine,
            reconciler,
            connectivity,
            shutdown_tx,
            sync_loop: std::sync::Mutex::new(Some(sync_loop)),
            surreal,
        })
    }

    /// The configuration the instance was built from.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The event bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The capture recorder, for callers that want to hand it out.
    #[must_use]
    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Record an audit event. Never fails.
    pub async fn capture_audit(&self, record: AuditRecord) -> CaptureOutcome {
        self.recorder.record_audit(record).await
    }

    /// Queue a mutation for replay. Never fails.
    pub async fn defer_operation(&self, operation: DeferredOperation) -> CaptureOutcome {
        self.recorder.defer_operation(operation).await
    }

    /// Run a sync now, ignoring backoff.
    pub async fn sync_now(&self) -> SyncOutcome {
        self.engine.run_once(SyncTrigger::Manual).await
    }

    /// Rebuild the merged view from remote history.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Sync`] if the remote read fails; the previous
    /// view stays current.
    pub async fn reconcile(&self, query: HistoryQuery) -> RuntimeResult<Arc<MergedView>> {
        Ok(self.reconciler.load_from_remote(query).await?)
    }

    /// The view built by the last successful reconciliation.
    #[must_use]
    pub fn merged_view(&self) -> Option<Arc<MergedView>> {
        self.reconciler.last_view()
    }

    /// Current local events merged with remote records from the last
    /// reconciliation, newest first.
    pub async fn view(&self) -> Vec<QueuedEvent> {
        let local = self.store.snapshot().await;
        match self.reconciler.last_view() {
            Some(view) => {
                let remote = view
                    .events
                    .iter()
                    .filter(|e| e.origin == EventOrigin::Remote)
                    .cloned()
                    .collect();
                merge_events(local, remote, self.store.bound())
            },
            None => local,
        }
    }

    /// Events in the current view matching `criteria`.
    pub async fn events(&self, criteria: &EventCriteria) -> Vec<QueuedEvent> {
        outpost_query::filter(&self.view().await, criteria)
    }

    /// Statistics over the events matching `criteria`.
    pub async fn stats(&self, criteria: &EventCriteria) -> EventStats {
        outpost_query::stats(&self.events(criteria).await)
    }

    /// Export the events matching `criteria`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Query`] if encoding fails.
    pub async fn export(
        &self,
        criteria: &EventCriteria,
        format: ExportFormat,
    ) -> RuntimeResult<String> {
        Ok(outpost_query::export(&self.events(criteria).await, format)?)
    }

    /// The capture policy in force.
    pub async fn policy(&self) -> RetentionPolicy {
        self.store.policy().await
    }

    /// Replace the capture policy. Applies to the next capture.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Config`] if the policy is invalid, or
    /// [`RuntimeError::Queue`] if it could not be persisted.
    pub async fn update_policy(&self, policy: RetentionPolicy) -> RuntimeResult<()> {
        self.store.update_policy(policy).await.map_err(|e| match e {
            QueueError::InvalidPolicy(config) => RuntimeError::Config(config),
            other => RuntimeError::Queue(other),
        })?;
        info!("Capture policy updated");
        self.bus.publish(OutpostEvent::PolicyUpdated {
            metadata: EventMetadata::new("runtime"),
        });
        Ok(())
    }

    /// Report a connectivity change. Going online triggers a sync.
    pub fn set_online(&self, online: bool) {
        self.connectivity.set_online(online);
    }

    /// Current connectivity flag.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Counts by delivery state plus engine flags.
    pub async fn status(&self) -> OutpostStatus {
        let events = self.store.snapshot().await;
        let mut status = OutpostStatus {
            total: events.len(),
            pending: 0,
            failed: 0,
            synced: 0,
            dead_lettered: 0,
            online: self.connectivity.is_online(),
            syncing: self.engine.is_running(),
            meta: self.store.meta().await,
        };
        for event in &events {
            let slot = match event.sync_state {
                SyncState::Pending => &mut status.pending,
                SyncState::Failed { .. } => &mut status.failed,
                SyncState::Synced => &mut status.synced,
                SyncState::DeadLetter { .. } => &mut status.dead_lettered,
            };
            *slot = slot.saturating_add(1);
        }
        status
    }

    /// Put dead-lettered events back in the queue.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Queue`] if the change could not be persisted.
    pub async fn requeue_dead_letters(&self) -> RuntimeResult<usize> {
        let count = self.store.requeue_dead_letters().await?;
        if count > 0 {
            info!(count, "Re-queued dead-lettered events");
        }
        Ok(count)
    }

    /// Stop the sync loop, flush the store and close the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush or the backend close fails.
    pub async fn shutdown(self) -> RuntimeResult<()> {
        // No receiver means the loop already exited.
        let _ = self.shutdown_tx.send(());
        let handle = self
            .sync_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!(error = %e, "Sync loop ended abnormally");
        }

        self.store.flush().await?;
        if let Some(surreal) = &self.surreal {
            surreal.close().await?;
        }
        info!("Outpost stopped");
        Ok(())
    }
}
