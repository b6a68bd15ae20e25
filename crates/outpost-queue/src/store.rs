//! The durable local store.
//!
//! Holds at most `bound` events ordered by `created_at`, newest first, plus
//! the capture policy and queue metadata. The three are persisted together
//! as one JSON blob under [`STATE_KEY`]; every mutating call rewrites the
//! blob before returning.
//!
//! A failed write does not roll back the in-memory change. The store is
//! marked dirty and the next mutation (or [`LocalStore::flush`]) writes the
//! full state again.

use std::collections::HashSet;

use outpost_config::{RetentionPolicy, validate::validate_policy};
use outpost_core::{EventId, QueuedEvent, RetryPolicy, SyncState, Timestamp};
use outpost_storage::ScopedKvStore;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::QueueResult;

/// Key of the persisted blob within the store's namespace.
pub const STATE_KEY: &str = "state";

/// Key a blob that failed to parse is moved to before starting fresh.
const QUARANTINE_KEY: &str = "state.corrupt";

/// Default cache bound.
pub const DEFAULT_CACHE_BOUND: usize = 100;

const STATE_SCHEMA_VERSION: u32 = 1;

/// Bookkeeping persisted alongside the events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueMeta {
    /// Blob layout version.
    pub schema_version: u32,
    /// End of the last run that delivered at least one item.
    pub last_sync_at: Option<Timestamp>,
    /// Items delivered by the most recent run.
    pub last_synced_count: usize,
    /// Items delivered over the store's lifetime.
    pub total_synced: u64,
    /// Items dead-lettered over the store's lifetime.
    pub total_dead_lettered: u64,
}

/// The persisted blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Cached events, newest first.
    pub events: Vec<QueuedEvent>,
    /// Current capture policy.
    pub config: RetentionPolicy,
    /// Queue metadata.
    #[serde(default)]
    pub pending_queue_meta: QueueMeta,
}

#[derive(Debug)]
struct Inner {
    state: PersistedState,
    dirty: bool,
}

/// Bounded, persisted, newest-first event collection.
///
/// The only owner of the queued events and the capture policy. Other
/// components go through its methods and never hold a mutable copy.
#[derive(Debug)]
pub struct LocalStore {
    kv: ScopedKvStore,
    bound: usize,
    inner: Mutex<Inner>,
}

impl LocalStore {
    /// Load the store from `kv`, or start empty with `initial_policy`.
    ///
    /// A persisted policy takes precedence over `initial_policy`. If the
    /// persisted events exceed `bound` the oldest are dropped. A blob that
    /// cannot be parsed is moved aside and the store starts fresh.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Persistence`](crate::QueueError::Persistence)
    /// if the backend cannot be read.
    pub async fn open(
        kv: ScopedKvStore,
        bound: usize,
        initial_policy: RetentionPolicy,
    ) -> QueueResult<Self> {
        let bound = bound.max(1);
        let raw = kv.get(STATE_KEY).await?;

        let (state, dirty) = match raw {
            None => {
                debug!(namespace = kv.namespace(), "No persisted queue, starting empty");
                (fresh_state(initial_policy), true)
            },
            Some(bytes) => match serde_json::from_slice::<PersistedState>(&bytes) {
                Ok(mut state) => {
                    sort_newest_first(&mut state.events);
                    let dropped = state.events.len().saturating_sub(bound);
                    state.events.truncate(bound);
                    if dropped > 0 {
                        warn!(dropped, bound, "Persisted queue exceeded bound, oldest dropped");
                    }
                    info!(
                        namespace = kv.namespace(),
                        events = state.events.len(),
                        "Loaded persisted queue"
                    );
                    (state, dropped > 0)
                },
                Err(e) => {
                    warn!(
                        namespace = kv.namespace(),
                        error = %e,
                        "Persisted queue is unreadable, moving it aside"
                    );
                    kv.set(QUARANTINE_KEY, bytes).await?;
                    (fresh_state(initial_policy), true)
                },
            },
        };

        let store = Self {
            kv,
            bound,
            inner: Mutex::new(Inner { state, dirty }),
        };
        if dirty {
            store.flush().await?;
        }
        Ok(store)
    }

    /// Maximum number of cached events.
    #[must_use]
    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Insert `event` in `created_at` order and evict beyond the bound.
    ///
    /// An event whose ID is already present is not inserted again. Returns
    /// the number of events evicted.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the write fails; the event is still
    /// held in memory.
    pub async fn append(&self, event: QueuedEvent) -> QueueResult<usize> {
        let mut inner = self.inner.lock().await;
        let events = &mut inner.state.events;

        if events.iter().any(|e| e.id == event.id) {
            debug!(event_id = %event.id, "Event already queued, ignoring");
            return Ok(0);
        }

        let at = events.partition_point(|e| e.created_at > event.created_at);
        events.insert(at, event);

        let evicted: Vec<QueuedEvent> = if events.len() > self.bound {
            events.split_off(self.bound)
        } else {
            Vec::new()
        };
        for old in &evicted {
            if old.sync_state.is_pending_delivery() {
                warn!(event_id = %old.id, "Evicted an undelivered event");
            } else {
                debug!(event_id = %old.id, "Evicted event");
            }
        }

        self.persist(&mut inner).await?;
        Ok(evicted.len())
    }

    /// Mark an event delivered. No-op if it is gone or already synced.
    ///
    /// Returns whether the state changed.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the write fails.
    pub async fn mark_synced(&self, id: EventId) -> QueueResult<bool> {
        let mut inner = self.inner.lock().await;
        let Some(event) = inner
            .state
            .events
            .iter_mut()
            .find(|e| e.id == id && !e.sync_state.is_synced())
        else {
            return Ok(false);
        };

        event.attempts = event.attempts.saturating_add(1);
        event.sync_state = SyncState::Synced;
        event.next_attempt_at = None;

        self.persist(&mut inner).await?;
        Ok(true)
    }

    /// Record a failed delivery attempt.
    ///
    /// The event becomes `Failed` with its next automatic attempt scheduled
    /// by `retry`, or `DeadLetter` once `retry` is exhausted. No-op if the
    /// event is gone or already synced. Returns the new state.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the write fails.
    pub async fn mark_failed(
        &self,
        id: EventId,
        reason: impl Into<String>,
        retry: &RetryPolicy,
    ) -> QueueResult<Option<SyncState>> {
        let mut inner = self.inner.lock().await;
        let now = Timestamp::now();
        let Some(event) = inner
            .state
            .events
            .iter_mut()
            .find(|e| e.id == id && !e.sync_state.is_synced())
        else {
            return Ok(None);
        };

        let reason = reason.into();
        event.attempts = event.attempts.saturating_add(1);
        if retry.is_exhausted(event.attempts) {
            event.sync_state = SyncState::DeadLetter { reason };
            event.next_attempt_at = None;
        } else {
            event.sync_state = SyncState::Failed { reason };
            event.next_attempt_at = Some(retry.next_attempt_at(now, event.attempts));
        }
        let new_state = event.sync_state.clone();

        self.persist(&mut inner).await?;
        Ok(Some(new_state))
    }

    /// Move an event straight to `DeadLetter`, for failures retrying cannot
    /// fix. No-op if it is gone or already synced. Returns whether it changed.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the write fails.
    pub async fn mark_dead_letter(
        &self,
        id: EventId,
        reason: impl Into<String>,
    ) -> QueueResult<bool> {
        let mut inner = self.inner.lock().await;
        let Some(event) = inner
            .state
            .events
            .iter_mut()
            .find(|e| e.id == id && !e.sync_state.is_synced())
        else {
            return Ok(false);
        };

        event.attempts = event.attempts.saturating_add(1);
        event.sync_state = SyncState::DeadLetter {
            reason: reason.into(),
        };
        event.next_attempt_at = None;

        self.persist(&mut inner).await?;
        Ok(true)
    }

    /// Events matching `predicate`, newest first.
    pub async fn list<F>(&self, predicate: F) -> Vec<QueuedEvent>
    where
        F: Fn(&QueuedEvent) -> bool,
    {
        let inner = self.inner.lock().await;
        inner
            .state
            .events
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }

    /// Every cached event, newest first.
    pub async fn snapshot(&self) -> Vec<QueuedEvent> {
        self.list(|_| true).await
    }

    /// Events still owed to the remote, oldest first.
    ///
    /// With `due_at`, the list ends before the oldest event whose backoff
    /// has not elapsed by then; newer events wait behind it.
    pub async fn pending_snapshot(&self, due_at: Option<Timestamp>) -> Vec<QueuedEvent> {
        let mut pending = self.list(|e| e.sync_state.is_pending_delivery()).await;
        pending.reverse();
        if let Some(now) = due_at
            && let Some(held) = pending.iter().position(|e| !e.is_due(now))
        {
            pending.truncate(held);
        }
        pending
    }

    /// Delete every `Synced` event. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the write fails.
    pub async fn remove_synced(&self) -> QueueResult<usize> {
        let mut inner = self.inner.lock().await;
        let before = inner.state.events.len();
        inner.state.events.retain(|e| !e.sync_state.is_synced());
        let removed = before.saturating_sub(inner.state.events.len());
        if removed > 0 {
            self.persist(&mut inner).await?;
        }
        Ok(removed)
    }

    /// Drop delivered or dead-lettered events older than the policy's
    /// retention window. Undelivered events are never purged.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the write fails.
    pub async fn purge_expired(&self, now: Timestamp) -> QueueResult<usize> {
        let mut inner = self.inner.lock().await;
        let Some(window) = inner.state.config.retention_window() else {
            return Ok(0);
        };
        let cutoff = now.before(window);

        let before = inner.state.events.len();
        inner
            .state
            .events
            .retain(|e| e.sync_state.is_pending_delivery() || e.created_at >= cutoff);
        let purged = before.saturating_sub(inner.state.events.len());
        if purged > 0 {
            debug!(purged, "Purged expired events");
            self.persist(&mut inner).await?;
        }
        Ok(purged)
    }

    /// Return every dead-lettered event to `Pending` with a fresh attempt
    /// budget. Returns how many were re-queued.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the write fails.
    pub async fn requeue_dead_letters(&self) -> QueueResult<usize> {
        let mut inner = self.inner.lock().await;
        let mut count: usize = 0;
        for event in &mut inner.state.events {
            if event.sync_state.is_dead_letter() {
                event.sync_state = SyncState::Pending;
                event.attempts = 0;
                event.next_attempt_at = None;
                count = count.saturating_add(1);
            }
        }
        if count > 0 {
            self.persist(&mut inner).await?;
        }
        Ok(count)
    }

    /// The current capture policy.
    pub async fn policy(&self) -> RetentionPolicy {
        self.inner.lock().await.state.config.clone()
    }

    /// Replace the capture policy. Already stored events are not re-filtered.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidPolicy`](crate::QueueError::InvalidPolicy)
    /// without changing anything if validation fails, or a persistence error
    /// if the write fails.
    pub async fn update_policy(&self, policy: RetentionPolicy) -> QueueResult<()> {
        validate_policy(&policy)?;
        let mut inner = self.inner.lock().await;
        inner.state.config = policy;
        self.persist(&mut inner).await
    }

    /// Fold a finished synchronization run into the metadata.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the write fails.
    pub async fn record_run(&self, synced: usize, dead_lettered: usize) -> QueueResult<()> {
        let mut inner = self.inner.lock().await;
        let meta = &mut inner.state.pending_queue_meta;
        meta.last_synced_count = synced;
        if synced > 0 {
            meta.last_sync_at = Some(Timestamp::now());
        }
        meta.total_synced = meta
            .total_synced
            .saturating_add(u64::try_from(synced).unwrap_or(u64::MAX));
        meta.total_dead_lettered = meta
            .total_dead_lettered
            .saturating_add(u64::try_from(dead_lettered).unwrap_or(u64::MAX));
        self.persist(&mut inner).await
    }

    /// Queue metadata.
    pub async fn meta(&self) -> QueueMeta {
        self.inner.lock().await.state.pending_queue_meta.clone()
    }

    /// Number of cached events.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.state.events.len()
    }

    /// Whether the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// IDs of every cached event.
    pub async fn ids(&self) -> HashSet<EventId> {
        let inner = self.inner.lock().await;
        inner.state.events.iter().map(|e| e.id).collect()
    }

    /// Whether the last write failed and memory is ahead of storage.
    pub async fn is_dirty(&self) -> bool {
        self.inner.lock().await.dirty
    }

    /// Write the full state now.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the write fails.
    pub async fn flush(&self) -> QueueResult<()> {
        let mut inner = self.inner.lock().await;
        self.persist(&mut inner).await
    }

    async fn persist(&self, inner: &mut Inner) -> QueueResult<()> {
        inner.state.pending_queue_meta.schema_version = STATE_SCHEMA_VERSION;
        match self.kv.set_json(STATE_KEY, &inner.state).await {
            Ok(()) => {
                inner.dirty = false;
                Ok(())
            },
            Err(e) => {
                inner.dirty = true;
                warn!(error = %e, "Failed to persist queue state");
                Err(e.into())
            },
        }
    }
}

fn fresh_state(policy: RetentionPolicy) -> PersistedState {
    PersistedState {
        events: Vec::new(),
        config: policy,
        pending_queue_meta: QueueMeta {
            schema_version: STATE_SCHEMA_VERSION,
            ..QueueMeta::default()
        },
    }
}

fn sort_newest_first(events: &mut [QueuedEvent]) {
    events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
