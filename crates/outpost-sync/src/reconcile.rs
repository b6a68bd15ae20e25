//! Read-side reconciliation of remote history with the local cache.
//!
//! The result is a separate [`MergedView`]; the local store is only read.
//! A failed fetch leaves the previous view in place.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use outpost_core::{EventId, QueuedEvent, Timestamp};
use outpost_events::{EventBus, EventMetadata, OutpostEvent};
use outpost_queue::LocalStore;
use tracing::{info, warn};

use crate::error::{SyncError, SyncResult};
use crate::remote::{HistoryQuery, RemoteApi};

const SOURCE: &str = "reconcile";

/// Local and remote events merged by ID.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedView {
    /// Newest first, at most the cache bound.
    pub events: Vec<QueuedEvent>,
    /// Local events matching the query.
    pub local_count: usize,
    /// Records returned by the remote.
    pub remote_count: usize,
    /// Remote records not already held locally.
    pub remote_added: usize,
    /// The query that produced the view.
    pub query: HistoryQuery,
    /// When the view was built.
    pub loaded_at: Timestamp,
}

/// Merge `local` and `remote`, keeping the local copy of any shared ID.
///
/// The result is sorted by `created_at` descending (ties by ID) and cut to
/// `bound`. Merging the same inputs again yields the same list.
#[must_use]
pub fn merge_events(
    local: Vec<QueuedEvent>,
    remote: Vec<QueuedEvent>,
    bound: usize,
) -> Vec<QueuedEvent> {
    let mut seen: HashSet<EventId> = HashSet::with_capacity(local.len());
    let mut merged: Vec<QueuedEvent> = local
        .into_iter()
        .chain(remote)
        .filter(|e| seen.insert(e.id))
        .collect();
    merged.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    merged.truncate(bound);
    merged
}

/// Builds merged views on demand.
pub struct Reconciler {
    store: Arc<LocalStore>,
    remote: Arc<dyn RemoteApi>,
    bus: EventBus,
    history_limit: usize,
    last_view: RwLock<Option<Arc<MergedView>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("history_limit", &self.history_limit)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Create a reconciler reading at most `history_limit` remote records
    /// per load.
    #[must_use]
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteApi>,
        bus: EventBus,
        history_limit: usize,
    ) -> Self {
        Self {
            store,
            remote,
            bus,
            history_limit: history_limit.max(1),
            last_view: RwLock::new(None),
        }
    }

    /// Fetch remote history for `query` and merge it with matching local
    /// events.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Reconciliation`] if the fetch fails. The local
    /// cache and the last view are untouched.
    pub async fn load_from_remote(&self, mut query: HistoryQuery) -> SyncResult<Arc<MergedView>> {
        query.limit = query.limit.clamp(1, self.history_limit);

        let mut remote = match self.remote.fetch_history(&query).await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Remote history unavailable, keeping previous view");
                self.bus.publish(OutpostEvent::ReconciliationFailed {
                    metadata: EventMetadata::new(SOURCE),
                    error: e.to_string(),
                });
                return Err(SyncError::Reconciliation(e));
            },
        };
        remote.truncate(query.limit);

        let local = self.store.list(|e| query.matches(e)).await;
        let local_ids: HashSet<EventId> = local.iter().map(|e| e.id).collect();
        let remote_added = remote.iter().filter(|e| !local_ids.contains(&e.id)).count();
        let local_count = local.len();
        let remote_count = remote.len();

        let view = Arc::new(MergedView {
            events: merge_events(local, remote, self.store.bound()),
            local_count,
            remote_count,
            remote_added,
            query,
            loaded_at: Timestamp::now(),
        });

        info!(
            local = local_count,
            remote = remote_count,
            remote_added,
            total = view.events.len(),
            "Reconciled with remote history"
        );
        *self
            .last_view
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&view));
        self.bus.publish(OutpostEvent::ReconciliationCompleted {
            metadata: EventMetadata::new(SOURCE),
            remote_added,
            total: view.events.len(),
        });
        Ok(view)
    }

    /// The most recent successful view.
    #[must_use]
    pub fn last_view(&self) -> Option<Arc<MergedView>> {
        self.last_view
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
