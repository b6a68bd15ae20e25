//! Mock implementations for testing.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};

use outpost_core::{AuditRecord, DeferredOperation, EventId, QueuedEvent, ReplayRequest};
use outpost_storage::{KvStore, MemoryKvStore, StorageError, StorageResult};
use outpost_sync::{HistoryQuery, RemoteApi, RemoteError, RemoteRecord};

/// One call observed by [`MockRemote`].
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    /// `send_audit` for this event.
    SendAudit(EventId),
    /// `replay_operation` with the derived request.
    Replay(EventId, ReplayRequest),
    /// `fetch_history` with this query.
    FetchHistory(HistoryQuery),
}

impl RemoteCall {
    /// The delivered event, if this was a delivery.
    #[must_use]
    pub fn event_id(&self) -> Option<EventId> {
        match self {
            Self::SendAudit(id) | Self::Replay(id, _) => Some(*id),
            Self::FetchHistory(_) => None,
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<RemoteCall>,
    /// Failures returned on every delivery of the ID.
    failing: HashMap<EventId, RemoteError>,
    /// Failures returned by the next deliveries, in order.
    scripted: VecDeque<RemoteError>,
    history: Vec<QueuedEvent>,
    history_error: Option<RemoteError>,
    /// Audits accepted so far, keyed for idempotent redelivery.
    accepted: Vec<QueuedEvent>,
    accepted_ids: HashSet<EventId>,
}

/// Scriptable in-memory remote.
///
/// Accepted audits are folded into history the way a real backend would
/// return them. Redelivering an accepted ID is a no-op.
#[derive(Debug, Clone, Default)]
pub struct MockRemote {
    state: Arc<Mutex<MockState>>,
    /// When set, deliveries wait for a permit.
    gate: Option<Arc<Semaphore>>,
    delivery_started: Arc<Notify>,
}

impl MockRemote {
    /// A remote that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every delivery until [`release`](Self::release) grants permits.
    #[must_use]
    pub fn paused(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let `n` held deliveries proceed.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Resolves once a delivery has started.
    pub async fn wait_for_delivery(&self) {
        self.delivery_started.notified().await;
    }

    /// Fail every delivery of `id` with `error`.
    pub fn fail_with(&self, id: EventId, error: RemoteError) {
        self.lock().failing.insert(id, error);
    }

    /// Deliveries of `id` succeed again.
    pub fn recover(&self, id: EventId) {
        self.lock().failing.remove(&id);
    }

    /// Fail the next delivery, whichever event it is.
    pub fn fail_next(&self, error: RemoteError) {
        self.lock().scripted.push_back(error);
    }

    /// Seed history returned by `fetch_history`.
    pub fn with_history(&self, events: impl IntoIterator<Item = QueuedEvent>) {
        self.lock().history.extend(events);
    }

    /// Make `fetch_history` fail until cleared with `None`.
    pub fn set_history_error(&self, error: Option<RemoteError>) {
        self.lock().history_error = error;
    }

    /// All calls so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// IDs of every delivery attempt, in order.
    #[must_use]
    pub fn delivered_ids(&self) -> Vec<EventId> {
        self.lock()
            .calls
            .iter()
            .filter_map(RemoteCall::event_id)
            .collect()
    }

    /// Number of delivery attempts.
    #[must_use]
    pub fn delivery_count(&self) -> usize {
        self.delivered_ids().len()
    }

    /// Whether `id` was accepted.
    #[must_use]
    pub fn accepted(&self, id: EventId) -> bool {
        self.lock().accepted_ids.contains(&id)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn begin_delivery(&self, call: RemoteCall) {
        self.lock().calls.push(call);
        self.delivery_started.notify_one();
        if let Some(gate) = &self.gate
            && let Ok(permit) = gate.acquire().await
        {
            permit.forget();
        }
    }

    fn outcome_for(&self, id: EventId) -> Result<(), RemoteError> {
        let mut state = self.lock();
        if let Some(error) = state.failing.get(&id) {
            return Err(error.clone());
        }
        match state.scripted.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteApi for MockRemote {
    async fn send_audit(
        &self,
        event: &QueuedEvent,
        record: &AuditRecord,
    ) -> Result<(), RemoteError> {
        self.begin_delivery(RemoteCall::SendAudit(event.id)).await;
        self.outcome_for(event.id)?;

        let stored = RemoteRecord::from_audit(event, record).into_event()?;
        let mut state = self.lock();
        if state.accepted_ids.insert(event.id) {
            state.accepted.push(stored);
        }
        Ok(())
    }

    async fn replay_operation(
        &self,
        id: EventId,
        operation: &DeferredOperation,
    ) -> Result<(), RemoteError> {
        self.begin_delivery(RemoteCall::Replay(id, operation.request()))
            .await;
        self.outcome_for(id)?;
        self.lock().accepted_ids.insert(id);
        Ok(())
    }

    async fn fetch_history(&self, query: &HistoryQuery) -> Result<Vec<QueuedEvent>, RemoteError> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::FetchHistory(query.clone()));
        if let Some(error) = &state.history_error {
            return Err(error.clone());
        }
        let mut events: Vec<QueuedEvent> = state
            .history
            .iter()
            .chain(state.accepted.iter())
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        events.truncate(query.limit);
        Ok(events)
    }
}

/// [`MemoryKvStore`] whose writes can be switched to fail.
#[derive(Debug, Default)]
pub struct FailingKvStore {
    inner: MemoryKvStore,
    failing: AtomicBool,
}

impl FailingKvStore {
    /// A healthy store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle write failures.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Internal("disk full".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for FailingKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(namespace, key).await
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.check()?;
        self.inner.set(namespace, key, value).await
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        self.check()?;
        self.inner.delete(namespace, key).await
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        self.inner.list_keys(namespace).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{test_audit, test_audit_at};
    use std::time::Duration;

    #[tokio::test]
    async fn test_failures_are_per_id() {
        let remote = MockRemote::new();
        let a = test_audit_at(test_audit(), Duration::from_secs(10));
        let b = test_audit_at(test_audit(), Duration::from_secs(5));
        remote.fail_with(a.id, RemoteError::Timeout);

        assert_eq!(remote.deliver(&a).await, Err(RemoteError::Timeout));
        assert!(remote.deliver(&b).await.is_ok());
        assert_eq!(remote.delivered_ids(), vec![a.id, b.id]);
        assert!(!remote.accepted(a.id));
        assert!(remote.accepted(b.id));

        remote.recover(a.id);
        assert!(remote.deliver(&a).await.is_ok());
    }

    #[tokio::test]
    async fn test_accepted_audits_show_in_history_once() {
        let remote = MockRemote::new();
        let event = test_audit_at(test_audit(), Duration::from_secs(1));
        remote.deliver(&event).await.unwrap();
        remote.deliver(&event).await.unwrap();

        let history = remote.fetch_history(&HistoryQuery::new()).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, event.id);
        assert!(history[0].sync_state.is_synced());
    }

    #[tokio::test]
    async fn test_failing_kv_store_rejects_writes_only() {
        let kv = FailingKvStore::new();
        kv.set("ns", "k", b"v".to_vec()).await.unwrap();
        kv.set_failing(true);
        assert!(kv.set("ns", "k", b"w".to_vec()).await.is_err());
        assert_eq!(kv.get("ns", "k").await.unwrap(), Some(b"v".to_vec()));
    }
}
