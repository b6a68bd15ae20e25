//! Shared fixtures for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use outpost_storage::{KvStore, MemoryKvStore, ScopedKvStore, StorageError, StorageResult};

pub(crate) const NS: &str = "outpost:test";

pub(crate) fn scoped(kv: Arc<dyn KvStore>) -> ScopedKvStore {
    ScopedKvStore::new(kv, NS).unwrap()
}

/// Backend whose writes fail while switched off.
#[derive(Debug, Default)]
pub(crate) struct FlakyKv {
    inner: MemoryKvStore,
    failing: AtomicBool,
}

impl FlakyKv {
    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl KvStore for FlakyKv {
    async fn get(&self, ns: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(ns, key).await
    }

    async fn set(&self, ns: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Internal("disk full".into()));
        }
        self.inner.set(ns, key, value).await
    }

    async fn delete(&self, ns: &str, key: &str) -> StorageResult<bool> {
        self.inner.delete(ns, key).await
    }

    async fn list_keys(&self, ns: &str) -> StorageResult<Vec<String>> {
        self.inner.list_keys(ns).await
    }
}
