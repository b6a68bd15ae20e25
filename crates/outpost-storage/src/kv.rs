//! Raw key-value store trait and implementations.
//!
//! Every operation is scoped to a namespace. The queue keeps its blob under
//! a single `(namespace, key)` pair; other namespaces stay untouched, so one
//! backing tree can be shared by several stores.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};

/// Namespaces and keys must be non-empty and free of the null byte, which
/// separates them in composite keys.
fn validate_part(kind: &str, value: &str) -> StorageResult<()> {
    if value.is_empty() {
        return Err(StorageError::InvalidKey(format!("{kind} must not be empty")));
    }
    if value.contains('\0') {
        return Err(StorageError::InvalidKey(format!(
            "{kind} must not contain null bytes"
        )));
    }
    Ok(())
}

fn validate(namespace: &str, key: &str) -> StorageResult<()> {
    validate_part("namespace", namespace)?;
    validate_part("key", key)
}

/// `"{namespace}\0{key}"` as bytes.
fn composite_key(namespace: &str, key: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(namespace.len().saturating_add(key.len()).saturating_add(1));
    buf.extend_from_slice(namespace.as_bytes());
    buf.push(0);
    buf.extend_from_slice(key.as_bytes());
    buf
}

/// Byte-level namespaced storage.
///
/// `set` must not return before the write is acknowledged by the backend.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get a value. Returns `None` if the key does not exist.
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Set a value, overwriting any existing one.
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Delete a key. Returns `true` if it existed.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// List all keys in a namespace.
    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// In-memory key-value store for tests and ephemeral data.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    data: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryKvStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Internal(e.to_string())
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate(namespace, key)?;
        let data = self.data.read().map_err(poisoned)?;
        Ok(data.get(&composite_key(namespace, key)).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        validate(namespace, key)?;
        let mut data = self.data.write().map_err(poisoned)?;
        data.insert(composite_key(namespace, key), value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        validate(namespace, key)?;
        let mut data = self.data.write().map_err(poisoned)?;
        Ok(data.remove(&composite_key(namespace, key)).is_some())
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        validate_part("namespace", namespace)?;
        let data = self.data.read().map_err(poisoned)?;
        let mut prefix = namespace.as_bytes().to_vec();
        prefix.push(0);
        Ok(data
            .keys()
            .filter_map(|k| k.strip_prefix(prefix.as_slice()))
            .filter_map(|k| std::str::from_utf8(k).ok().map(String::from))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// SurrealKV (behind `kv` feature)
// ---------------------------------------------------------------------------

/// Persistent key-value store backed by `SurrealKV`.
///
/// Every write runs in its own transaction and returns after commit.
#[cfg(feature = "kv")]
pub struct SurrealKvStore {
    tree: surrealkv::Tree,
}

#[cfg(feature = "kv")]
impl std::fmt::Debug for SurrealKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealKvStore").finish_non_exhaustive()
    }
}

#[cfg(feature = "kv")]
impl SurrealKvStore {
    /// Open a persistent store at the given directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the store cannot be opened.
    pub fn open(path: impl AsRef<std::path::Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path).map_err(|e| StorageError::Connection(e.to_string()))?;
        let tree = surrealkv::TreeBuilder::new()
            .with_path(path.to_path_buf())
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        tracing::trace!(path = %path.display(), "Opened SurrealKV store");
        Ok(Self { tree })
    }

    /// Close the store, flushing any pending writes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the flush fails.
    pub async fn close(&self) -> StorageResult<()> {
        self.tree
            .close()
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))
    }
}

#[cfg(feature = "kv")]
fn map_kv_err(e: &surrealkv::Error) -> StorageError {
    StorageError::Internal(e.to_string())
}

#[cfg(feature = "kv")]
#[async_trait]
impl KvStore for SurrealKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate(namespace, key)?;
        let ck = composite_key(namespace, key);
        let tx = self
            .tree
            .begin_with_mode(surrealkv::Mode::ReadOnly)
            .map_err(|ref e| map_kv_err(e))?;
        tx.get(&ck).map_err(|ref e| map_kv_err(e))
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        validate(namespace, key)?;
        let ck = composite_key(namespace, key);
        let mut tx = self.tree.begin().map_err(|ref e| map_kv_err(e))?;
        tx.set(&ck, &value).map_err(|ref e| map_kv_err(e))?;
        tx.commit().await.map_err(|ref e| map_kv_err(e))
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        validate(namespace, key)?;
        let ck = composite_key(namespace, key);
        let mut tx = self.tree.begin().map_err(|ref e| map_kv_err(e))?;
        let existed = tx.get(&ck).map_err(|ref e| map_kv_err(e))?.is_some();
        if existed {
            tx.delete(&ck).map_err(|ref e| map_kv_err(e))?;
            tx.commit().await.map_err(|ref e| map_kv_err(e))?;
        }
        Ok(existed)
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        validate_part("namespace", namespace)?;
        let mut start = namespace.as_bytes().to_vec();
        start.push(0);
        let mut end = namespace.as_bytes().to_vec();
        end.push(1);
        let prefix_len = start.len();

        let tx = self
            .tree
            .begin_with_mode(surrealkv::Mode::ReadOnly)
            .map_err(|ref e| map_kv_err(e))?;
        let mut iter = tx.range(&start, &end).map_err(|ref e| map_kv_err(e))?;
        iter.seek_first().map_err(|ref e| map_kv_err(e))?;

        let mut keys = Vec::new();
        while iter.valid() {
            let raw_key = iter.key();
            if let Some(rest) = raw_key.get(prefix_len..)
                && let Ok(key) = std::str::from_utf8(rest)
            {
                keys.push(key.to_string());
            }
            iter.next().map_err(|ref e| map_kv_err(e))?;
        }
        Ok(keys)
    }
}

// ---------------------------------------------------------------------------
// Scoped store (namespace pre-bound)
// ---------------------------------------------------------------------------

/// A namespace-scoped view into a [`KvStore`] with typed JSON helpers.
#[derive(Clone)]
pub struct ScopedKvStore {
    inner: Arc<dyn KvStore>,
    namespace: String,
}

impl std::fmt::Debug for ScopedKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedKvStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl ScopedKvStore {
    /// Create a scoped view into `store` for `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the namespace is empty
    /// or contains null bytes.
    pub fn new(store: Arc<dyn KvStore>, namespace: impl Into<String>) -> StorageResult<Self> {
        let namespace = namespace.into();
        validate_part("namespace", &namespace)?;
        Ok(Self {
            inner: store,
            namespace,
        })
    }

    /// The namespace this store is scoped to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get a raw byte value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the backend read fails.
    pub async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(&self.namespace, key).await
    }

    /// Set a raw byte value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the backend write fails.
    pub async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.inner.set(&self.namespace, key, value).await
    }

    /// Delete a key. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the backend write fails.
    pub async fn delete(&self, key: &str) -> StorageResult<bool> {
        self.inner.delete(&self.namespace, key).await
    }

    /// Deserialize a JSON value. Returns `None` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if deserialization fails.
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> StorageResult<Option<T>> {
        let bytes = self.get(key).await?;
        bytes
            .map(|b| {
                serde_json::from_slice(&b).map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .transpose()
    }

    /// Serialize a value as JSON and store it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if serialization fails.
    pub async fn set_json<T: serde::Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.set(key, bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_get_set_overwrite() {
        let store = MemoryKvStore::new();
        assert!(store.get("ns", "k").await.unwrap().is_none());
        store.set("ns", "k", b"v1".to_vec()).await.unwrap();
        store.set("ns", "k", b"v2".to_vec()).await.unwrap();
        assert_eq!(store.get("ns", "k").await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_delete() {
        let store = MemoryKvStore::new();
        store.set("ns", "k", b"v".to_vec()).await.unwrap();
        assert!(store.delete("ns", "k").await.unwrap());
        assert!(!store.delete("ns", "k").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_namespace_isolation() {
        let store = MemoryKvStore::new();
        store.set("outpost:a", "state", b"1".to_vec()).await.unwrap();
        store.set("outpost:b", "state", b"2".to_vec()).await.unwrap();
        store.set("outpost:b", "other", b"3".to_vec()).await.unwrap();
        assert_eq!(
            store.get("outpost:a", "state").await.unwrap(),
            Some(b"1".to_vec())
        );
        let mut keys = store.list_keys("outpost:b").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["other", "state"]);
    }

    #[tokio::test]
    async fn test_rejects_invalid_keys() {
        let store = MemoryKvStore::new();
        assert!(matches!(
            store.set("", "k", vec![]).await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.get("ns", "bad\0key").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(ScopedKvStore::new(Arc::new(MemoryKvStore::new()), "").is_err());
    }

    #[tokio::test]
    async fn test_scoped_json() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Blob {
            events: Vec<u32>,
        }

        let scoped = ScopedKvStore::new(Arc::new(MemoryKvStore::new()), "outpost:local").unwrap();
        assert!(scoped.get_json::<Blob>("state").await.unwrap().is_none());

        let blob = Blob {
            events: vec![3, 2, 1],
        };
        scoped.set_json("state", &blob).await.unwrap();
        assert_eq!(scoped.get_json::<Blob>("state").await.unwrap(), Some(blob));

        scoped.set("state", b"not json".to_vec()).await.unwrap();
        assert!(matches!(
            scoped.get_json::<Blob>("state").await,
            Err(StorageError::Serialization(_))
        ));
    }

    #[cfg(feature = "kv")]
    #[tokio::test]
    async fn test_surrealkv_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SurrealKvStore::open(dir.path()).unwrap();
            store.set("outpost:local", "state", b"blob".to_vec()).await.unwrap();
            store.close().await.unwrap();
        }
        let store = SurrealKvStore::open(dir.path()).unwrap();
        assert_eq!(
            store.get("outpost:local", "state").await.unwrap(),
            Some(b"blob".to_vec())
        );
        assert_eq!(store.list_keys("outpost:local").await.unwrap(), vec!["state"]);
        assert!(store.delete("outpost:local", "state").await.unwrap());
        store.close().await.unwrap();
    }
}
