//! In-memory storage backend implementation.
//!
//! This module provides [`MemoryBackend`], a non-durable implementation of
//! [`StorageBackend`] for tests and for deployments that accept losing all
//! documents on restart.
//!
//! # Features
//!
//! - **Thread-safe**: Uses [`parking_lot::RwLock`] for concurrent access
//! - **Ordered storage**: Keys live in a [`BTreeMap`], so prefix scans are range scans
//! - **Linearizable writes**: `add`, `update` and `delete` each run inside a single
//!   write-lock critical section, so the existence check and the write are atomic
//!
//! # Example
//!
//! ```
//! use idp_storage::{MemoryBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = MemoryBackend::new();
//!
//!     backend.add("client:app", b"{}".to_vec()).await.unwrap();
//!     assert_eq!(backend.count("client:").await.unwrap(), 1);
//! }
//! ```
//!
//! # Performance Characteristics
//!
//! | Operation | Complexity |
//! |-----------|------------|
//! | get | O(log n) |
//! | add / update / delete | O(log n) |
//! | get_by_prefix | O(log n + k) where k is result size |
//! | count | O(log n + k) |
//!
//! # Limitations
//!
//! - Data is not persisted; all documents are lost when the process exits
//! - No revisions: `update` overwrites the value held at the moment the lock is taken

use std::{collections::BTreeMap, ops::Bound, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::{
    backend::StorageBackend,
    bootstrap::{DesignOutcome, Provisioner},
    error::{StorageError, StorageResult},
    types::KeyValue,
};

/// In-memory storage backend using a [`BTreeMap`].
///
/// # Cloning
///
/// `MemoryBackend` is cheaply cloneable via [`Arc`]. All clones share the
/// same underlying data store.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    data: Arc<RwLock<BTreeMap<String, Bytes>>>,
}

impl MemoryBackend {
    /// Creates a new, empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of stored documents across all prefixes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns `true` if no documents are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Iterates the entries whose key starts with `prefix`, in key order.
    fn scan<'a>(
        data: &'a BTreeMap<String, Bytes>,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Bytes)> + 'a {
        data.range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(key, _)| key.starts_with(prefix))
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend").field("documents", &self.len()).finish()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &str) -> StorageResult<Option<Bytes>> {
        Ok(self.data.read().get(key).cloned())
    }

    async fn get_many(&self, keys: &[String]) -> StorageResult<Vec<KeyValue>> {
        let data = self.data.read();
        Ok(keys
            .iter()
            .filter_map(|key| data.get(key).map(|value| KeyValue::new(key.clone(), value.clone())))
            .collect())
    }

    async fn get_by_prefix(&self, prefix: &str) -> StorageResult<Vec<KeyValue>> {
        let data = self.data.read();
        Ok(Self::scan(&data, prefix).map(|(k, v)| KeyValue::new(k.clone(), v.clone())).collect())
    }

    async fn count(&self, prefix: &str) -> StorageResult<u64> {
        let data = self.data.read();
        Ok(Self::scan(&data, prefix).count() as u64)
    }

    async fn add(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let mut data = self.data.write();
        if data.contains_key(key) {
            return Err(StorageError::already_exists(key));
        }
        data.insert(key.to_owned(), Bytes::from(value));
        Ok(())
    }

    async fn update(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let mut data = self.data.write();
        match data.get_mut(key) {
            Some(slot) => {
                *slot = Bytes::from(value);
                Ok(())
            },
            None => Err(StorageError::not_found(key)),
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.data.write().remove(key);
        Ok(())
    }

    async fn health_check(&self) -> StorageResult<()> {
        // Acquiring the read lock proves we are not deadlocked
        let _unused = self.data.read();
        Ok(())
    }
}

/// Nothing to provision: the map exists as soon as the backend does, and
/// prefix counts need no index.
#[async_trait]
impl Provisioner for MemoryBackend {
    async fn ensure_database(&self) -> StorageResult<bool> {
        Ok(false)
    }

    async fn ensure_security(&self, _service_account: &str) -> StorageResult<()> {
        Ok(())
    }

    async fn ensure_design_documents(&self) -> StorageResult<DesignOutcome> {
        Ok(DesignOutcome::Unchanged)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_rejects_duplicate_without_overwrite() {
        let backend = MemoryBackend::new();
        backend.add("client:a", b"first".to_vec()).await.unwrap();

        let err = backend.add("client:a", b"second".to_vec()).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { ref key } if key == "client:a"));
        assert_eq!(backend.get("client:a").await.unwrap(), Some(Bytes::from("first")));
    }

    #[tokio::test]
    async fn update_missing_key_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend.update("client:missing", b"v".to_vec()).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn prefix_scan_stops_at_prefix_boundary() {
        let backend = MemoryBackend::new();
        backend.add("client:a", b"1".to_vec()).await.unwrap();
        backend.add("client:b", b"2".to_vec()).await.unwrap();
        backend.add("clients:z", b"3".to_vec()).await.unwrap();
        backend.add("user:a", b"4".to_vec()).await.unwrap();

        let clients = backend.get_by_prefix("client:").await.unwrap();
        let keys: Vec<_> = clients.iter().map(|kv| kv.key.as_str()).collect();
        assert_eq!(keys, vec!["client:a", "client:b"]);
        assert_eq!(backend.count("client:").await.unwrap(), 2);
        assert_eq!(backend.count("").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn get_many_omits_missing_keys() {
        let backend = MemoryBackend::new();
        backend.add("user:1", b"a".to_vec()).await.unwrap();
        backend.add("user:3", b"c".to_vec()).await.unwrap();

        let keys = vec!["user:1".to_owned(), "user:2".to_owned(), "user:3".to_owned()];
        let found = backend.get_many(&keys).await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let backend = MemoryBackend::new();
        let clone = backend.clone();
        backend.add("user:1", b"a".to_vec()).await.unwrap();
        assert_eq!(clone.len(), 1);
    }
}
