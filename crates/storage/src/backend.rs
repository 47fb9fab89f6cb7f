//! Storage backend trait definition.
//!
//! [`StorageBackend`] is the untyped half of the document store: full string
//! keys mapped to serialized bytes. Typed access lives one layer up in
//! [`TypedStore`](crate::TypedStore), which owns the key namespacing and the
//! serializer, so backends never inspect document types.
//!
//! # Implementing a Backend
//!
//! 1. Implement [`StorageBackend`]
//! 2. Map backend-specific errors to [`StorageError`](crate::StorageError)
//! 3. Run the [`conformance`](crate::conformance) suite against it
//!
//! See [`MemoryBackend`](crate::MemoryBackend) for a reference implementation.

use async_trait::async_trait;
use bytes::Bytes;

use crate::{error::StorageResult, types::KeyValue};

/// Abstract storage backend for namespaced document keys.
///
/// Backends are shared process-wide and must be safe under concurrent
/// callers (`Send + Sync`).
///
/// # Key Operations
///
/// | Method | Description |
/// |--------|-------------|
/// | [`get`](StorageBackend::get) | Retrieve a single value by key |
/// | [`get_many`](StorageBackend::get_many) | Batch lookup, missing keys omitted |
/// | [`get_by_prefix`](StorageBackend::get_by_prefix) | Every value whose key starts with a prefix |
/// | [`count`](StorageBackend::count) | Number of keys with a prefix |
/// | [`add`](StorageBackend::add) | Insert-if-absent |
/// | [`update`](StorageBackend::update) | Replace an existing value |
/// | [`delete`](StorageBackend::delete) | Best-effort removal |
/// | [`health_check`](StorageBackend::health_check) | Verify backend availability |
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use idp_storage::{MemoryBackend, StorageBackend};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let backend = MemoryBackend::new();
///
/// backend.add("client:app", b"{}".to_vec()).await.unwrap();
/// let value = backend.get("client:app").await.unwrap();
/// assert_eq!(value, Some(Bytes::from("{}")));
/// # });
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Retrieves a value by its full key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get(&self, key: &str) -> StorageResult<Option<Bytes>>;

    /// Retrieves several values at once.
    ///
    /// Keys that do not exist are silently omitted from the result. The
    /// order of the returned pairs is unspecified.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get_many(&self, keys: &[String]) -> StorageResult<Vec<KeyValue>>;

    /// Retrieves every stored value whose key starts with `prefix`.
    ///
    /// Ordering is unspecified; callers must not depend on it.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get_by_prefix(&self, prefix: &str) -> StorageResult<Vec<KeyValue>>;

    /// Counts the stored keys that start with `prefix`.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn count(&self, prefix: &str) -> StorageResult<u64>;

    /// Stores a new value.
    ///
    /// # Errors
    ///
    /// Returns [`AlreadyExists`](crate::StorageError::AlreadyExists) if the
    /// key is already present. Existing values are never overwritten.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn add(&self, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Replaces the value of an existing key.
    ///
    /// Backends that track revisions must use them: the write only succeeds
    /// if the document has not changed since it was read.
    ///
    /// # Errors
    ///
    /// - [`NotFound`](crate::StorageError::NotFound) if the key is absent.
    /// - [`Conflict`](crate::StorageError::Conflict) if a concurrent writer won the revision race.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn update(&self, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Deletes a key.
    ///
    /// If the key doesn't exist, this is a no-op (returns `Ok(())`).
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Checks that the backend can currently serve requests.
    #[must_use = "health check results indicate backend availability and must be inspected"]
    async fn health_check(&self) -> StorageResult<()>;
}

#[async_trait]
impl<B: StorageBackend + ?Sized> StorageBackend for std::sync::Arc<B> {
    async fn get(&self, key: &str) -> StorageResult<Option<Bytes>> {
        (**self).get(key).await
    }

    async fn get_many(&self, keys: &[String]) -> StorageResult<Vec<KeyValue>> {
        (**self).get_many(keys).await
    }

    async fn get_by_prefix(&self, prefix: &str) -> StorageResult<Vec<KeyValue>> {
        (**self).get_by_prefix(prefix).await
    }

    async fn count(&self, prefix: &str) -> StorageResult<u64> {
        (**self).count(prefix).await
    }

    async fn add(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        (**self).add(key, value).await
    }

    async fn update(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        (**self).update(key, value).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        (**self).delete(key).await
    }

    async fn health_check(&self) -> StorageResult<()> {
        (**self).health_check().await
    }
}
