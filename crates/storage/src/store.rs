//! Typed document store contract and its backend adapter.
//!
//! [`DocumentStore`] is what the rest of the identity backend talks to:
//! resource/client/grant lookups, the registration gate and the bootstrapper.
//! [`TypedStore`] implements it over any [`StorageBackend`] by deriving keys
//! from [`Document::TYPE_TAG`] and running values through a [`Codec`].
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ lookups / registration gate / bootstrapper   │
//! ├──────────────────────────────────────────────┤
//! │ AuditedDocumentStore (optional decorator)    │
//! ├──────────────────────────────────────────────┤
//! │ TypedStore<B, C>   keys + codec              │
//! ├──────────────────┬───────────────────────────┤
//! │ MemoryBackend    │ CouchDbBackend            │
//! └──────────────────┴───────────────────────────┘
//! ```

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;

use crate::{
    backend::StorageBackend,
    document::{Codec, Document, DocumentKey, JsonCodec},
    error::StorageResult,
};

/// Typed key/value persistence.
///
/// Every method is generic over the document type; the type decides the key
/// namespace. Implementations are shared across request tasks and must be
/// `Send + Sync`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Looks up a single document. Returns `Ok(None)` if it does not exist.
    async fn get<T: Document>(&self, id: &str) -> StorageResult<Option<T>>;

    /// Looks up several documents. Ids that are not found are omitted.
    async fn get_many<T: Document>(&self, ids: &HashSet<String>) -> StorageResult<Vec<T>>;

    /// Returns every document of type `T` whose full key starts with `prefix`.
    ///
    /// Ordering is unspecified.
    async fn get_by_prefix<T: Document>(&self, prefix: &str) -> StorageResult<Vec<T>>;

    /// Counts stored documents whose full key starts with `prefix`.
    async fn count(&self, prefix: &str) -> StorageResult<u64>;

    /// Stores a new document.
    ///
    /// # Errors
    ///
    /// [`AlreadyExists`](crate::StorageError::AlreadyExists) if `(T, id)` is present.
    async fn add<T: Document>(&self, id: &str, value: &T) -> StorageResult<()>;

    /// Replaces an existing document.
    ///
    /// # Errors
    ///
    /// [`NotFound`](crate::StorageError::NotFound) if absent,
    /// [`Conflict`](crate::StorageError::Conflict) on a lost revision race.
    async fn update<T: Document>(&self, id: &str, value: &T) -> StorageResult<()>;

    /// Deletes a document. Deleting an absent document is not an error.
    async fn delete<T: Document>(&self, id: &str) -> StorageResult<()>;

    /// Returns every document of type `T`.
    async fn get_all<T: Document>(&self) -> StorageResult<Vec<T>> {
        self.get_by_prefix::<T>(&DocumentKey::prefix::<T>()).await
    }
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    async fn get<T: Document>(&self, id: &str) -> StorageResult<Option<T>> {
        (**self).get::<T>(id).await
    }

    async fn get_many<T: Document>(&self, ids: &HashSet<String>) -> StorageResult<Vec<T>> {
        (**self).get_many::<T>(ids).await
    }

    async fn get_by_prefix<T: Document>(&self, prefix: &str) -> StorageResult<Vec<T>> {
        (**self).get_by_prefix::<T>(prefix).await
    }

    async fn count(&self, prefix: &str) -> StorageResult<u64> {
        (**self).count(prefix).await
    }

    async fn add<T: Document>(&self, id: &str, value: &T) -> StorageResult<()> {
        (**self).add(id, value).await
    }

    async fn update<T: Document>(&self, id: &str, value: &T) -> StorageResult<()> {
        (**self).update(id, value).await
    }

    async fn delete<T: Document>(&self, id: &str) -> StorageResult<()> {
        (**self).delete::<T>(id).await
    }
}

/// [`DocumentStore`] over an untyped [`StorageBackend`].
///
/// # Example
///
/// ```
/// use idp_storage::{DocumentStore, MemoryBackend, TypedStore, entities::Client};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let store = TypedStore::new(MemoryBackend::new());
/// let client = Client::builder().client_id("my-app").client_name("My App").build();
///
/// store.add("my-app", &client).await.unwrap();
/// let loaded: Option<Client> = store.get("my-app").await.unwrap();
/// assert_eq!(loaded.map(|c| c.client_id), Some("my-app".to_owned()));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct TypedStore<B, C = JsonCodec> {
    backend: B,
    codec: C,
}

impl<B: StorageBackend> TypedStore<B, JsonCodec> {
    /// Creates a typed store using the JSON codec.
    pub fn new(backend: B) -> Self {
        Self { backend, codec: JsonCodec }
    }
}

impl<B: StorageBackend, C: Codec> TypedStore<B, C> {
    /// Creates a typed store with a custom codec.
    pub fn with_codec(backend: B, codec: C) -> Self {
        Self { backend, codec }
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[async_trait]
impl<B: StorageBackend, C: Codec> DocumentStore for TypedStore<B, C> {
    async fn get<T: Document>(&self, id: &str) -> StorageResult<Option<T>> {
        let key = DocumentKey::new::<T>(id)?;
        match self.backend.get(key.as_str()).await? {
            Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn get_many<T: Document>(&self, ids: &HashSet<String>) -> StorageResult<Vec<T>> {
        let keys = ids
            .iter()
            .map(|id| DocumentKey::new::<T>(id).map(DocumentKey::into_string))
            .collect::<StorageResult<Vec<_>>>()?;
        self.backend
            .get_many(&keys)
            .await?
            .iter()
            .map(|kv| self.codec.decode(&kv.value))
            .collect()
    }

    async fn get_by_prefix<T: Document>(&self, prefix: &str) -> StorageResult<Vec<T>> {
        self.backend
            .get_by_prefix(prefix)
            .await?
            .iter()
            .map(|kv| self.codec.decode(&kv.value))
            .collect()
    }

    async fn count(&self, prefix: &str) -> StorageResult<u64> {
        self.backend.count(prefix).await
    }

    #[tracing::instrument(level = "debug", skip(self, value), fields(tag = T::TYPE_TAG))]
    async fn add<T: Document>(&self, id: &str, value: &T) -> StorageResult<()> {
        let key = DocumentKey::new::<T>(id)?;
        let bytes = self.codec.encode(value)?;
        self.backend.add(key.as_str(), bytes).await
    }

    #[tracing::instrument(level = "debug", skip(self, value), fields(tag = T::TYPE_TAG))]
    async fn update<T: Document>(&self, id: &str, value: &T) -> StorageResult<()> {
        let key = DocumentKey::new::<T>(id)?;
        let bytes = self.codec.encode(value)?;
        self.backend.update(key.as_str(), bytes).await
    }

    #[tracing::instrument(level = "debug", skip(self), fields(tag = T::TYPE_TAG))]
    async fn delete<T: Document>(&self, id: &str) -> StorageResult<()> {
        let key = DocumentKey::new::<T>(id)?;
        self.backend.delete(key.as_str()).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        MemoryBackend, StorageError,
        document::CLIENT_PREFIX,
        entities::{Client, IdentityResource},
    };

    fn client(id: &str) -> Client {
        Client::builder().client_id(id).client_name(format!("Client {id}")).build()
    }

    #[tokio::test]
    async fn same_id_under_different_types_does_not_collide() {
        let store = TypedStore::new(MemoryBackend::new());
        store.add("openid", &client("openid")).await.unwrap();
        store.add("openid", &IdentityResource::openid()).await.unwrap();

        assert_eq!(store.count(CLIENT_PREFIX).await.unwrap(), 1);
        assert_eq!(store.count("identityresource:").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn get_many_skips_unknown_ids() {
        let store = TypedStore::new(MemoryBackend::new());
        store.add("a", &client("a")).await.unwrap();
        store.add("b", &client("b")).await.unwrap();

        let ids: HashSet<String> = ["a", "b", "nope"].iter().map(|s| (*s).to_owned()).collect();
        let found = store.get_many::<Client>(&ids).await.unwrap();
        let mut found: Vec<String> = found.into_iter().map(|c| c.client_id).collect();
        found.sort();
        assert_eq!(found, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn corrupt_value_surfaces_serialization_error() {
        let backend = MemoryBackend::new();
        backend.add("client:broken", b"not json".to_vec()).await.unwrap();
        let store = TypedStore::new(backend);

        let result = store.get::<Client>("broken").await;
        assert!(matches!(result, Err(StorageError::Serialization { .. })));
    }

    #[tokio::test]
    async fn get_all_uses_type_prefix() {
        let store = TypedStore::new(MemoryBackend::new());
        store.add("a", &client("a")).await.unwrap();
        store.add("openid", &IdentityResource::openid()).await.unwrap();

        let clients: Vec<Client> = store.get_all().await.unwrap();
        assert_eq!(clients.len(), 1);
    }
}
