//! The process-wide store handed to the protocol engine.
//!
//! [`DocumentStore`] methods are generic, so the trait cannot be used as a
//! trait object. The backend is erased one level down instead, at the
//! byte-level [`StorageBackend`], and [`Store`] is a closed enum over the
//! two compositions the runtime builds.

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use idp_storage::{
    Document, DocumentStore, StorageBackend, StorageResult, TypedStore,
    audit::{AuditSink, AuditedDocumentStore, TaskLocalActor},
};

/// A backend chosen at runtime.
pub type SharedBackend = Arc<dyn StorageBackend>;

/// Typed store over the runtime-selected backend.
pub type PlainStore = TypedStore<SharedBackend>;

/// [`PlainStore`] wrapped with auditing. The acting identity comes from
/// [`TaskLocalActor::scope`] around each request.
pub type AuditedStore = AuditedDocumentStore<PlainStore, Arc<dyn AuditSink>, TaskLocalActor>;

/// Either composition, used wherever a [`DocumentStore`] is expected.
pub enum Store {
    /// No auditing.
    Plain(PlainStore),
    /// Every mutation emits an audit event.
    Audited(AuditedStore),
}

impl Store {
    /// Returns `true` if mutations are audited.
    #[must_use]
    pub fn is_audited(&self) -> bool {
        matches!(self, Self::Audited(_))
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("audited", &self.is_audited()).finish_non_exhaustive()
    }
}

#[async_trait]
impl DocumentStore for Store {
    async fn get<T: Document>(&self, id: &str) -> StorageResult<Option<T>> {
        match self {
            Self::Plain(store) => store.get(id).await,
            Self::Audited(store) => store.get(id).await,
        }
    }

    async fn get_many<T: Document>(&self, ids: &HashSet<String>) -> StorageResult<Vec<T>> {
        match self {
            Self::Plain(store) => store.get_many(ids).await,
            Self::Audited(store) => store.get_many(ids).await,
        }
    }

    async fn get_by_prefix<T: Document>(&self, prefix: &str) -> StorageResult<Vec<T>> {
        match self {
            Self::Plain(store) => store.get_by_prefix(prefix).await,
            Self::Audited(store) => store.get_by_prefix(prefix).await,
        }
    }

    async fn count(&self, prefix: &str) -> StorageResult<u64> {
        match self {
            Self::Plain(store) => store.count(prefix).await,
            Self::Audited(store) => store.count(prefix).await,
        }
    }

    async fn add<T: Document>(&self, id: &str, value: &T) -> StorageResult<()> {
        match self {
            Self::Plain(store) => store.add(id, value).await,
            Self::Audited(store) => store.add(id, value).await,
        }
    }

    async fn update<T: Document>(&self, id: &str, value: &T) -> StorageResult<()> {
        match self {
            Self::Plain(store) => store.update(id, value).await,
            Self::Audited(store) => store.update(id, value).await,
        }
    }

    async fn delete<T: Document>(&self, id: &str) -> StorageResult<()> {
        match self {
            Self::Plain(store) => store.delete::<T>(id).await,
            Self::Audited(store) => store.delete::<T>(id).await,
        }
    }
}
