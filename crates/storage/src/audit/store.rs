//! Audit decorator for [`DocumentStore`] implementations.

use std::{collections::HashSet, time::Duration};

use async_trait::async_trait;

use super::{
    actor::{Actor, ActorSource},
    event::{AuditAction, AuditEvent, AuditSink},
    obfuscate::obfuscated_snapshot,
};
use crate::{document::Document, error::StorageResult, store::DocumentStore};

/// Default upper bound on how long a mutation waits for the sink.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Decorator that records an [`AuditEvent`] for every successful mutation.
///
/// The inner call always runs first with the caller's value. Only when it
/// succeeds is an event built (with an obfuscated snapshot for creates and
/// updates) and handed to the sink. Sink failures are logged and dropped, and
/// a sink that does not answer within the dispatch timeout is abandoned so a
/// stalled sink never holds up the write.
/// Reads are forwarded without any auditing.
///
/// # Usage
///
/// ```
/// use idp_storage::{
///     DocumentStore, MemoryBackend, TypedStore,
///     audit::{Actor, AuditedDocumentStore, TracingAuditSink},
///     entities::Client,
/// };
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let store = AuditedDocumentStore::new(TypedStore::new(MemoryBackend::new()), TracingAuditSink)
///     .with_actor_source(Actor::user("admin"));
///
/// store.add("my-app", &Client::builder().client_id("my-app").build()).await.unwrap();
/// # });
/// ```
pub struct AuditedDocumentStore<S, K, A = Actor> {
    inner: S,
    sink: K,
    actors: A,
    dispatch_timeout: Duration,
}

impl<S, K> AuditedDocumentStore<S, K, Actor>
where
    S: DocumentStore,
    K: AuditSink,
{
    /// Wraps `inner`, attributing every mutation to [`Actor::system`].
    pub fn new(inner: S, sink: K) -> Self {
        Self { inner, sink, actors: Actor::system(), dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT }
    }
}

impl<S, K, A> AuditedDocumentStore<S, K, A>
where
    S: DocumentStore,
    K: AuditSink,
    A: ActorSource,
{
    /// Replaces the source of actor identities.
    pub fn with_actor_source<B: ActorSource>(self, actors: B) -> AuditedDocumentStore<S, K, B> {
        AuditedDocumentStore {
            inner: self.inner,
            sink: self.sink,
            actors,
            dispatch_timeout: self.dispatch_timeout,
        }
    }

    /// Sets how long a mutation waits for the sink before dropping the event.
    #[must_use]
    pub fn with_dispatch_timeout(mut self, dispatch_timeout: Duration) -> Self {
        self.dispatch_timeout = dispatch_timeout;
        self
    }

    async fn emit<T: Document>(&self, action: AuditAction, id: &str, entity: Option<&T>) {
        let snapshot = match entity.map(obfuscated_snapshot::<T>) {
            Some(Ok(snapshot)) => Some(snapshot),
            Some(Err(err)) => {
                tracing::warn!(
                    entity_type = T::TYPE_TAG,
                    document_id = id,
                    error = %err,
                    "Could not snapshot entity for audit event"
                );
                None
            },
            None => None,
        };

        let actor = self.actors.current();
        let event = AuditEvent::builder()
            .action(action)
            .entity_type(T::TYPE_TAG)
            .document_id(id)
            .maybe_user(actor.user)
            .maybe_client(actor.client)
            .maybe_subject(actor.subject)
            .maybe_snapshot(snapshot)
            .build();

        match tokio::time::timeout(self.dispatch_timeout, self.sink.persist(&event)).await {
            Ok(Ok(())) => {},
            Ok(Err(err)) => tracing::error!(
                action = %action,
                entity_type = T::TYPE_TAG,
                document_id = id,
                error = %err,
                "Failed to dispatch audit event"
            ),
            Err(_) => tracing::error!(
                action = %action,
                entity_type = T::TYPE_TAG,
                document_id = id,
                timeout = ?self.dispatch_timeout,
                "Audit sink timed out, event dropped"
            ),
        }
    }
}

impl<S, K, A> std::fmt::Debug for AuditedDocumentStore<S, K, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditedDocumentStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl<S, K, A> DocumentStore for AuditedDocumentStore<S, K, A>
where
    S: DocumentStore,
    K: AuditSink,
    A: ActorSource,
{
    async fn get<T: Document>(&self, id: &str) -> StorageResult<Option<T>> {
        self.inner.get(id).await
    }

    async fn get_many<T: Document>(&self, ids: &HashSet<String>) -> StorageResult<Vec<T>> {
        self.inner.get_many(ids).await
    }

    async fn get_by_prefix<T: Document>(&self, prefix: &str) -> StorageResult<Vec<T>> {
        self.inner.get_by_prefix(prefix).await
    }

    async fn count(&self, prefix: &str) -> StorageResult<u64> {
        self.inner.count(prefix).await
    }

    async fn add<T: Document>(&self, id: &str, value: &T) -> StorageResult<()> {
        self.inner.add(id, value).await?;
        self.emit(AuditAction::Created, id, Some(value)).await;
        Ok(())
    }

    async fn update<T: Document>(&self, id: &str, value: &T) -> StorageResult<()> {
        self.inner.update(id, value).await?;
        self.emit(AuditAction::Updated, id, Some(value)).await;
        Ok(())
    }

    async fn delete<T: Document>(&self, id: &str) -> StorageResult<()> {
        self.inner.delete::<T>(id).await?;
        self.emit::<T>(AuditAction::Deleted, id, None).await;
        Ok(())
    }
}
