//! Narrow read/write interfaces consumed by the protocol engine.
//!
//! The engine never sees the [`DocumentStore`] itself. It asks for clients,
//! resources and grants through the traits below, all of which
//! [`DocumentLookups`] implements on top of any store.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::{
    document::PERSISTED_GRANT_PREFIX,
    entities::{ApiResource, Client, IdentityResource, PersistedGrant},
    error::{StorageError, StorageResult},
    store::DocumentStore,
};

/// Every enabled identity and API resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resources {
    /// Identity resources.
    pub identity_resources: Vec<IdentityResource>,
    /// API resources.
    pub api_resources: Vec<ApiResource>,
}

/// Client lookup.
#[async_trait]
pub trait ClientLookup: Send + Sync {
    /// Returns the client with `client_id` if it exists and is enabled.
    async fn find_client_by_id(&self, client_id: &str) -> StorageResult<Option<Client>>;
}

/// Resource lookup.
#[async_trait]
pub trait ResourceLookup: Send + Sync {
    /// Enabled identity resources whose name is one of `scopes`.
    async fn find_identity_resources_by_scope(
        &self,
        scopes: &HashSet<String>,
    ) -> StorageResult<Vec<IdentityResource>>;

    /// Enabled API resources exposing at least one of `scopes`.
    async fn find_api_resources_by_scope(
        &self,
        scopes: &HashSet<String>,
    ) -> StorageResult<Vec<ApiResource>>;

    /// The API resource called `name`, enabled or not.
    async fn find_api_resource(&self, name: &str) -> StorageResult<Option<ApiResource>>;

    /// Every enabled resource.
    async fn get_all_resources(&self) -> StorageResult<Resources>;
}

/// Persisted grant storage.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Stores `grant`, replacing any grant with the same key.
    async fn store(&self, grant: &PersistedGrant) -> StorageResult<()>;

    /// Returns the grant with `key`.
    async fn get(&self, key: &str) -> StorageResult<Option<PersistedGrant>>;

    /// Every grant issued to `subject_id`.
    async fn get_all(&self, subject_id: &str) -> StorageResult<Vec<PersistedGrant>>;

    /// Removes the grant with `key`.
    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// Removes every grant issued to `subject_id` for `client_id`.
    async fn remove_all(&self, subject_id: &str, client_id: &str) -> StorageResult<()>;
}

/// Implements the protocol-engine lookups over a [`DocumentStore`].
#[derive(Debug, Clone)]
pub struct DocumentLookups<S> {
    store: S,
}

impl<S: DocumentStore> DocumentLookups<S> {
    /// Creates lookups reading through `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    pub fn inner(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S: DocumentStore> ClientLookup for DocumentLookups<S> {
    async fn find_client_by_id(&self, client_id: &str) -> StorageResult<Option<Client>> {
        Ok(self.store.get::<Client>(client_id).await?.filter(|c| c.enabled))
    }
}

#[async_trait]
impl<S: DocumentStore> ResourceLookup for DocumentLookups<S> {
    async fn find_identity_resources_by_scope(
        &self,
        scopes: &HashSet<String>,
    ) -> StorageResult<Vec<IdentityResource>> {
        let found = self.store.get_many::<IdentityResource>(scopes).await?;
        Ok(found.into_iter().filter(|r| r.enabled).collect())
    }

    async fn find_api_resources_by_scope(
        &self,
        scopes: &HashSet<String>,
    ) -> StorageResult<Vec<ApiResource>> {
        let all = self.store.get_all::<ApiResource>().await?;
        Ok(all
            .into_iter()
            .filter(|api| api.enabled && api.scopes.iter().any(|s| scopes.contains(s)))
            .collect())
    }

    async fn find_api_resource(&self, name: &str) -> StorageResult<Option<ApiResource>> {
        self.store.get::<ApiResource>(name).await
    }

    async fn get_all_resources(&self) -> StorageResult<Resources> {
        let identity = self.store.get_all::<IdentityResource>().await?;
        let api = self.store.get_all::<ApiResource>().await?;
        Ok(Resources {
            identity_resources: identity.into_iter().filter(|r| r.enabled).collect(),
            api_resources: api.into_iter().filter(|r| r.enabled).collect(),
        })
    }
}

#[async_trait]
impl<S: DocumentStore> GrantStore for DocumentLookups<S> {
    async fn store(&self, grant: &PersistedGrant) -> StorageResult<()> {
        match self.store.add(&grant.key, grant).await {
            Err(StorageError::AlreadyExists { .. }) => self.store.update(&grant.key, grant).await,
            other => other,
        }
    }

    async fn get(&self, key: &str) -> StorageResult<Option<PersistedGrant>> {
        self.store.get::<PersistedGrant>(key).await
    }

    async fn get_all(&self, subject_id: &str) -> StorageResult<Vec<PersistedGrant>> {
        let grants = self.store.get_by_prefix::<PersistedGrant>(PERSISTED_GRANT_PREFIX).await?;
        Ok(grants.into_iter().filter(|g| g.subject_id == subject_id).collect())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.store.delete::<PersistedGrant>(key).await
    }

    async fn remove_all(&self, subject_id: &str, client_id: &str) -> StorageResult<()> {
        let grants = GrantStore::get_all(self, subject_id).await?;
        for grant in grants.iter().filter(|g| g.client_id == client_id) {
            self.store.delete::<PersistedGrant>(&grant.key).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{MemoryBackend, TypedStore, testutil};

    fn lookups() -> DocumentLookups<TypedStore<MemoryBackend>> {
        DocumentLookups::new(TypedStore::new(MemoryBackend::new()))
    }

    fn scopes(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| (*s).to_owned()).collect()
    }

    #[tokio::test]
    async fn disabled_clients_are_hidden() {
        let lookups = lookups();
        let mut client = testutil::client("app");
        client.enabled = false;
        lookups.inner().add("app", &client).await.unwrap();
        lookups.inner().add("web", &testutil::client("web")).await.unwrap();

        assert!(lookups.find_client_by_id("app").await.unwrap().is_none());
        assert!(lookups.find_client_by_id("web").await.unwrap().is_some());
        assert!(lookups.find_client_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resources_by_scope() {
        let lookups = lookups();
        for resource in IdentityResource::well_known() {
            lookups.inner().add(&resource.name, &resource).await.unwrap();
        }
        let orders = testutil::api_resource("orders", &["orders.read"]);
        let billing = testutil::api_resource("billing", &["billing"]);
        lookups.inner().add("orders", &orders).await.unwrap();
        lookups.inner().add("billing", &billing).await.unwrap();

        let requested = scopes(&["openid", "email", "x"]);
        let identity = lookups.find_identity_resources_by_scope(&requested).await.unwrap();
        assert_eq!(identity.len(), 2);

        let api = lookups.find_api_resources_by_scope(&scopes(&["orders.read"])).await.unwrap();
        assert_eq!(api.len(), 1);
        assert_eq!(api[0].name, "orders");

        let all = lookups.get_all_resources().await.unwrap();
        assert_eq!(all.identity_resources.len(), 3);
        assert_eq!(all.api_resources.len(), 2);
    }

    #[tokio::test]
    async fn grant_store_upserts_and_filters() {
        let lookups = lookups();
        let grant = testutil::grant("g1", "alice", "app");
        lookups.store(&grant).await.unwrap();
        let mut replaced = grant.clone();
        replaced.data = "v2".to_owned();
        lookups.store(&replaced).await.unwrap();
        lookups.store(&testutil::grant("g2", "alice", "web")).await.unwrap();
        lookups.store(&testutil::grant("g3", "bob", "app")).await.unwrap();

        assert_eq!(GrantStore::get(&lookups, "g1").await.unwrap().unwrap().data, "v2");
        assert_eq!(GrantStore::get_all(&lookups, "alice").await.unwrap().len(), 2);

        lookups.remove_all("alice", "app").await.unwrap();
        let remaining = GrantStore::get_all(&lookups, "alice").await.unwrap();
        let remaining: Vec<_> = remaining.into_iter().map(|g| g.key).collect();
        assert_eq!(remaining, vec!["g2"]);

        lookups.remove("g3").await.unwrap();
        lookups.remove("g3").await.unwrap();
        assert!(GrantStore::get(&lookups, "g3").await.unwrap().is_none());
    }
}
