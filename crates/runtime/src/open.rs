//! Composition root: select the backend, wrap it, bootstrap it.

use std::sync::Arc;

use idp_authz::RegistrationGate;
use idp_storage::{
    BootstrapConfig, BootstrapReport, Bootstrapper, ConfigError, MemoryBackend, Provisioner,
    StorageResult, TypedStore,
    audit::{AuditSink, AuditedDocumentStore, TaskLocalActor, TracingAuditSink},
};
use idp_storage_couchdb::CouchDbBackend;

use crate::{
    error::RuntimeError,
    settings::{Backend, StorageSettings},
    store::{SharedBackend, Store},
};

/// The opened, provisioned store and what bootstrap did to it.
///
/// Create one per process at startup and hand clones of
/// [`store`](Self::store) to every consumer.
pub struct Storage {
    backend: Backend,
    raw: SharedBackend,
    store: Arc<Store>,
    report: BootstrapReport,
    settings: StorageSettings,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("backend", &self.backend)
            .field("store", &self.store)
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

impl Storage {
    /// Which backend is in use.
    #[must_use]
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Shared handle to the composed store.
    #[must_use]
    pub fn store(&self) -> Arc<Store> {
        Arc::clone(&self.store)
    }

    /// What the startup bootstrap created or found.
    #[must_use]
    pub fn report(&self) -> &BootstrapReport {
        &self.report
    }

    /// Registration gate over this store, if the settings define a policy.
    #[must_use]
    pub fn registration_gate(&self) -> Option<RegistrationGate<Arc<Store>>> {
        let policy = self.settings.registration.clone()?;
        Some(RegistrationGate::new(self.store(), policy))
    }

    /// Checks that the backend can currently serve requests.
    ///
    /// # Errors
    ///
    /// Returns the backend's error, typically
    /// [`Unavailable`](idp_storage::StorageError::Unavailable).
    pub async fn health_check(&self) -> StorageResult<()> {
        self.raw.health_check().await
    }
}

/// Opens the store described by `settings`, auditing to
/// [`TracingAuditSink`] when auditing is enabled.
///
/// # Errors
///
/// See [`open_store_with_sink`].
pub async fn open_store(settings: StorageSettings) -> Result<Storage, RuntimeError> {
    open_store_with_sink(settings, Arc::new(TracingAuditSink)).await
}

/// Opens the store described by `settings`.
///
/// Builds the backend, wraps it with `sink` when `settings.audit` is set,
/// and runs the bootstrapper once. Seeded resources go through the composed
/// store, so they are audited like any other write.
///
/// # Errors
///
/// - [`RuntimeError::Config`] for inconsistent settings.
/// - [`RuntimeError::CouchDb`] if the HTTP client cannot be built.
/// - [`RuntimeError::Bootstrap`] if provisioning fails; the process should
///   not start.
#[tracing::instrument(skip_all, fields(backend = %settings.backend, audit = settings.audit))]
pub async fn open_store_with_sink(
    settings: StorageSettings,
    sink: Arc<dyn AuditSink>,
) -> Result<Storage, RuntimeError> {
    settings.validate()?;

    let (raw, provisioner, bootstrap) = select_backend(&settings)?;
    let typed = TypedStore::new(Arc::clone(&raw));
    let store = if settings.audit {
        Store::Audited(
            AuditedDocumentStore::new(typed, sink).with_actor_source(TaskLocalActor::default()),
        )
    } else {
        Store::Plain(typed)
    };
    let store = Arc::new(store);

    let report = Bootstrapper::new(provisioner, Arc::clone(&store), bootstrap).run().await?;
    tracing::info!(backend = %settings.backend, "storage ready");

    Ok(Storage { backend: settings.backend, raw, store, report, settings })
}

fn select_backend(
    settings: &StorageSettings,
) -> Result<(SharedBackend, Arc<dyn Provisioner>, BootstrapConfig), RuntimeError> {
    match (settings.backend, &settings.couchdb) {
        (Backend::CouchDb, Some(config)) => {
            let backend = CouchDbBackend::new(config.clone())?;
            let bootstrap =
                settings.bootstrap.clone().or_service_account(config.service_account());
            Ok((Arc::new(backend.clone()), Arc::new(backend), bootstrap))
        },
        (Backend::CouchDb, None) => Err(ConfigError::Missing { field: "couchdb" }.into()),
        (Backend::Memory, _) => {
            let backend = MemoryBackend::new();
            Ok((Arc::new(backend.clone()), Arc::new(backend), settings.bootstrap.clone()))
        },
    }
}
