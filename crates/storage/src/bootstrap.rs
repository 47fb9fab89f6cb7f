//! First-run provisioning of a storage backend.
//!
//! [`Bootstrapper::run`] executes four ordered steps once at process start:
//!
//! 1. ensure the database exists
//! 2. ensure the service account's access policy exists
//! 3. ensure the design (index) documents are current
//! 4. seed the well-known identity resources
//!
//! Each step is retried with backoff while it fails transiently and is
//! guarded by its own [`CircuitBreaker`]. "Already exists" outcomes are
//! logged as warnings and never abort startup. Misconfiguration detected
//! before contacting the backend is fatal ([`BootstrapError::Setup`]).

use std::{fmt, future::Future};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    circuit_breaker::{CircuitBreaker, CircuitBreakerConfig},
    entities::IdentityResource,
    error::{ConfigError, StorageError, StorageResult},
    retry::{RetryConfig, with_retry},
    store::DocumentStore,
};

/// Bootstrap failure. Either variant aborts startup.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BootstrapError {
    /// Unrecoverable misconfiguration, e.g. missing admin credentials.
    #[error("Storage setup failed: {message}")]
    Setup {
        /// What is missing or wrong.
        message: String,
    },

    /// A step failed after retries, or its circuit breaker rejected it.
    #[error("Bootstrap failed: {0}")]
    Storage(#[from] StorageError),
}

impl BootstrapError {
    /// Creates a new `Setup` error.
    #[must_use]
    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup { message: message.into() }
    }
}

/// Result of reconciling the design documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignOutcome {
    /// No design document existed; it was written.
    Created,
    /// The stored definition differed and was overwritten.
    Updated,
    /// The stored definition already matched.
    Unchanged,
}

impl fmt::Display for DesignOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Backend-specific provisioning primitives.
///
/// Every method must be idempotent. A duplicate-creation race may be
/// reported as [`StorageError::AlreadyExists`]; the bootstrapper downgrades
/// it to a warning.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Rejects configurations that can never provision successfully.
    ///
    /// Runs once before any step and is never retried.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Setup`] describing the problem.
    fn preflight(&self, _config: &BootstrapConfig) -> Result<(), BootstrapError> {
        Ok(())
    }

    /// Creates the database if it is missing. Returns `true` if it was created.
    async fn ensure_database(&self) -> StorageResult<bool>;

    /// Grants `service_account` access to the database.
    async fn ensure_security(&self, service_account: &str) -> StorageResult<()>;

    /// Writes the design documents unless the stored ones already match.
    async fn ensure_design_documents(&self) -> StorageResult<DesignOutcome>;
}

#[async_trait]
impl<P: Provisioner + ?Sized> Provisioner for std::sync::Arc<P> {
    fn preflight(&self, config: &BootstrapConfig) -> Result<(), BootstrapError> {
        (**self).preflight(config)
    }

    async fn ensure_database(&self) -> StorageResult<bool> {
        (**self).ensure_database().await
    }

    async fn ensure_security(&self, service_account: &str) -> StorageResult<()> {
        (**self).ensure_security(service_account).await
    }

    async fn ensure_design_documents(&self) -> StorageResult<DesignOutcome> {
        (**self).ensure_design_documents().await
    }
}

/// Bootstrap configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BootstrapConfig {
    #[serde(default)]
    service_account: Option<String>,
    #[serde(default = "default_seed")]
    seed_identity_resources: bool,
    #[serde(default)]
    retry: RetryConfig,
    #[serde(default)]
    circuit_breaker: CircuitBreakerConfig,
}

fn default_seed() -> bool {
    true
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            service_account: None,
            seed_identity_resources: true,
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

#[bon::bon]
impl BootstrapConfig {
    /// Creates a bootstrap configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `service_account` is empty or a nested
    /// configuration is invalid.
    #[builder]
    pub fn new(
        #[builder(into)] service_account: Option<String>,
        #[builder(default = true)] seed_identity_resources: bool,
        #[builder(default)] retry: RetryConfig,
        #[builder(default)] circuit_breaker: CircuitBreakerConfig,
    ) -> Result<Self, ConfigError> {
        let config = Self { service_account, seed_identity_resources, retry, circuit_breaker };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants enforced by the builder.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_account.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::Missing { field: "service_account" });
        }
        self.retry.validate()?;
        self.circuit_breaker.validate()
    }

    /// Returns the service account granted database access, if any.
    #[must_use]
    pub fn service_account(&self) -> Option<&str> {
        self.service_account.as_deref()
    }

    /// Sets the service account unless one is already configured.
    ///
    /// Lets a backend's own settings supply the account name.
    #[must_use]
    pub fn or_service_account(mut self, service_account: Option<&str>) -> Self {
        if self.service_account.is_none() {
            self.service_account = service_account.filter(|s| !s.is_empty()).map(str::to_owned);
        }
        self
    }

    /// Returns whether well-known identity resources are seeded.
    #[must_use]
    pub fn seed_identity_resources(&self) -> bool {
        self.seed_identity_resources
    }

    /// Returns the retry policy applied to every step.
    #[must_use]
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Returns the circuit breaker configuration shared by every step.
    #[must_use]
    pub fn circuit_breaker(&self) -> &CircuitBreakerConfig {
        &self.circuit_breaker
    }
}

/// A provisioning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Create the database.
    EnsureDatabase,
    /// Apply the security document.
    EnsureSecurity,
    /// Reconcile design documents.
    EnsureDesignDocuments,
    /// Insert well-known resources.
    SeedResources,
}

impl Step {
    /// Every step, in execution order.
    pub const ALL: [Step; 4] = [
        Self::EnsureDatabase,
        Self::EnsureSecurity,
        Self::EnsureDesignDocuments,
        Self::SeedResources,
    ];

    /// Stable name used in logs and breaker labels.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::EnsureDatabase => "ensure_database",
            Self::EnsureSecurity => "ensure_security",
            Self::EnsureDesignDocuments => "ensure_design_documents",
            Self::SeedResources => "seed_resources",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a bootstrap run changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    /// The database was created by this run.
    pub database_created: bool,
    /// The security document was applied.
    pub security_applied: bool,
    /// Outcome of the design document reconciliation.
    pub design_documents: DesignOutcome,
    /// Resources inserted by this run.
    pub resources_seeded: usize,
    /// Resources that were already present.
    pub resources_present: usize,
}

impl BootstrapReport {
    /// Returns `true` if the run created or changed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        !self.database_created
            && self.design_documents == DesignOutcome::Unchanged
            && self.resources_seeded == 0
    }
}

/// Runs the provisioning steps against a backend.
///
/// # Example
///
/// ```
/// use idp_storage::{
///     MemoryBackend, TypedStore,
///     bootstrap::{BootstrapConfig, Bootstrapper},
/// };
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let backend = MemoryBackend::new();
/// let bootstrapper = Bootstrapper::new(
///     backend.clone(),
///     TypedStore::new(backend),
///     BootstrapConfig::default(),
/// );
///
/// let report = bootstrapper.run().await.unwrap();
/// assert_eq!(report.resources_seeded, 3);
/// # });
/// ```
pub struct Bootstrapper<P, S> {
    provisioner: P,
    store: S,
    config: BootstrapConfig,
    breakers: [CircuitBreaker; 4],
}

impl<P, S> fmt::Debug for Bootstrapper<P, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bootstrapper").field("config", &self.config).finish_non_exhaustive()
    }
}

impl<P: Provisioner, S: DocumentStore> Bootstrapper<P, S> {
    /// Creates a bootstrapper. `store` receives the seeded resources.
    pub fn new(provisioner: P, store: S, config: BootstrapConfig) -> Self {
        let breakers =
            Step::ALL.map(|step| CircuitBreaker::new(step.name(), config.circuit_breaker));
        Self { provisioner, store, config, breakers }
    }

    /// Returns the circuit breaker guarding `step`.
    #[must_use]
    pub fn breaker(&self, step: Step) -> &CircuitBreaker {
        &self.breakers[step.index()]
    }

    /// Runs every step in order.
    ///
    /// # Errors
    ///
    /// - [`BootstrapError::Setup`] if the provisioner rejects the configuration.
    /// - [`BootstrapError::Storage`] if a step still fails after retries, or
    ///   fails fast because its circuit is open.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self) -> Result<BootstrapReport, BootstrapError> {
        self.provisioner.preflight(&self.config)?;

        let database_created = self
            .run_step(Step::EnsureDatabase, || self.provisioner.ensure_database())
            .await
            .or_else(|err| downgrade(Step::EnsureDatabase, err, false))?;
        if database_created {
            tracing::info!("created database");
        }

        let security_applied = match self.config.service_account() {
            Some(account) => {
                self.run_step(Step::EnsureSecurity, || self.provisioner.ensure_security(account))
                    .await
                    .or_else(|err| downgrade(Step::EnsureSecurity, err, ()))?;
                true
            },
            None => {
                tracing::debug!("no service account configured, skipping security document");
                false
            },
        };

        let design_documents = self
            .run_step(Step::EnsureDesignDocuments, || self.provisioner.ensure_design_documents())
            .await
            .or_else(|err| downgrade(Step::EnsureDesignDocuments, err, DesignOutcome::Unchanged))?;
        tracing::info!(outcome = %design_documents, "design documents reconciled");

        let (resources_seeded, resources_present) = if self.config.seed_identity_resources() {
            self.seed(&IdentityResource::well_known()).await?
        } else {
            (0, 0)
        };

        let report = BootstrapReport {
            database_created,
            security_applied,
            design_documents,
            resources_seeded,
            resources_present,
        };
        tracing::info!(
            database_created,
            security_applied,
            design_documents = %design_documents,
            resources_seeded,
            resources_present,
            "storage bootstrap complete"
        );
        Ok(report)
    }

    async fn seed(&self, resources: &[IdentityResource]) -> Result<(usize, usize), BootstrapError> {
        let mut seeded = 0;
        let mut present = 0;
        for resource in resources {
            let added = self
                .run_step(Step::SeedResources, || self.store.add(&resource.name, resource))
                .await
                .map(|()| true)
                .or_else(|err| downgrade(Step::SeedResources, err, false))?;
            if added {
                seeded += 1;
            } else {
                present += 1;
            }
        }
        Ok((seeded, present))
    }

    async fn run_step<T, F, Fut>(&self, step: Step, operation: F) -> StorageResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let breaker = self.breaker(step);
        let operation = &operation;
        let result =
            with_retry(&self.config.retry, step.name(), move || breaker.call(operation)).await;
        if let Err(err) = &result
            && !matches!(err, StorageError::AlreadyExists { .. })
        {
            tracing::error!(step = %step, error = %err, "bootstrap step failed");
        }
        result
    }
}

/// Turns "already exists" into a warning and `fallback`; passes every other
/// error through.
fn downgrade<T>(step: Step, err: StorageError, fallback: T) -> Result<T, BootstrapError> {
    match err {
        StorageError::AlreadyExists { key } => {
            tracing::warn!(step = %step, key = %key, "already exists, continuing");
            Ok(fallback)
        },
        other => Err(BootstrapError::Storage(other)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        MemoryBackend, TypedStore,
        circuit_breaker::CircuitState,
        testutil::FlakyProvisioner,
    };

    fn config() -> BootstrapConfig {
        BootstrapConfig::builder()
            .service_account("idp-service")
            .retry(
                RetryConfig::builder()
                    .max_retries(10)
                    .initial_backoff(Duration::from_millis(10))
                    .max_backoff(Duration::from_millis(100))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn second_run_is_a_noop() {
        let backend = MemoryBackend::new();
        let bootstrapper =
            Bootstrapper::new(backend.clone(), TypedStore::new(backend.clone()), config());

        let first = bootstrapper.run().await.unwrap();
        assert_eq!(first.resources_seeded, 3);
        assert!(first.security_applied);

        let second = bootstrapper.run().await.unwrap();
        assert!(second.is_noop());
        assert_eq!(second.resources_present, 3);
        assert_eq!(backend.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let provisioner = FlakyProvisioner::failing(3);
        let bootstrapper =
            Bootstrapper::new(provisioner.clone(), TypedStore::new(MemoryBackend::new()), config());

        let report = bootstrapper.run().await.unwrap();
        assert!(report.database_created);
        assert_eq!(provisioner.database_calls(), 4);
        assert_eq!(bootstrapper.breaker(Step::EnsureDatabase).state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn open_breaker_fails_fast() {
        let provisioner = FlakyProvisioner::failing(u32::MAX);
        let bootstrapper =
            Bootstrapper::new(provisioner.clone(), TypedStore::new(MemoryBackend::new()), config());

        let err = bootstrapper.run().await.unwrap_err();
        assert!(matches!(err, BootstrapError::Storage(StorageError::CircuitOpen { .. })));
        assert_eq!(provisioner.database_calls(), 5);
        assert!(matches!(
            bootstrapper.breaker(Step::EnsureDatabase).state(),
            CircuitState::Open { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_database_is_a_warning() {
        let provisioner = FlakyProvisioner::reporting_duplicates();
        let bootstrapper =
            Bootstrapper::new(provisioner, TypedStore::new(MemoryBackend::new()), config());

        let report = bootstrapper.run().await.unwrap();
        assert!(!report.database_created);
        assert_eq!(report.design_documents, DesignOutcome::Unchanged);
    }

    #[test]
    fn empty_service_account_is_rejected() {
        let err = BootstrapConfig::builder().service_account("").build().unwrap_err();
        assert_eq!(err, ConfigError::Missing { field: "service_account" });
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: BootstrapConfig =
            serde_json::from_str(r#"{"service_account": "svc", "retry": {"max_retries": 2}}"#)
                .unwrap();
        assert_eq!(config.service_account(), Some("svc"));
        assert!(config.seed_identity_resources());
        assert_eq!(config.retry().max_retries(), 2);
        assert_eq!(config.circuit_breaker().failure_threshold(), 5);
    }

    #[test]
    fn configured_service_account_wins() {
        let explicit = config().or_service_account(Some("from-backend"));
        assert_eq!(explicit.service_account(), Some("idp-service"));

        let filled = BootstrapConfig::default().or_service_account(Some("from-backend"));
        assert_eq!(filled.service_account(), Some("from-backend"));
        assert_eq!(BootstrapConfig::default().or_service_account(Some("")).service_account(), None);
    }
}
