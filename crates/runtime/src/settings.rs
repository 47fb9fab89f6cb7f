//! Storage settings file.
//!
//! ```json
//! {
//!   "backend": "couchdb",
//!   "couchdb": {
//!     "url": "http://couchdb:5984",
//!     "database": "idp",
//!     "username": "idp",
//!     "password": "secret",
//!     "admin_username": "admin",
//!     "admin_password": "admin-secret",
//!     "service_account": "idp"
//!   },
//!   "audit": true,
//!   "bootstrap": { "retry": { "max_retries": 5 } },
//!   "registration": { "authority": "https://idp.example", "threshold": 5 }
//! }
//! ```
//!
//! `{"backend": "memory"}` is the smallest valid file.

use std::{fmt, path::Path};

use idp_authz::RegistrationPolicy;
use idp_storage::{BootstrapConfig, ConfigError};
use idp_storage_couchdb::CouchDbConfig;
use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

/// Storage backend selected at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Non-durable in-process map.
    #[default]
    Memory,
    /// CouchDB over HTTP.
    CouchDb,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::CouchDb => write!(f, "couchdb"),
        }
    }
}

/// Everything needed to open the process-wide store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSettings {
    /// Which backend to open.
    #[serde(default)]
    pub backend: Backend,
    /// CouchDB connection settings; required for [`Backend::CouchDb`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub couchdb: Option<CouchDbConfig>,
    /// Wrap the store so every mutation emits an audit event.
    #[serde(default)]
    pub audit: bool,
    /// Retry and circuit breaker settings for first-run provisioning.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
    /// Self-service client registration policy, if registration is offered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<RegistrationPolicy>,
}

impl StorageSettings {
    /// Settings for a memory backend with defaults everywhere else.
    #[must_use]
    pub fn memory() -> Self {
        Self::default()
    }

    /// Settings for a CouchDB backend.
    #[must_use]
    pub fn couchdb(config: CouchDbConfig) -> Self {
        Self { backend: Backend::CouchDb, couchdb: Some(config), ..Self::default() }
    }

    /// Reads and validates a JSON settings file.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Io`], [`RuntimeError::Parse`] or
    /// [`RuntimeError::Config`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|source| RuntimeError::Io { path: path.to_owned(), source })?;
        let settings: Self = serde_json::from_str(&raw)
            .map_err(|source| RuntimeError::Parse { path: path.to_owned(), source })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks every section and their consistency with `backend`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (self.backend, &self.couchdb) {
            (Backend::CouchDb, None) => return Err(ConfigError::Missing { field: "couchdb" }),
            (Backend::CouchDb, Some(couchdb)) => couchdb.validate()?,
            (Backend::Memory, Some(_)) => {
                return Err(ConfigError::Invalid {
                    field: "couchdb",
                    reason: "only allowed with the couchdb backend".into(),
                });
            },
            (Backend::Memory, None) => {},
        }
        self.bootstrap.validate()?;
        if let Some(registration) = &self.registration {
            registration.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_selects_memory() {
        let settings: StorageSettings = serde_json::from_str(r#"{"backend": "memory"}"#).unwrap();
        assert_eq!(settings.backend, Backend::Memory);
        assert!(!settings.audit);
        assert!(settings.registration.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn couchdb_section_is_parsed() {
        let settings: StorageSettings = serde_json::from_str(
            r#"{
                "backend": "couchdb",
                "couchdb": { "url": "http://localhost:5984", "database": "idp", "timeout": "10s" },
                "audit": true
            }"#,
        )
        .unwrap();
        let couchdb = settings.couchdb.as_ref().unwrap();
        assert_eq!(couchdb.database(), "idp");
        assert_eq!(couchdb.timeout(), std::time::Duration::from_secs(10));
        assert!(settings.audit);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn couchdb_backend_requires_its_section() {
        let settings = StorageSettings { backend: Backend::CouchDb, ..StorageSettings::default() };
        assert_eq!(settings.validate(), Err(ConfigError::Missing { field: "couchdb" }));
    }

    #[test]
    fn couchdb_section_without_backend_is_rejected() {
        let config = CouchDbConfig::builder().url("http://localhost:5984").database("idp");
        let settings =
            StorageSettings { couchdb: Some(config.build().unwrap()), ..StorageSettings::memory() };
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid { field: "couchdb", .. })));
    }

    #[test]
    fn unknown_backend_is_a_parse_error() {
        assert!(serde_json::from_str::<StorageSettings>(r#"{"backend": "redis"}"#).is_err());
        assert!(serde_json::from_str::<StorageSettings>(r#"{"backends": "memory"}"#).is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = StorageSettings::from_path("/nonexistent/idp-storage.json").unwrap_err();
        let RuntimeError::Io { path, .. } = err else {
            panic!("expected Io error, got {err:?}");
        };
        assert_eq!(path, Path::new("/nonexistent/idp-storage.json"));
    }
}
