//! Errors raised while assembling the storage stack.

use std::path::PathBuf;

use idp_storage::{BootstrapError, ConfigError};
use idp_storage_couchdb::CouchDbError;
use thiserror::Error;

/// Failure to load settings, build a backend or bootstrap it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RuntimeError {
    /// A settings value is invalid.
    #[error("Invalid storage settings: {0}")]
    Config(#[from] ConfigError),

    /// The settings file could not be read.
    #[error("Cannot read {}: {source}", path.display())]
    Io {
        /// File that was read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON for [`StorageSettings`](crate::StorageSettings).
    #[error("Cannot parse {}: {source}", path.display())]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The CouchDB backend could not be constructed.
    #[error("CouchDB backend: {0}")]
    CouchDb(#[from] CouchDbError),

    /// Bootstrap aborted.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
}
