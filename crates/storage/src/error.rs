//! Storage error types and result alias.
//!
//! Every backend maps its internal failures onto [`StorageError`], so callers
//! of the document store never see transport-level error types.
//!
//! # Error Types
//!
//! - [`StorageError::AlreadyExists`] - `add` on a key that is already present
//! - [`StorageError::NotFound`] - `update` on a key that is absent
//! - [`StorageError::Conflict`] - optimistic revision check failed
//! - [`StorageError::Unavailable`] - backend transport failure
//! - [`StorageError::CircuitOpen`] - bootstrap call rejected by an open circuit breaker
//! - [`StorageError::Timeout`] - backend call exceeded its deadline
//! - [`StorageError::Serialization`] - document encoding/decoding failures
//! - [`StorageError::Internal`] - anything else
//!
//! # Example
//!
//! ```
//! use idp_storage::{StorageError, StorageResult};
//!
//! fn lookup(key: &str) -> StorageResult<Vec<u8>> {
//!     Err(StorageError::not_found(key))
//! }
//! ```

use std::{sync::Arc, time::Duration};

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
///
/// Errors preserve their source chain via the `#[source]` attribute, enabling
/// debugging tools to display the full error context.
///
/// # Non-exhaustive
///
/// New variants may be added in future minor releases. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// A document with the same key is already stored.
    #[error("Document already exists: {key}")]
    AlreadyExists {
        /// The duplicate key.
        key: String,
    },

    /// The requested document was not found.
    #[error("Document not found: {key}")]
    NotFound {
        /// The key that was not found.
        key: String,
    },

    /// Optimistic update collision: the document changed since it was read.
    ///
    /// The caller must re-read and retry, or surface the conflict.
    #[error("Revision conflict on document: {key}")]
    Conflict {
        /// The key whose revision check failed.
        key: String,
    },

    /// The storage backend could not be reached.
    #[error("Storage unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
        /// The underlying transport error.
        #[source]
        source: Option<BoxError>,
    },

    /// A circuit breaker rejected the call without contacting the backend.
    #[error("Circuit open, retry after {}s", retry_after.as_secs())]
    CircuitOpen {
        /// Remaining cool-down before the breaker admits a trial call.
        retry_after: Duration,
    },

    /// The backend call exceeded its deadline.
    #[error("Operation timeout")]
    Timeout,

    /// Serialization or deserialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
        /// The underlying error that caused serialization to fail.
        #[source]
        source: Option<BoxError>,
    },

    /// Internal storage backend error.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying error that caused this internal failure.
        #[source]
        source: Option<BoxError>,
    },
}

impl StorageError {
    /// Creates a new `AlreadyExists` error for the given key.
    #[must_use]
    pub fn already_exists(key: impl Into<String>) -> Self {
        Self::AlreadyExists { key: key.into() }
    }

    /// Creates a new `NotFound` error for the given key.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a new `Conflict` error for the given key.
    #[must_use]
    pub fn conflict(key: impl Into<String>) -> Self {
        Self::Conflict { key: key.into() }
    }

    /// Creates a new `Unavailable` error with the given message.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable { message: message.into(), source: None }
    }

    /// Creates a new `Unavailable` error with a message and source error.
    #[must_use]
    pub fn unavailable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Unavailable { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `CircuitOpen` error.
    #[must_use]
    pub fn circuit_open(retry_after: Duration) -> Self {
        Self::CircuitOpen { retry_after }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Creates a new `Serialization` error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), source: None }
    }

    /// Creates a new `Serialization` error with a message and source error.
    #[must_use]
    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Creates a new `Internal` error with a message and source error.
    #[must_use]
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Only transport failures and timeouts are transient. These are the
    /// errors that count toward a circuit breaker's failure threshold.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout)
    }

    /// Whether the error means the backend cannot currently serve requests.
    ///
    /// `CircuitOpen` is reported here alongside transport failures because
    /// callers treat a rejected call exactly like an unreachable backend.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout | Self::CircuitOpen { .. })
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_with_source(err.to_string(), err)
    }
}

/// Validation failure raised by configuration builders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A numeric field is below its allowed minimum.
    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum {
        /// Field name.
        field: &'static str,
        /// Smallest allowed value.
        min: String,
        /// Value supplied.
        value: String,
    },

    /// A duration or count must be strictly positive.
    #[error("{field} must be positive, got {value}")]
    MustBePositive {
        /// Field name.
        field: &'static str,
        /// Value supplied.
        value: String,
    },

    /// A required field is missing or empty.
    #[error("{field} is required")]
    Missing {
        /// Field name.
        field: &'static str,
    },

    /// A field has a malformed value.
    #[error("{field} is invalid: {reason}")]
    Invalid {
        /// Field name.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}
