//! Error types for the CouchDB storage backend.
//!
//! This module maps HTTP transport failures and CouchDB status responses
//! onto the generic [`StorageError`](idp_storage::StorageError) type.

use idp_storage::{ConfigError, StorageError};
use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias for CouchDB storage operations.
pub type Result<T> = std::result::Result<T, CouchDbError>;

/// Errors specific to the CouchDB storage backend.
#[derive(Debug, Error)]
pub enum CouchDbError {
    /// The request never produced a response (connect failure, timeout, TLS).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with an unexpected status.
    #[error("CouchDB returned {status} for {target}: {reason}")]
    Status {
        /// HTTP status code.
        status: StatusCode,
        /// Document id or endpoint the request addressed.
        target: String,
        /// `error: reason` from the response body, if any.
        reason: String,
    },

    /// A response body did not have the expected shape.
    #[error("Malformed CouchDB response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A request URL could not be formed.
    #[error("Invalid request URL: {0}")]
    Url(String),
}

impl CouchDbError {
    /// Creates a new `Status` error.
    #[must_use]
    pub fn status(
        status: StatusCode,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Status { status, target: target.into(), reason: reason.into() }
    }
}

impl From<CouchDbError> for StorageError {
    fn from(err: CouchDbError) -> Self {
        match err {
            CouchDbError::Transport(source) if source.is_timeout() => {
                tracing::warn!(error = %source, "CouchDB request timed out");
                StorageError::timeout()
            },
            CouchDbError::Transport(source) if source.is_decode() => {
                StorageError::serialization_with_source("Malformed CouchDB response", source)
            },
            CouchDbError::Transport(source) => {
                StorageError::unavailable_with_source("CouchDB unreachable", source)
            },
            CouchDbError::Status { status, target, reason } => match status {
                StatusCode::NOT_FOUND => StorageError::not_found(target),
                StatusCode::CONFLICT => StorageError::conflict(target),
                StatusCode::PRECONDITION_FAILED => StorageError::already_exists(target),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    StorageError::internal(format!("Auth error ({status}) on {target}: {reason}"))
                },
                StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                    StorageError::timeout()
                },
                s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
                    StorageError::unavailable(format!("CouchDB {status} on {target}: {reason}"))
                },
                _ => StorageError::internal(format!("CouchDB {status} on {target}: {reason}")),
            },
            err @ CouchDbError::Decode(_) => {
                StorageError::serialization_with_source("Malformed CouchDB response", err)
            },
            CouchDbError::Config(source) => StorageError::internal_with_source("Config", source),
            CouchDbError::Url(message) => StorageError::internal(format!("URL: {message}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn status(code: StatusCode) -> StorageError {
        CouchDbError::status(code, "client:a", "error: reason").into()
    }

    #[test]
    fn not_found_keeps_target() {
        let err = status(StatusCode::NOT_FOUND);
        assert!(matches!(err, StorageError::NotFound { ref key } if key == "client:a"));
    }

    #[test]
    fn conflict_keeps_target() {
        let err = status(StatusCode::CONFLICT);
        assert!(matches!(err, StorageError::Conflict { ref key } if key == "client:a"));
    }

    #[test]
    fn precondition_failed_means_already_exists() {
        let err = status(StatusCode::PRECONDITION_FAILED);
        assert!(matches!(err, StorageError::AlreadyExists { .. }));
    }

    #[rstest]
    #[case(StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(StatusCode::BAD_GATEWAY)]
    #[case(StatusCode::SERVICE_UNAVAILABLE)]
    #[case(StatusCode::TOO_MANY_REQUESTS)]
    fn server_errors_are_unavailable(#[case] code: StatusCode) {
        let err = status(code);
        assert!(err.is_transient(), "{code} should be transient: {err:?}");
        assert!(matches!(err, StorageError::Unavailable { .. }));
    }

    #[rstest]
    #[case(StatusCode::REQUEST_TIMEOUT)]
    #[case(StatusCode::GATEWAY_TIMEOUT)]
    fn timeouts_map_to_timeout(#[case] code: StatusCode) {
        assert!(matches!(status(code), StorageError::Timeout));
    }

    #[rstest]
    #[case(StatusCode::UNAUTHORIZED)]
    #[case(StatusCode::FORBIDDEN)]
    #[case(StatusCode::BAD_REQUEST)]
    fn client_errors_are_internal(#[case] code: StatusCode) {
        let err = status(code);
        assert!(!err.is_transient());
        assert!(matches!(err, StorageError::Internal { .. }));
    }

    #[test]
    fn decode_error_is_serialization() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: StorageError = CouchDbError::from(source).into();
        assert!(matches!(err, StorageError::Serialization { .. }));
    }

    #[test]
    fn config_error_is_internal() {
        let err: StorageError = CouchDbError::from(ConfigError::Missing { field: "url" }).into();
        assert!(matches!(err, StorageError::Internal { .. }));
    }

    #[test]
    fn error_display() {
        let err = CouchDbError::status(
            StatusCode::CONFLICT,
            "client:a",
            "conflict: Document update conflict.",
        );
        assert_eq!(
            err.to_string(),
            "CouchDB returned 409 Conflict for client:a: conflict: Document update conflict."
        );
    }
}
