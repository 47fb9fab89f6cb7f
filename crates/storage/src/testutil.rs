//! Shared test utilities for document store testing.
//!
//! This module provides entity factories, audit sinks that record or reject
//! events, a provisioner with scripted failures, and assertion macros for
//! [`StorageResult`] values. It is feature-gated behind `testutil` to keep
//! it out of production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! idp-storage = { path = "../storage", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use idp_storage::testutil::{RecordingAuditSink, client, grant};
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU32, Ordering},
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    audit::{AuditEvent, AuditSink, AuditSinkError},
    bootstrap::{DesignOutcome, Provisioner},
    entities::{ApiResource, Client, PersistedGrant, Secret, User},
    error::{StorageError, StorageResult},
};

/// An enabled client named after its id.
#[must_use]
pub fn client(id: &str) -> Client {
    Client::builder()
        .client_id(id)
        .client_name(format!("Client {id}"))
        .allowed_grant_types(vec!["client_credentials".to_owned()])
        .allowed_scopes(vec!["openid".to_owned()])
        .build()
}

/// A client carrying the given shared secrets.
#[must_use]
pub fn client_with_secrets(id: &str, secrets: &[&str]) -> Client {
    let mut client = client(id);
    client.client_secrets = secrets.iter().map(|s| Secret::shared(*s)).collect();
    client
}

/// An enabled API resource exposing `scopes`.
#[must_use]
pub fn api_resource(name: &str, scopes: &[&str]) -> ApiResource {
    ApiResource::builder()
        .name(name)
        .scopes(scopes.iter().map(|s| (*s).to_owned()).collect())
        .build()
}

/// A refresh-token grant.
#[must_use]
pub fn grant(key: &str, subject_id: &str, client_id: &str) -> PersistedGrant {
    PersistedGrant::builder()
        .key(key)
        .grant_type("refresh_token")
        .subject_id(subject_id)
        .client_id(client_id)
        .data(format!("{{\"grant\":\"{key}\"}}"))
        .build()
}

/// An active user whose username equals the subject id.
#[must_use]
pub fn user(subject_id: &str) -> User {
    User::builder().subject_id(subject_id).username(subject_id).build()
}

/// Audit sink that keeps every event for assertions.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded event, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Returns the most recent event.
    #[must_use]
    pub fn last_event(&self) -> Option<AuditEvent> {
        self.events.lock().last().cloned()
    }

    /// Forgets every recorded event.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn persist(&self, event: &AuditEvent) -> Result<(), AuditSinkError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Audit sink that rejects every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingAuditSink;

#[async_trait]
impl AuditSink for FailingAuditSink {
    async fn persist(&self, _event: &AuditEvent) -> Result<(), AuditSinkError> {
        Err(AuditSinkError::failed("sink offline"))
    }
}

#[derive(Debug, Default)]
struct FlakyState {
    failures_remaining: AtomicU32,
    duplicates: bool,
    database_exists: AtomicBool,
    design_written: AtomicBool,
    database_calls: AtomicU32,
    security_calls: AtomicU32,
    design_calls: AtomicU32,
}

/// Provisioner whose `ensure_database` fails a scripted number of times.
///
/// Clones share counters, so a test can keep one handle and give another to
/// the bootstrapper.
#[derive(Debug, Clone, Default)]
pub struct FlakyProvisioner {
    state: Arc<FlakyState>,
}

impl FlakyProvisioner {
    /// Fails the first `failures` database calls with `Unavailable`.
    #[must_use]
    pub fn failing(failures: u32) -> Self {
        Self {
            state: Arc::new(FlakyState {
                failures_remaining: AtomicU32::new(failures),
                ..FlakyState::default()
            }),
        }
    }

    /// Reports every creation as a duplicate (`AlreadyExists`).
    #[must_use]
    pub fn reporting_duplicates() -> Self {
        Self { state: Arc::new(FlakyState { duplicates: true, ..FlakyState::default() }) }
    }

    /// Number of `ensure_database` calls that reached the provisioner.
    #[must_use]
    pub fn database_calls(&self) -> u32 {
        self.state.database_calls.load(Ordering::SeqCst)
    }

    /// Number of `ensure_security` calls that reached the provisioner.
    #[must_use]
    pub fn security_calls(&self) -> u32 {
        self.state.security_calls.load(Ordering::SeqCst)
    }

    /// Number of `ensure_design_documents` calls that reached the provisioner.
    #[must_use]
    pub fn design_calls(&self) -> u32 {
        self.state.design_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provisioner for FlakyProvisioner {
    async fn ensure_database(&self) -> StorageResult<bool> {
        self.state.database_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .state
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StorageError::unavailable("connection refused"));
        }
        if self.state.duplicates {
            return Err(StorageError::already_exists("idp"));
        }
        Ok(!self.state.database_exists.swap(true, Ordering::SeqCst))
    }

    async fn ensure_security(&self, _service_account: &str) -> StorageResult<()> {
        self.state.security_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ensure_design_documents(&self) -> StorageResult<DesignOutcome> {
        self.state.design_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.duplicates {
            return Err(StorageError::already_exists("_design/counts"));
        }
        if self.state.design_written.swap(true, Ordering::SeqCst) {
            Ok(DesignOutcome::Unchanged)
        } else {
            Ok(DesignOutcome::Created)
        }
    }
}

/// Assert that a [`StorageResult`] is a [`StorageError::AlreadyExists`].
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use idp_storage::{StorageError, StorageResult, assert_already_exists};
///
/// let result: StorageResult<()> = Err(StorageError::already_exists("client:a"));
/// assert_already_exists!(result);
/// ```
#[macro_export]
macro_rules! assert_already_exists {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::AlreadyExists { .. })),
            "expected StorageError::AlreadyExists, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::AlreadyExists { .. })),
            "{}: expected StorageError::AlreadyExists, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is a [`StorageError::NotFound`].
#[macro_export]
macro_rules! assert_not_found {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::NotFound { .. })),
            "expected StorageError::NotFound, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::NotFound { .. })),
            "{}: expected StorageError::NotFound, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is a [`StorageError::Conflict`].
#[macro_export]
macro_rules! assert_conflict {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::Conflict { .. })),
            "expected StorageError::Conflict, got: {:?}",
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is a [`StorageError::CircuitOpen`].
#[macro_export]
macro_rules! assert_circuit_open {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::CircuitOpen { .. })),
            "expected StorageError::CircuitOpen, got: {:?}",
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is `Ok`.
///
/// Returns the inner value on success, panics with a descriptive message
/// on failure.
#[macro_export]
macro_rules! assert_storage_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got StorageError: {e:?}"),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("{}: expected Ok, got StorageError: {e:?}", $msg),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    #[test]
    fn factories_produce_valid_documents() {
        assert!(client("a").enabled);
        assert_eq!(client_with_secrets("a", &["x", "y"]).client_secrets.len(), 2);
        assert_eq!(api_resource("orders", &["orders.read"]).scopes, vec!["orders.read"]);
        assert_eq!(grant("g", "alice", "app").subject_id, "alice");
        assert_eq!(<User as Document>::TYPE_TAG, "user");
        assert!(user("alice").is_active);
    }

    #[tokio::test]
    async fn flaky_provisioner_fails_then_recovers() {
        let provisioner = FlakyProvisioner::failing(2);
        assert!(provisioner.ensure_database().await.is_err());
        assert!(provisioner.ensure_database().await.is_err());
        assert_storage_ok!(provisioner.ensure_database().await);
        assert!(!assert_storage_ok!(provisioner.ensure_database().await));
        assert_eq!(provisioner.database_calls(), 4);
    }

    #[tokio::test]
    async fn duplicate_mode_reports_already_exists() {
        let provisioner = FlakyProvisioner::reporting_duplicates();
        let database = provisioner.ensure_database().await;
        assert_already_exists!(database);
        let design = provisioner.ensure_design_documents().await;
        assert_already_exists!(design);
    }

    #[test]
    fn assertion_macros() {
        let result: StorageResult<()> = Err(StorageError::not_found("client:x"));
        assert_not_found!(result);
        let result: StorageResult<()> = Err(StorageError::conflict("client:x"));
        assert_conflict!(result);
        let result: StorageResult<()> =
            Err(StorageError::circuit_open(std::time::Duration::from_secs(1)));
        assert_circuit_open!(result);
    }
}
