//! Audit events and the sinks that receive them.
//!
//! ```no_run
//! use idp_storage::audit::{AuditAction, AuditEvent, AuditSink, TracingAuditSink};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let event = AuditEvent::builder()
//!     .action(AuditAction::Created)
//!     .entity_type("client")
//!     .document_id("my-app")
//!     .user("admin@example.com")
//!     .build();
//! TracingAuditSink.persist(&event).await.unwrap();
//! # });
//! ```

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::error::BoxError;

/// Mutation recorded by an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A document was added.
    Created,
    /// A document was replaced.
    Updated,
    /// A document was deleted.
    Deleted,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// Immutable record of a single document mutation.
///
/// `snapshot` is present for creates and updates and always holds the
/// obfuscated copy of the entity, never the stored value.
#[derive(Debug, Clone, PartialEq, Serialize, bon::Builder)]
pub struct AuditEvent {
    /// When the mutation completed (defaults to now).
    #[builder(default = Utc::now())]
    pub timestamp: DateTime<Utc>,
    /// The mutation performed.
    pub action: AuditAction,
    /// Type tag of the affected document.
    #[builder(into)]
    pub entity_type: String,
    /// Caller-supplied id of the affected document.
    #[builder(into)]
    pub document_id: String,
    /// Acting user.
    #[builder(into)]
    pub user: Option<String>,
    /// Acting OAuth client.
    #[builder(into)]
    pub client: Option<String>,
    /// Acting subject.
    #[builder(into)]
    pub subject: Option<String>,
    /// Obfuscated entity snapshot.
    pub snapshot: Option<serde_json::Value>,
}

/// Failure reported by an [`AuditSink`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuditSinkError {
    /// The sink could not record the event.
    #[error("Audit sink failed: {message}")]
    Failed {
        /// Description of the failure.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },
}

impl AuditSinkError {
    /// Creates a new `Failed` error with the given message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed { message: message.into(), source: None }
    }
}

/// Destination for audit events.
///
/// The decorated store logs a returned error and carries on; a sink can
/// never fail the write it describes.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Records an audit event.
    async fn persist(&self, event: &AuditEvent) -> Result<(), AuditSinkError>;
}

#[async_trait]
impl<K: AuditSink + ?Sized> AuditSink for std::sync::Arc<K> {
    async fn persist(&self, event: &AuditEvent) -> Result<(), AuditSinkError> {
        (**self).persist(event).await
    }
}

/// Audit sink that emits structured `tracing` events at INFO.
///
/// Field mapping:
/// - `audit.timestamp`: RFC 3339 timestamp
/// - `audit.action`: `created`, `updated` or `deleted`
/// - `audit.entity_type`, `audit.document_id`: what was affected
/// - `audit.user`, `audit.client`, `audit.subject`: who did it
/// - `audit.snapshot`: the obfuscated entity as JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn persist(&self, event: &AuditEvent) -> Result<(), AuditSinkError> {
        let snapshot = event.snapshot.as_ref().map(ToString::to_string).unwrap_or_default();
        tracing::info!(
            audit.timestamp = %event.timestamp.to_rfc3339(),
            audit.action = %event.action,
            audit.entity_type = %event.entity_type,
            audit.document_id = %event.document_id,
            audit.user = event.user.as_deref().unwrap_or(""),
            audit.client = event.client.as_deref().unwrap_or(""),
            audit.subject = event.subject.as_deref().unwrap_or(""),
            audit.snapshot = %snapshot,
            "audit_event"
        );
        Ok(())
    }
}

/// Audit sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn persist(&self, _event: &AuditEvent) -> Result<(), AuditSinkError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::{
        io::Write,
        sync::{Arc, Mutex},
    };

    use tracing_subscriber::fmt::MakeWriter;

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn event() -> AuditEvent {
        AuditEvent::builder()
            .action(AuditAction::Deleted)
            .entity_type("client")
            .document_id("my-app")
            .user("alice")
            .build()
    }

    #[test]
    fn action_display() {
        assert_eq!(AuditAction::Created.to_string(), "created");
        assert_eq!(AuditAction::Updated.to_string(), "updated");
        assert_eq!(AuditAction::Deleted.to_string(), "deleted");
    }

    #[test]
    fn builder_defaults() {
        let event = event();
        assert!(event.client.is_none());
        assert!(event.snapshot.is_none());
        assert!(event.timestamp <= Utc::now());
    }

    #[tokio::test]
    async fn tracing_sink_emits_structured_fields() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        TracingAuditSink.persist(&event()).await.unwrap();

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("audit_event"));
        assert!(output.contains("audit.action=deleted"));
        assert!(output.contains("audit.document_id=my-app"));
    }

    #[tokio::test]
    async fn noop_sink_accepts_everything() {
        assert!(NoopAuditSink.persist(&event()).await.is_ok());
    }
}
