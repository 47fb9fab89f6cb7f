//! Audit trail for document mutations.
//!
//! [`AuditedDocumentStore`] wraps any [`DocumentStore`](crate::DocumentStore)
//! and hands an [`AuditEvent`] to an [`AuditSink`] after every successful
//! `add`, `update` and `delete`. Reads pass straight through.
//!
//! # Architecture
//!
//! - [`AuditSink`]: where events go. [`TracingAuditSink`] emits structured `tracing` events;
//!   [`NoopAuditSink`] drops them.
//! - [`ActorSource`]: who is acting. [`Actor`] is a fixed identity, [`TaskLocalActor`] reads the
//!   identity scoped around the current task.
//! - [`obfuscate`]: masks secret lists in entity snapshots before they leave the process.

pub mod actor;
pub mod event;
pub mod obfuscate;
pub mod store;

pub use actor::{Actor, ActorSource, TaskLocalActor};
pub use event::{
    AuditAction, AuditEvent, AuditSink, AuditSinkError, NoopAuditSink, TracingAuditSink,
};
pub use obfuscate::{OBFUSCATION_MARKER, obfuscated_snapshot};
pub use store::{AuditedDocumentStore, DEFAULT_DISPATCH_TIMEOUT};
