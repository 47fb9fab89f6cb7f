//! Storage-agnostic document persistence for the identity backend.
//!
//! This crate provides the typed [`DocumentStore`] contract that client,
//! resource, grant and user lookups are built on, the byte-level
//! [`StorageBackend`] trait that concrete backends implement, an audit
//! decorator, and the resilience-guarded bootstrap sequence that provisions
//! a backend on first run.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │   Protocol engine lookups       │  Registration gate        │
//! │   (ClientLookup, GrantStore...) │  (count("client:"))       │
//! ├─────────────────────────────────────────────────────────────┤
//! │            AuditedDocumentStore (optional)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │            DocumentStore  ←  TypedStore<B, Codec>           │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  StorageBackend trait                       │
//! │   (get, get_many, get_by_prefix, count, add, update, delete)│
//! ├──────────────┬──────────────────────────────────────────────┤
//! │ MemoryBackend│      CouchDbBackend (idp-storage-couchdb)    │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use idp_storage::{DocumentStore, MemoryBackend, TypedStore, entities::Client};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = TypedStore::new(MemoryBackend::new());
//!
//!     store.add("my-app", &Client::builder().client_id("my-app").build()).await?;
//!     assert_eq!(store.count("client:").await?, 1);
//!
//!     let client: Option<Client> = store.get("my-app").await?;
//!     assert!(client.is_some());
//!     Ok(())
//! }
//! ```
//!
//! # Available Backends
//!
//! | Backend | Use Case | Persistence |
//! |---------|----------|-------------|
//! | [`MemoryBackend`] | Testing, non-durable deployments | No |
//! | `CouchDbBackend` (in `idp-storage-couchdb`) | Production | Yes |
//!
//! # Implementing a Backend
//!
//! 1. Implement the [`StorageBackend`] trait
//! 2. Implement [`Provisioner`](bootstrap::Provisioner) for first-run setup
//! 3. Map backend-specific errors to [`StorageError`]
//! 4. Run the [`conformance`] suite against `TypedStore<YourBackend>`
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module (entity factories, recording audit sink, flaky
//!   provisioner, assertion macros) and the `conformance` suite. Enable this in
//!   `[dev-dependencies]` for integration tests.

#![deny(unsafe_code)]

pub mod audit;
pub mod backend;
pub mod bootstrap;
pub mod circuit_breaker;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod conformance;
pub mod document;
pub mod entities;
pub mod error;
pub mod lookups;
pub mod memory;
pub mod retry;
pub mod store;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;
pub mod types;

// Re-export primary types at crate root for convenience
pub use audit::AuditedDocumentStore;
pub use backend::StorageBackend;
pub use bootstrap::{BootstrapConfig, BootstrapError, BootstrapReport, Bootstrapper, Provisioner};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use document::{
    API_RESOURCE_PREFIX, CLIENT_PREFIX, Codec, Document, DocumentKey, IDENTITY_RESOURCE_PREFIX,
    JsonCodec, KEY_SEPARATOR, PERSISTED_GRANT_PREFIX, USER_PREFIX,
};
pub use error::{BoxError, ConfigError, StorageError, StorageResult};
pub use lookups::{ClientLookup, DocumentLookups, GrantStore, ResourceLookup, Resources};
pub use memory::MemoryBackend;
pub use retry::RetryConfig;
pub use store::{DocumentStore, TypedStore};
pub use types::KeyValue;
