//! # Identity Backend Runtime
//!
//! Startup wiring for the document store.
//!
//! At process start, [`open_store`] reads [`StorageSettings`], builds the
//! selected backend (memory or CouchDB), optionally wraps it with the audit
//! decorator, and runs the bootstrapper once. The resulting [`Storage`]
//! hands out the shared [`Store`] and, when a registration policy is
//! configured, the [`RegistrationGate`](idp_authz::RegistrationGate).
//!
//! ```
//! use idp_runtime::{StorageSettings, open_store};
//! use idp_storage::{DocumentStore, IDENTITY_RESOURCE_PREFIX};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let storage = open_store(StorageSettings::memory()).await.unwrap();
//! assert_eq!(storage.report().resources_seeded, 3);
//! assert_eq!(storage.store().count(IDENTITY_RESOURCE_PREFIX).await.unwrap(), 3);
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod open;
mod settings;
mod store;
pub mod telemetry;

pub use error::RuntimeError;
pub use open::{Storage, open_store, open_store_with_sink};
pub use settings::{Backend, StorageSettings};
pub use store::{AuditedStore, PlainStore, SharedBackend, Store};
