//! CouchDB-backed implementation of [`StorageBackend`](idp_storage::StorageBackend).
//!
//! This crate provides [`CouchDbBackend`], the durable backend for the
//! identity document store. It talks to CouchDB over HTTP, uses document
//! revisions for optimistic updates, and implements
//! [`Provisioner`](idp_storage::Provisioner) so the bootstrapper can create
//! the database, its security document and the count views on first run.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │            TypedStore<CouchDbBackend> / Bootstrapper        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     CouchDbBackend                          │
//! │   (StorageBackend + Provisioner, envelope + revisions)      │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   reqwest::Client                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      CouchDB                                │
//! │   /{db}/{id} │ /{db}/_all_docs │ /{db}/_design/counts       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Operation Mapping
//!
//! | StorageBackend | CouchDB |
//! | -------------- | ------- |
//! | `get(key)` | `GET /{db}/{key}` (404 → `None`) |
//! | `get_many(keys)` | `POST /{db}/_all_docs?include_docs=true` with `{"keys": [...]}` |
//! | `get_by_prefix(p)` | `GET /{db}/_all_docs?startkey="p"&endkey="p\u{10ffff}"&include_docs=true` |
//! | `count(p)` | `GET /{db}/_design/counts/_view/{tag}?reduce=true`, else an `_all_docs` range |
//! | `add(key, v)` | `PUT /{db}/{key}` without `_rev` (409 → `AlreadyExists`) |
//! | `update(key, v)` | `GET` for `_rev` (404 → `NotFound`), `PUT` with `_rev` (409 → `Conflict`) |
//! | `delete(key)` | `GET` for `_rev` (404 → no-op), `DELETE ?rev=` |
//! | `health_check()` | `GET /` |
//!
//! # Error Mapping
//!
//! Transport failures become [`StorageError::Unavailable`](idp_storage::StorageError) or
//! `Timeout`; 5xx responses become `Unavailable`. Both are transient, so the
//! bootstrapper's retry loop and circuit breakers see them as failures.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod config;
pub mod design;
mod error;
mod provision;

/// Shared test utilities for CouchDB backend testing.
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;

/// CouchDB-backed storage backend.
pub use backend::CouchDbBackend;
/// Configuration type and default constants for the CouchDB backend.
pub use config::{CouchDbConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_TIMEOUT};
/// CouchDB-specific error types and result alias.
pub use error::{CouchDbError, Result};
/// Configuration validation error type.
pub use idp_storage::ConfigError;
