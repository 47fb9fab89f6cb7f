//! # Identity Backend Authorization
//!
//! Authorization decisions that read through the document store.
//!
//! This crate provides:
//! - **[`ClaimsPrincipal`]**: the caller's claims, matched by type, value and issuer
//! - **[`RegistrationPolicy`]**: threshold and trusted-authority settings
//! - **[`RegistrationGate`]**: decides whether a caller may register a new client
//!
//! ## Example
//!
//! ```
//! use idp_authz::{ClaimsPrincipal, RegistrationDecision, RegistrationGate, RegistrationPolicy};
//! use idp_storage::{MemoryBackend, TypedStore};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let store = TypedStore::new(MemoryBackend::new());
//! let policy = RegistrationPolicy::builder().authority("https://idp.example").build().unwrap();
//! let gate = RegistrationGate::new(store, policy);
//!
//! // An empty store admits anyone.
//! let decision = gate.decide(&ClaimsPrincipal::anonymous()).await.unwrap();
//! assert!(decision.is_allowed());
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Registration-threshold gate.
pub mod gate;
/// Registration policy configuration.
pub mod policy;
/// Caller identity as a set of claims.
pub mod principal;

pub use gate::{AllowReason, RegistrationDecision, RegistrationGate};
pub use policy::{ClaimMatch, DEFAULT_REGISTRATION_THRESHOLD, RegistrationPolicy};
pub use principal::ClaimsPrincipal;
