//! Domain entities persisted through the document store.
//!
//! Each entity implements [`Document`](crate::Document) with its own type
//! tag. Field names are serialized in camelCase so documents written by other
//! services of the identity backend read back unchanged.

mod claim;
mod client;
mod grant;
mod resource;
mod secret;
mod user;

pub use claim::{Claim, ClaimValueType, LOCAL_AUTHORITY};
pub use client::Client;
pub use grant::PersistedGrant;
pub use resource::{ApiResource, IdentityResource};
pub use secret::{SHARED_SECRET, Secret};
pub use user::User;
