use serde::{Deserialize, Serialize};

use super::Claim;
use crate::document::Document;

/// A local user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(rename_all = "camelCase")]
#[builder(on(String, into))]
pub struct User {
    /// Stable subject identifier; also the document id.
    pub subject_id: String,
    /// Login name.
    pub username: String,
    /// Inactive users cannot sign in.
    #[serde(default = "active")]
    #[builder(default = true)]
    pub is_active: bool,
    /// Claims describing the user.
    #[serde(default)]
    #[builder(default)]
    pub claims: Vec<Claim>,
}

impl Document for User {
    const TYPE_TAG: &'static str = "user";
}

fn active() -> bool {
    true
}
