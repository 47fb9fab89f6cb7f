use serde::{Deserialize, Serialize};

use super::{Claim, Secret};
use crate::document::Document;

/// A registered OAuth client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(rename_all = "camelCase")]
#[builder(on(String, into))]
pub struct Client {
    /// Unique client identifier; also the document id.
    pub client_id: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// Disabled clients are invisible to the protocol engine.
    #[serde(default = "enabled")]
    #[builder(default = true)]
    pub enabled: bool,
    /// Secrets used to authenticate the client.
    #[serde(default)]
    #[builder(default)]
    pub client_secrets: Vec<Secret>,
    /// Grant types the client may use.
    #[serde(default)]
    #[builder(default)]
    pub allowed_grant_types: Vec<String>,
    /// Allowed redirect URIs.
    #[serde(default)]
    #[builder(default)]
    pub redirect_uris: Vec<String>,
    /// Scopes the client may request.
    #[serde(default)]
    #[builder(default)]
    pub allowed_scopes: Vec<String>,
    /// Whether the consent screen is shown.
    #[serde(default)]
    #[builder(default)]
    pub require_consent: bool,
    /// Claims attached to tokens issued for this client.
    #[serde(default)]
    #[builder(default)]
    pub claims: Vec<Claim>,
}

impl Document for Client {
    const TYPE_TAG: &'static str = "client";
    const SECRET_FIELDS: &'static [&'static str] = &["clientSecrets"];
}

fn enabled() -> bool {
    true
}
