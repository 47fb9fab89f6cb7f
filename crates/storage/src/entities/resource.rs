use serde::{Deserialize, Serialize};

use super::Secret;
use crate::document::Document;

/// A protected API and the scopes it exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(rename_all = "camelCase")]
#[builder(on(String, into))]
pub struct ApiResource {
    /// Unique resource name; also the document id.
    pub name: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Disabled resources are invisible to the protocol engine.
    #[serde(default = "enabled")]
    #[builder(default = true)]
    pub enabled: bool,
    /// Secrets used by the API for token introspection.
    #[serde(default)]
    #[builder(default)]
    pub api_secrets: Vec<Secret>,
    /// Scopes belonging to this API.
    #[serde(default)]
    #[builder(default)]
    pub scopes: Vec<String>,
    /// Claim types included in access tokens for this API.
    #[serde(default)]
    #[builder(default)]
    pub user_claims: Vec<String>,
}

impl Document for ApiResource {
    const TYPE_TAG: &'static str = "apiresource";
    const SECRET_FIELDS: &'static [&'static str] = &["apiSecrets"];
}

/// A group of user claims requestable as an identity scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(rename_all = "camelCase")]
#[builder(on(String, into))]
pub struct IdentityResource {
    /// Scope name; also the document id.
    pub name: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Disabled resources are invisible to the protocol engine.
    #[serde(default = "enabled")]
    #[builder(default = true)]
    pub enabled: bool,
    /// Whether the user may deselect this scope on the consent screen.
    #[serde(default)]
    #[builder(default)]
    pub required: bool,
    /// Whether the consent screen emphasizes this scope.
    #[serde(default)]
    #[builder(default)]
    pub emphasize: bool,
    /// Whether the scope is advertised in the discovery document.
    #[serde(default = "enabled")]
    #[builder(default = true)]
    pub show_in_discovery_document: bool,
    /// Claim types released when this scope is granted.
    #[serde(default)]
    #[builder(default)]
    pub user_claims: Vec<String>,
}

impl Document for IdentityResource {
    const TYPE_TAG: &'static str = "identityresource";
}

impl IdentityResource {
    /// The mandatory `openid` scope.
    #[must_use]
    pub fn openid() -> Self {
        Self::builder()
            .name("openid")
            .display_name("Your user identifier")
            .required(true)
            .user_claims(vec!["sub".to_owned()])
            .build()
    }

    /// The standard `profile` scope.
    #[must_use]
    pub fn profile() -> Self {
        let claims = [
            "name",
            "family_name",
            "given_name",
            "middle_name",
            "nickname",
            "preferred_username",
            "profile",
            "picture",
            "website",
            "gender",
            "birthdate",
            "zoneinfo",
            "locale",
            "updated_at",
        ];
        Self::builder()
            .name("profile")
            .display_name("User profile")
            .description("Your user profile information (first name, last name, etc.)")
            .emphasize(true)
            .user_claims(claims.iter().map(|c| (*c).to_owned()).collect())
            .build()
    }

    /// The standard `email` scope.
    #[must_use]
    pub fn email() -> Self {
        Self::builder()
            .name("email")
            .display_name("Your email address")
            .emphasize(true)
            .user_claims(vec!["email".to_owned(), "email_verified".to_owned()])
            .build()
    }

    /// Identity resources every deployment starts with.
    #[must_use]
    pub fn well_known() -> Vec<Self> {
        vec![Self::openid(), Self::profile(), Self::email()]
    }
}

fn enabled() -> bool {
    true
}
