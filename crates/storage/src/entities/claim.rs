//! Security claims with an exact round-trip serialization.
//!
//! A claim is an issuer/type/value tuple. The general serializer used for
//! documents is free to reshape data, but claims must come back exactly as
//! written, including `issuer` and `original_issuer`. Claims are therefore
//! written with an explicit `"$type": "claim"` annotation and read through a
//! dedicated representation that restores the issuer defaults the same way
//! the claim constructor does.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Issuer assigned to claims that do not name one.
pub const LOCAL_AUTHORITY: &str = "LOCAL AUTHORITY";

/// Type annotation written into every serialized claim.
const CLAIM_TYPE_ANNOTATION: &str = "claim";

/// Well-known claim value types.
pub struct ClaimValueType;

impl ClaimValueType {
    /// Plain string value.
    pub const STRING: &'static str = "http://www.w3.org/2001/XMLSchema#string";
    /// Boolean value.
    pub const BOOLEAN: &'static str = "http://www.w3.org/2001/XMLSchema#boolean";
    /// JSON value.
    pub const JSON: &'static str = "json";
}

/// A single security claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "ClaimRepr", try_from = "ClaimRepr")]
pub struct Claim {
    /// Claim type, e.g. `scope` or `email`.
    pub claim_type: String,
    /// Claim value.
    pub value: String,
    /// Value type URI.
    pub value_type: String,
    /// Authority that issued the claim.
    pub issuer: String,
    /// Authority that originally issued the claim, if it was re-issued.
    pub original_issuer: String,
    /// Free-form properties attached to the claim.
    pub properties: BTreeMap<String, String>,
}

impl Claim {
    /// Creates a string claim issued by [`LOCAL_AUTHORITY`].
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self::issued_by(claim_type, value, LOCAL_AUTHORITY)
    }

    /// Creates a string claim issued by `issuer`.
    pub fn issued_by(
        claim_type: impl Into<String>,
        value: impl Into<String>,
        issuer: impl Into<String>,
    ) -> Self {
        let issuer = issuer.into();
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
            value_type: ClaimValueType::STRING.to_owned(),
            original_issuer: issuer.clone(),
            issuer,
            properties: BTreeMap::new(),
        }
    }

    /// Sets the original issuer.
    #[must_use]
    pub fn with_original_issuer(mut self, original_issuer: impl Into<String>) -> Self {
        self.original_issuer = original_issuer.into();
        self
    }

    /// Sets the value type.
    #[must_use]
    pub fn with_value_type(mut self, value_type: impl Into<String>) -> Self {
        self.value_type = value_type.into();
        self
    }

    /// Returns `true` if type, value and issuer all match.
    #[must_use]
    pub fn matches(&self, claim_type: &str, value: &str, issuer: &str) -> bool {
        self.claim_type == claim_type && self.value == value && self.issuer == issuer
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimRepr {
    #[serde(rename = "$type", default, skip_serializing_if = "Option::is_none")]
    annotation: Option<String>,
    #[serde(rename = "type")]
    claim_type: String,
    value: String,
    #[serde(default)]
    value_type: Option<String>,
    #[serde(default)]
    issuer: Option<String>,
    #[serde(default)]
    original_issuer: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    properties: BTreeMap<String, String>,
}

impl From<Claim> for ClaimRepr {
    fn from(claim: Claim) -> Self {
        Self {
            annotation: Some(CLAIM_TYPE_ANNOTATION.to_owned()),
            claim_type: claim.claim_type,
            value: claim.value,
            value_type: Some(claim.value_type),
            issuer: Some(claim.issuer),
            original_issuer: Some(claim.original_issuer),
            properties: claim.properties,
        }
    }
}

impl TryFrom<ClaimRepr> for Claim {
    type Error = String;

    fn try_from(repr: ClaimRepr) -> Result<Self, Self::Error> {
        if let Some(annotation) = repr.annotation.as_deref()
            && annotation != CLAIM_TYPE_ANNOTATION
        {
            return Err(format!("expected $type \"{CLAIM_TYPE_ANNOTATION}\", got \"{annotation}\""));
        }

        let issuer =
            repr.issuer.filter(|s| !s.is_empty()).unwrap_or_else(|| LOCAL_AUTHORITY.to_owned());
        let original_issuer =
            repr.original_issuer.filter(|s| !s.is_empty()).unwrap_or_else(|| issuer.clone());

        Ok(Self {
            claim_type: repr.claim_type,
            value: repr.value,
            value_type: repr.value_type.unwrap_or_else(|| ClaimValueType::STRING.to_owned()),
            issuer,
            original_issuer,
            properties: repr.properties,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn serialized_claim_carries_type_annotation() {
        let claim = Claim::issued_by("scope", "api", "https://idp.example.com");
        let value = serde_json::to_value(&claim).unwrap();
        assert_eq!(value["$type"], "claim");
        assert_eq!(value["type"], "scope");
        assert_eq!(value["issuer"], "https://idp.example.com");
        assert_eq!(value["originalIssuer"], "https://idp.example.com");
    }

    #[test]
    fn reissued_claim_round_trips_exactly() {
        let mut claim = Claim::issued_by("email", "a@example.com", "https://idp.example.com")
            .with_original_issuer("https://upstream.example.org")
            .with_value_type(ClaimValueType::JSON);
        claim.properties.insert("source".into(), "federation".into());

        let text = serde_json::to_string(&claim).unwrap();
        let back: Claim = serde_json::from_str(&text).unwrap();
        assert_eq!(back, claim);
    }

    #[test]
    fn missing_issuers_fall_back_like_the_constructor() {
        let back: Claim =
            serde_json::from_value(json!({"type": "role", "value": "admin"})).unwrap();
        assert_eq!(back, Claim::new("role", "admin"));

        let back: Claim = serde_json::from_value(
            json!({"type": "role", "value": "admin", "issuer": "https://idp"}),
        )
        .unwrap();
        assert_eq!(back.original_issuer, "https://idp");
    }

    #[test]
    fn foreign_type_annotation_is_rejected() {
        let result: Result<Claim, _> =
            serde_json::from_value(json!({"$type": "secret", "type": "role", "value": "admin"}));
        assert!(result.is_err());
    }

    #[test]
    fn matches_requires_issuer() {
        let claim = Claim::issued_by("scope", "register", "https://idp");
        assert!(claim.matches("scope", "register", "https://idp"));
        assert!(!claim.matches("scope", "register", "https://evil"));
    }
}
