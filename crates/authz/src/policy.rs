//! Registration policy configuration.
//!
//! ```json
//! {
//!   "threshold": 5,
//!   "authority": "https://idp.example",
//!   "admin_group": { "claim_type": "group", "value": "registration-admins" },
//!   "registration_scope": { "claim_type": "scope", "value": "idp.clients.register" }
//! }
//! ```
//!
//! Only `authority` is required.

use idp_storage::ConfigError;
use serde::{Deserialize, Serialize};

/// Default number of clients that may self-register.
pub const DEFAULT_REGISTRATION_THRESHOLD: u64 = 5;

/// A claim type and value; the issuer comes from the policy's authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClaimMatch {
    /// Claim type, e.g. `scope`.
    pub claim_type: String,
    /// Expected claim value.
    pub value: String,
}

impl ClaimMatch {
    /// Creates a claim matcher.
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self { claim_type: claim_type.into(), value: value.into() }
    }

    /// Group membership that grants registration rights.
    #[must_use]
    pub fn default_admin_group() -> Self {
        Self::new("group", "registration-admins")
    }

    /// Scope that grants registration rights.
    #[must_use]
    pub fn default_registration_scope() -> Self {
        Self::new("scope", "idp.clients.register")
    }

    fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        if self.claim_type.is_empty() || self.value.is_empty() {
            return Err(ConfigError::Invalid {
                field,
                reason: "claim type and value must be non-empty".into(),
            });
        }
        Ok(())
    }
}

/// Who may register clients once the store holds `threshold` of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrationPolicy {
    #[serde(default = "default_threshold")]
    threshold: u64,
    authority: String,
    #[serde(default = "ClaimMatch::default_admin_group")]
    admin_group: ClaimMatch,
    #[serde(default = "ClaimMatch::default_registration_scope")]
    registration_scope: ClaimMatch,
}

fn default_threshold() -> u64 {
    DEFAULT_REGISTRATION_THRESHOLD
}

#[bon::bon]
impl RegistrationPolicy {
    /// Creates a registration policy.
    ///
    /// A threshold of zero disables anonymous registration entirely.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `authority` or a claim matcher is empty.
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_REGISTRATION_THRESHOLD)] threshold: u64,
        #[builder(into)] authority: String,
        #[builder(default = ClaimMatch::default_admin_group())] admin_group: ClaimMatch,
        #[builder(default = ClaimMatch::default_registration_scope())]
        registration_scope: ClaimMatch,
    ) -> Result<Self, ConfigError> {
        let policy = Self { threshold, authority, admin_group, registration_scope };
        policy.validate()?;
        Ok(policy)
    }

    /// Checks the invariants enforced by the builder.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.authority.is_empty() {
            return Err(ConfigError::Missing { field: "authority" });
        }
        self.admin_group.validate("admin_group")?;
        self.registration_scope.validate("registration_scope")
    }

    /// Client count below which anyone may register.
    #[must_use]
    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Issuer that the admin-group and scope claims must carry.
    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Returns the admin group matcher.
    #[must_use]
    pub fn admin_group(&self) -> &ClaimMatch {
        &self.admin_group
    }

    /// Returns the registration scope matcher.
    #[must_use]
    pub fn registration_scope(&self) -> &ClaimMatch {
        &self.registration_scope
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn builder_applies_defaults() {
        let policy =
            RegistrationPolicy::builder().authority("https://idp.example").build().unwrap();
        assert_eq!(policy.threshold(), 5);
        assert_eq!(policy.admin_group(), &ClaimMatch::new("group", "registration-admins"));
        assert_eq!(policy.registration_scope(), &ClaimMatch::new("scope", "idp.clients.register"));
    }

    #[test]
    fn empty_authority_is_rejected() {
        let err = RegistrationPolicy::builder().authority("").build().unwrap_err();
        assert_eq!(err, ConfigError::Missing { field: "authority" });
    }

    #[test]
    fn empty_claim_match_is_rejected() {
        let err = RegistrationPolicy::builder()
            .authority("https://idp.example")
            .registration_scope(ClaimMatch::new("scope", ""))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "registration_scope", .. }));
    }

    #[test]
    fn deserializes_with_defaults() {
        let policy: RegistrationPolicy =
            serde_json::from_str(r#"{"authority": "https://idp.example", "threshold": 2}"#)
                .unwrap();
        assert_eq!(policy.threshold(), 2);
        assert_eq!(policy.admin_group(), &ClaimMatch::default_admin_group());
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_json::from_str::<RegistrationPolicy>(
            r#"{"authority": "https://idp.example", "treshold": 2}"#,
        );
        assert!(result.is_err());
    }
}
