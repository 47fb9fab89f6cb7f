//! The authenticated (or anonymous) caller, reduced to its claims.

use idp_storage::entities::Claim;

/// A caller described by the claims its token carried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimsPrincipal {
    claims: Vec<Claim>,
}

impl ClaimsPrincipal {
    /// Creates a principal holding `claims`.
    pub fn new(claims: impl IntoIterator<Item = Claim>) -> Self {
        Self { claims: claims.into_iter().collect() }
    }

    /// A principal without any claims.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Returns the principal's claims.
    #[must_use]
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// Returns `true` if some claim has exactly this type, value and issuer.
    ///
    /// Comparison is case-sensitive on all three parts.
    #[must_use]
    pub fn has_claim(&self, claim_type: &str, value: &str, issuer: &str) -> bool {
        self.claims.iter().any(|claim| claim.matches(claim_type, value, issuer))
    }
}

impl FromIterator<Claim> for ClaimsPrincipal {
    fn from_iter<I: IntoIterator<Item = Claim>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_on_type_value_and_issuer() {
        let principal: ClaimsPrincipal =
            [Claim::issued_by("scope", "idp.clients.register", "https://idp.example")]
                .into_iter()
                .collect();

        assert!(principal.has_claim("scope", "idp.clients.register", "https://idp.example"));
        assert!(!principal.has_claim("scope", "idp.clients.register", "https://evil.example"));
        assert!(!principal.has_claim("scope", "openid", "https://idp.example"));
        assert!(!principal.has_claim("group", "idp.clients.register", "https://idp.example"));
        assert!(!principal.has_claim("Scope", "idp.clients.register", "https://idp.example"));
    }

    #[test]
    fn anonymous_has_no_claims() {
        let principal = ClaimsPrincipal::anonymous();
        assert!(principal.claims().is_empty());
        assert!(!principal.has_claim("scope", "openid", "LOCAL AUTHORITY"));
    }
}
