//! Registration-threshold gate.
//!
//! Self-service client registration stays open while the store holds fewer
//! clients than the policy threshold. Past that point only callers carrying
//! the admin group or the registration scope, issued by the trusted
//! authority, may register.
//!
//! The count and the caller's later `add` are separate store calls, so a
//! burst of concurrent registrations can overshoot the threshold slightly.

use std::fmt;

use idp_storage::{CLIENT_PREFIX, DocumentStore, StorageError};

use crate::{
    policy::{ClaimMatch, RegistrationPolicy},
    principal::ClaimsPrincipal,
};

/// Why a registration was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    /// Fewer clients than the threshold are registered.
    BelowThreshold,
    /// The caller is in the administrative group.
    AdminGroup,
    /// The caller holds the registration scope.
    RegistrationScope,
}

impl fmt::Display for AllowReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BelowThreshold => write!(f, "below_threshold"),
            Self::AdminGroup => write!(f, "admin_group"),
            Self::RegistrationScope => write!(f, "registration_scope"),
        }
    }
}

/// Outcome of [`RegistrationGate::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationDecision {
    /// The caller may register a client.
    Allow(AllowReason),
    /// The caller may not.
    Deny,
}

impl RegistrationDecision {
    /// Returns `true` for [`RegistrationDecision::Allow`].
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }
}

/// Decides whether a caller may register a new OAuth client.
///
/// The gate holds no state besides the store handle and the policy; share
/// one instance across requests.
pub struct RegistrationGate<S> {
    store: S,
    policy: RegistrationPolicy,
}

impl<S> fmt::Debug for RegistrationGate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationGate").field("policy", &self.policy).finish_non_exhaustive()
    }
}

impl<S: DocumentStore> RegistrationGate<S> {
    /// Creates a gate reading client counts from `store`.
    pub fn new(store: S, policy: RegistrationPolicy) -> Self {
        Self { store, policy }
    }

    /// Returns the policy in effect.
    #[must_use]
    pub fn policy(&self) -> &RegistrationPolicy {
        &self.policy
    }

    /// Evaluates the gate for `principal`.
    ///
    /// Checks run in order and the first match wins: client count below the
    /// threshold, then admin group, then registration scope.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the client count cannot be read.
    pub async fn decide(
        &self,
        principal: &ClaimsPrincipal,
    ) -> Result<RegistrationDecision, StorageError> {
        let count = self.store.count(CLIENT_PREFIX).await?;
        let threshold = self.policy.threshold();
        let decision = self.evaluate(count, principal);
        match decision {
            RegistrationDecision::Allow(reason) => {
                tracing::debug!(count, threshold, %reason, "registration allowed");
            },
            RegistrationDecision::Deny => {
                tracing::debug!(count, threshold, "registration denied");
            },
        }
        Ok(decision)
    }

    fn evaluate(&self, count: u64, principal: &ClaimsPrincipal) -> RegistrationDecision {
        if count < self.policy.threshold() {
            return RegistrationDecision::Allow(AllowReason::BelowThreshold);
        }
        if self.holds(principal, self.policy.admin_group()) {
            return RegistrationDecision::Allow(AllowReason::AdminGroup);
        }
        if self.holds(principal, self.policy.registration_scope()) {
            return RegistrationDecision::Allow(AllowReason::RegistrationScope);
        }
        RegistrationDecision::Deny
    }

    fn holds(&self, principal: &ClaimsPrincipal, wanted: &ClaimMatch) -> bool {
        principal.has_claim(&wanted.claim_type, &wanted.value, self.policy.authority())
    }
}
