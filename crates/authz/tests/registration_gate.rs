//! Registration gate decisions against a live memory-backed store.

#![allow(clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use idp_authz::{
    AllowReason, ClaimsPrincipal, RegistrationDecision, RegistrationGate, RegistrationPolicy,
};
use idp_storage::{
    DocumentStore, KeyValue, MemoryBackend, StorageBackend, StorageError, StorageResult,
    TypedStore, entities::Claim, testutil,
};
use rstest::rstest;

const AUTHORITY: &str = "https://idp.example";
const UNTRUSTED: &str = "https://evil.example";

async fn store_with_clients(n: usize) -> TypedStore<MemoryBackend> {
    let store = TypedStore::new(MemoryBackend::new());
    for i in 0..n {
        let id = format!("client-{i}");
        store.add(&id, &testutil::client(&id)).await.expect("add client");
    }
    store
}

fn gate<S: DocumentStore>(store: S) -> RegistrationGate<S> {
    let policy = RegistrationPolicy::builder()
        .threshold(5)
        .authority(AUTHORITY)
        .build()
        .expect("valid policy");
    RegistrationGate::new(store, policy)
}

fn principal(claims: &[(&str, &str, &str)]) -> ClaimsPrincipal {
    claims
        .iter()
        .map(|(claim_type, value, issuer)| Claim::issued_by(*claim_type, *value, *issuer))
        .collect()
}

#[rstest]
#[case::empty_store(0, &[], RegistrationDecision::Allow(AllowReason::BelowThreshold))]
#[case::one_below_threshold(4, &[], RegistrationDecision::Allow(AllowReason::BelowThreshold))]
#[case::at_threshold_without_claims(5, &[], RegistrationDecision::Deny)]
#[case::trusted_scope(
    5,
    &[("scope", "idp.clients.register", AUTHORITY)],
    RegistrationDecision::Allow(AllowReason::RegistrationScope)
)]
#[case::untrusted_scope(
    5,
    &[("scope", "idp.clients.register", UNTRUSTED)],
    RegistrationDecision::Deny
)]
#[case::trusted_admin_group(
    7,
    &[("group", "registration-admins", AUTHORITY)],
    RegistrationDecision::Allow(AllowReason::AdminGroup)
)]
#[case::wrong_group(6, &[("group", "users", AUTHORITY)], RegistrationDecision::Deny)]
#[case::admin_group_wins_over_scope(
    5,
    &[("scope", "idp.clients.register", AUTHORITY), ("group", "registration-admins", AUTHORITY)],
    RegistrationDecision::Allow(AllowReason::AdminGroup)
)]
#[tokio::test]
async fn decides_by_count_then_claims(
    #[case] clients: usize,
    #[case] claims: &[(&str, &str, &str)],
    #[case] expected: RegistrationDecision,
) {
    let gate = gate(store_with_clients(clients).await);
    let decision = gate.decide(&principal(claims)).await.expect("decide");
    assert_eq!(decision, expected);
}

#[tokio::test]
async fn only_clients_count_toward_the_threshold() {
    let store = store_with_clients(4).await;
    for id in ["u1", "u2", "u3"] {
        store.add(id, &testutil::user(id)).await.expect("add user");
    }

    let decision = gate(store).decide(&ClaimsPrincipal::anonymous()).await.expect("decide");
    assert!(decision.is_allowed());
}

#[tokio::test]
async fn registration_closes_once_threshold_is_reached() {
    let store = Arc::new(store_with_clients(0).await);
    let gate = gate(Arc::clone(&store));
    let anonymous = ClaimsPrincipal::anonymous();

    for i in 0..5 {
        assert!(gate.decide(&anonymous).await.expect("decide").is_allowed(), "client {i}");
        let id = format!("self-{i}");
        store.add(&id, &testutil::client(&id)).await.expect("add client");
    }
    assert_eq!(gate.decide(&anonymous).await.expect("decide"), RegistrationDecision::Deny);
}

#[tokio::test]
async fn zero_threshold_requires_claims() {
    let policy = RegistrationPolicy::builder()
        .threshold(0)
        .authority(AUTHORITY)
        .build()
        .expect("valid policy");
    let gate = RegistrationGate::new(store_with_clients(0).await, policy);

    let decision = gate.decide(&ClaimsPrincipal::anonymous()).await.expect("decide");
    assert_eq!(decision, RegistrationDecision::Deny);
}

/// Backend whose every call reports the store as unavailable.
struct DownBackend;

#[async_trait]
impl StorageBackend for DownBackend {
    async fn get(&self, _key: &str) -> StorageResult<Option<Bytes>> {
        Err(StorageError::unavailable("down"))
    }

    async fn get_many(&self, _keys: &[String]) -> StorageResult<Vec<KeyValue>> {
        Err(StorageError::unavailable("down"))
    }

    async fn get_by_prefix(&self, _prefix: &str) -> StorageResult<Vec<KeyValue>> {
        Err(StorageError::unavailable("down"))
    }

    async fn count(&self, _prefix: &str) -> StorageResult<u64> {
        Err(StorageError::unavailable("down"))
    }

    async fn add(&self, _key: &str, _value: Vec<u8>) -> StorageResult<()> {
        Err(StorageError::unavailable("down"))
    }

    async fn update(&self, _key: &str, _value: Vec<u8>) -> StorageResult<()> {
        Err(StorageError::unavailable("down"))
    }

    async fn delete(&self, _key: &str) -> StorageResult<()> {
        Err(StorageError::unavailable("down"))
    }

    async fn health_check(&self) -> StorageResult<()> {
        Err(StorageError::unavailable("down"))
    }
}

#[tokio::test]
async fn store_failures_are_surfaced_not_denied() {
    let gate = gate(TypedStore::new(DownBackend));
    let err = gate.decide(&ClaimsPrincipal::anonymous()).await.expect_err("store is down");
    assert!(err.is_unavailable());
}
