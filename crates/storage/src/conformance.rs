//! Conformance test suite for [`DocumentStore`] implementations.
//!
//! This module provides async check functions that validate whether a store
//! satisfies the document store contract. The typed store over every
//! backend, and any decorator around it, runs the same suite.
//!
//! # Usage
//!
//! Enable the `testutil` feature and call each check with a fresh, empty
//! store:
//!
//! ```no_run
//! use idp_storage::{MemoryBackend, TypedStore, conformance};
//!
//! #[tokio::test]
//! async fn add_rejects_duplicates() {
//!     conformance::add_rejects_duplicates(&TypedStore::new(MemoryBackend::new())).await;
//! }
//! ```
//!
//! # Check Categories
//!
//! | Category | Contract aspect |
//! |----------|-----------------|
//! | CRUD | get/add/update/delete semantics, uniqueness, idempotent delete |
//! | Batch | `get_many` omits unknown ids |
//! | Prefix | `get_by_prefix` / `count` completeness and namespace isolation |
//! | Concurrent | exactly one winner for racing adds |

use std::{collections::HashSet, sync::Arc};

use crate::{
    document::{CLIENT_PREFIX, Document, IDENTITY_RESOURCE_PREFIX},
    entities::{Client, IdentityResource},
    error::StorageError,
    store::DocumentStore,
    testutil,
};

// ============================================================================
// CRUD
// ============================================================================

/// `get` on an unknown id returns `Ok(None)`.
pub async fn get_missing_returns_none<S: DocumentStore>(store: &S) {
    let result = store.get::<Client>("nonexistent").await;
    assert!(matches!(result, Ok(None)), "missing document should be None: {result:?}");
}

/// `add` then `get` returns the stored value.
pub async fn add_then_get_returns_value<S: DocumentStore>(store: &S) {
    let client = testutil::client_with_secrets("app", &["s1"]);
    store.add("app", &client).await.expect("add should succeed");
    let loaded = store.get::<Client>("app").await.expect("get should succeed");
    assert_eq!(loaded, Some(client));
}

/// A second `add` with the same id fails and leaves the first value intact.
pub async fn add_rejects_duplicates<S: DocumentStore>(store: &S) {
    let first = testutil::client("dup");
    let mut second = testutil::client("dup");
    second.client_name = Some("Second".to_owned());

    store.add("dup", &first).await.expect("first add should succeed");
    let result = store.add("dup", &second).await;
    assert!(
        matches!(result, Err(StorageError::AlreadyExists { .. })),
        "duplicate add should be AlreadyExists: {result:?}"
    );
    let loaded = store.get::<Client>("dup").await.expect("get should succeed");
    assert_eq!(loaded, Some(first), "duplicate add must not overwrite");
}

/// `update` replaces an existing value.
pub async fn update_replaces_value<S: DocumentStore>(store: &S) {
    store.add("app", &testutil::client("app")).await.expect("add should succeed");
    let mut changed = testutil::client("app");
    changed.redirect_uris = vec!["https://app.example/cb".to_owned()];

    store.update("app", &changed).await.expect("update should succeed");
    let loaded = store.get::<Client>("app").await.expect("get should succeed");
    assert_eq!(loaded, Some(changed));
}

/// `update` on an unknown id fails with `NotFound` and creates nothing.
pub async fn update_missing_is_not_found<S: DocumentStore>(store: &S) {
    let result = store.update("ghost", &testutil::client("ghost")).await;
    assert!(
        matches!(result, Err(StorageError::NotFound { .. })),
        "update of missing document should be NotFound: {result:?}"
    );
    let loaded = store.get::<Client>("ghost").await.expect("get should succeed");
    assert!(loaded.is_none());
}

/// `delete` removes a document; deleting it again is not an error.
pub async fn delete_is_idempotent<S: DocumentStore>(store: &S) {
    store.add("app", &testutil::client("app")).await.expect("add should succeed");
    store.delete::<Client>("app").await.expect("first delete should succeed");
    store.delete::<Client>("app").await.expect("second delete should succeed");
    store.delete::<Client>("never-existed").await.expect("delete of unknown id should succeed");
    let loaded = store.get::<Client>("app").await.expect("get should succeed");
    assert!(loaded.is_none());
}

/// The same id under two document types addresses two documents.
pub async fn types_do_not_collide<S: DocumentStore>(store: &S) {
    store.add("openid", &testutil::client("openid")).await.expect("client add should succeed");
    store.add("openid", &IdentityResource::openid()).await.expect("resource add should succeed");

    let client = store.get::<Client>("openid").await.expect("get should succeed");
    let resource = store.get::<IdentityResource>("openid").await.expect("get should succeed");
    assert_eq!(client.map(|c| c.client_id), Some("openid".to_owned()));
    assert_eq!(resource, Some(IdentityResource::openid()));
}

// ============================================================================
// Batch
// ============================================================================

/// `get_many` returns the known ids and silently skips the rest.
pub async fn get_many_omits_missing<S: DocumentStore>(store: &S) {
    for id in ["a", "b", "c"] {
        store.add(id, &testutil::client(id)).await.expect("add should succeed");
    }
    let ids: HashSet<String> = ["a", "c", "zzz"].iter().map(|s| (*s).to_owned()).collect();

    let found = store.get_many::<Client>(&ids).await.expect("get_many should succeed");
    let found: HashSet<String> = found.into_iter().map(|c| c.client_id).collect();
    let expected: HashSet<String> = ["a", "c"].iter().map(|s| (*s).to_owned()).collect();
    assert_eq!(found, expected);

    let none = store.get_many::<Client>(&HashSet::new()).await.expect("empty get_many");
    assert!(none.is_empty());
}

// ============================================================================
// Prefix
// ============================================================================

/// `get_by_prefix` and `count` see exactly the documents of one type.
pub async fn prefix_scan_is_complete<S: DocumentStore>(store: &S) {
    let ids = ["alpha", "beta", "gamma", "delta"];
    for id in ids {
        store.add(id, &testutil::client(id)).await.expect("add should succeed");
    }
    for resource in IdentityResource::well_known() {
        store.add(&resource.name, &resource).await.expect("add should succeed");
    }

    let clients = store.get_by_prefix::<Client>(CLIENT_PREFIX).await.expect("scan should succeed");
    let found: HashSet<String> = clients.into_iter().map(|c| c.client_id).collect();
    let expected: HashSet<String> = ids.iter().map(|s| (*s).to_owned()).collect();
    assert_eq!(found, expected);

    assert_eq!(store.count(CLIENT_PREFIX).await.expect("count"), ids.len() as u64);
    assert_eq!(store.count(IDENTITY_RESOURCE_PREFIX).await.expect("count"), 3);
}

/// `count` on a prefix with no documents is zero.
pub async fn count_empty_prefix_is_zero<S: DocumentStore>(store: &S) {
    assert_eq!(store.count(CLIENT_PREFIX).await.expect("count"), 0);
    store.add("u1", &testutil::user("u1")).await.expect("add should succeed");
    assert_eq!(store.count(CLIENT_PREFIX).await.expect("count"), 0);
}

/// Deleted documents disappear from scans and counts.
pub async fn delete_updates_count<S: DocumentStore>(store: &S) {
    store.add("a", &testutil::client("a")).await.expect("add should succeed");
    store.add("b", &testutil::client("b")).await.expect("add should succeed");
    store.delete::<Client>("a").await.expect("delete should succeed");

    assert_eq!(store.count(CLIENT_PREFIX).await.expect("count"), 1);
    let all = store.get_all::<Client>().await.expect("get_all should succeed");
    assert_eq!(all.len(), 1);
}

// ============================================================================
// Concurrent
// ============================================================================

/// Of several tasks racing to add the same id, exactly one wins.
pub async fn concurrent_add_has_one_winner<S: DocumentStore + 'static>(store: Arc<S>) {
    let mut handles = Vec::new();
    for task in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let mut client = testutil::client("contested");
            client.client_name = Some(format!("task {task}"));
            store.add("contested", &client).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.expect("task should not panic") {
            Ok(()) => winners += 1,
            Err(StorageError::AlreadyExists { .. }) => {},
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(store.count(&format!("{}:", Client::TYPE_TAG)).await.expect("count"), 1);
}

/// Runs every check, each against a fresh store from `make`.
pub async fn run_all<S, F>(make: F)
where
    S: DocumentStore + 'static,
    F: Fn() -> S,
{
    get_missing_returns_none(&make()).await;
    add_then_get_returns_value(&make()).await;
    add_rejects_duplicates(&make()).await;
    update_replaces_value(&make()).await;
    update_missing_is_not_found(&make()).await;
    delete_is_idempotent(&make()).await;
    types_do_not_collide(&make()).await;
    get_many_omits_missing(&make()).await;
    prefix_scan_is_complete(&make()).await;
    count_empty_prefix_is_zero(&make()).await;
    delete_updates_count(&make()).await;
    concurrent_add_has_one_winner(Arc::new(make())).await;
}
