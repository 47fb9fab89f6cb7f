//! Property tests for the document store contract over `MemoryBackend`.

#![allow(clippy::expect_used, clippy::panic)]

use std::collections::{BTreeMap, HashSet};

use idp_storage::{
    CLIENT_PREFIX, DocumentStore, MemoryBackend, StorageError, TypedStore, entities::Client,
    testutil,
};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().build().expect("runtime")
}

fn id_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9:._-]{0,15}"
}

proptest! {
    /// A second add of any id fails with `AlreadyExists` and the first value survives.
    #[test]
    fn add_is_unique(id in id_strategy(), name in "[A-Za-z ]{1,20}") {
        runtime().block_on(async {
            let store = TypedStore::new(MemoryBackend::new());
            let mut first = testutil::client(&id);
            first.client_name = Some(name);

            store.add(&id, &first).await.expect("first add");
            let second = store.add(&id, &testutil::client(&id)).await;
            let already_exists = matches!(second, Err(StorageError::AlreadyExists { .. }));
            prop_assert!(already_exists);
            prop_assert_eq!(store.get::<Client>(&id).await.expect("get"), Some(first));
            Ok::<_, TestCaseError>(())
        })?;
    }

    /// Deleting any id twice never errors.
    #[test]
    fn delete_is_idempotent(id in id_strategy(), present in any::<bool>()) {
        runtime().block_on(async {
            let store = TypedStore::new(MemoryBackend::new());
            if present {
                store.add(&id, &testutil::client(&id)).await.expect("add");
            }
            prop_assert!(store.delete::<Client>(&id).await.is_ok());
            prop_assert!(store.delete::<Client>(&id).await.is_ok());
            Ok::<_, TestCaseError>(())
        })?;
    }

    /// The client prefix scan returns exactly the added set and `count` agrees,
    /// whatever else is stored alongside.
    #[test]
    fn prefix_scan_matches_added_set(
        ids in prop::collection::hash_set(id_strategy(), 0..24),
        users in prop::collection::hash_set(id_strategy(), 0..8),
    ) {
        runtime().block_on(async {
            let store = TypedStore::new(MemoryBackend::new());
            for id in &ids {
                store.add(id, &testutil::client(id)).await.expect("add client");
            }
            for id in &users {
                store.add(id, &testutil::user(id)).await.expect("add user");
            }

            let found: HashSet<String> = store
                .get_by_prefix::<Client>(CLIENT_PREFIX)
                .await
                .expect("scan")
                .into_iter()
                .map(|c| c.client_id)
                .collect();
            prop_assert_eq!(&found, &ids);
            prop_assert_eq!(store.count(CLIENT_PREFIX).await.expect("count"), ids.len() as u64);
            Ok::<_, TestCaseError>(())
        })?;
    }

    /// Interleaved adds and deletes leave the store matching a model map.
    #[test]
    fn matches_model_under_random_ops(
        ops in prop::collection::vec((0u8..3, 0usize..6), 0..64),
    ) {
        runtime().block_on(async {
            let store = TypedStore::new(MemoryBackend::new());
            let mut model: BTreeMap<String, Client> = BTreeMap::new();

            for (op, slot) in ops {
                let id = format!("c{slot}");
                match op {
                    0 => {
                        let result = store.add(&id, &testutil::client(&id)).await;
                        prop_assert_eq!(result.is_ok(), !model.contains_key(&id));
                        model.entry(id.clone()).or_insert_with(|| testutil::client(&id));
                    },
                    1 => {
                        let mut updated = testutil::client(&id);
                        updated.require_consent = true;
                        let result = store.update(&id, &updated).await;
                        prop_assert_eq!(result.is_ok(), model.contains_key(&id));
                        if let Some(slot) = model.get_mut(&id) {
                            *slot = updated;
                        }
                    },
                    _ => {
                        store.delete::<Client>(&id).await.expect("delete");
                        model.remove(&id);
                    },
                }
            }

            for (id, expected) in &model {
                let stored = store.get::<Client>(id).await.expect("get");
                prop_assert_eq!(stored, Some(expected.clone()));
            }
            prop_assert_eq!(store.count(CLIENT_PREFIX).await.expect("count"), model.len() as u64);
            Ok::<_, TestCaseError>(())
        })?;
    }
}
