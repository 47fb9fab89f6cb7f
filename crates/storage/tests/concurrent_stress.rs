//! Concurrent access stress tests for `MemoryBackend` behind the typed store.
//!
//! These tests exercise the store under multi-threaded workloads to detect
//! lost updates and broken uniqueness. The heavier ones are ignored by
//! default:
//!
//! ```bash
//! cargo test -p idp-storage --test concurrent_stress -- --ignored
//! ```

#![allow(clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use idp_storage::{
    CLIENT_PREFIX, DocumentStore, MemoryBackend, StorageError, TypedStore, entities::Client,
    testutil,
};
use tokio::task::JoinSet;

/// Number of concurrent tasks for most tests.
const CONCURRENCY: usize = 16;

/// Number of rounds for the exactly-one-winner test.
const ADD_ROUNDS: usize = 50;

/// Number of operations each task performs in mixed workload tests.
const OPS_PER_TASK: usize = 100;

fn store() -> Arc<TypedStore<MemoryBackend>> {
    Arc::new(TypedStore::new(MemoryBackend::new()))
}

// ---------------------------------------------------------------------------
// Test: racing adds, exactly one winner per id
// ---------------------------------------------------------------------------

/// Runs `ADD_ROUNDS` rounds in which `CONCURRENCY` tasks race to add the
/// same id. Exactly one add must succeed; the rest must see `AlreadyExists`.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn racing_adds_exactly_one_winner_per_round() {
    let store = store();

    for round in 0..ADD_ROUNDS {
        let id = format!("round-{round}");
        let mut set = JoinSet::new();
        for task_id in 0..CONCURRENCY {
            let store = Arc::clone(&store);
            let id = id.clone();
            set.spawn(async move {
                let mut client = testutil::client(&id);
                client.client_name = Some(format!("task {task_id}"));
                store.add(&id, &client).await
            });
        }

        let mut successes = 0usize;
        let mut duplicates = 0usize;
        while let Some(result) = set.join_next().await {
            match result.expect("task should not panic") {
                Ok(()) => successes += 1,
                Err(StorageError::AlreadyExists { .. }) => duplicates += 1,
                Err(e) => panic!("unexpected error in round {round}: {e}"),
            }
        }

        assert_eq!(successes, 1, "round {round}: exactly one add should succeed");
        assert_eq!(duplicates, CONCURRENCY - 1, "round {round}: all other adds should fail");
    }

    let count = store.count(CLIENT_PREFIX).await.expect("count should succeed");
    assert_eq!(count, ADD_ROUNDS as u64);
}

// ---------------------------------------------------------------------------
// Test: disjoint writers, no lost documents
// ---------------------------------------------------------------------------

/// Each task adds its own range of ids. Every document must be present
/// afterwards and the prefix count must match.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn disjoint_writers_lose_nothing() {
    let store = store();

    let mut set = JoinSet::new();
    for task_id in 0..CONCURRENCY {
        let store = Arc::clone(&store);
        set.spawn(async move {
            for i in 0..OPS_PER_TASK {
                let id = format!("t{task_id:02}-{i:04}");
                store.add(&id, &testutil::client(&id)).await.expect("add should succeed");
            }
        });
    }
    while let Some(result) = set.join_next().await {
        result.expect("task should not panic");
    }

    let expected = (CONCURRENCY * OPS_PER_TASK) as u64;
    assert_eq!(store.count(CLIENT_PREFIX).await.expect("count"), expected);
    let all: Vec<Client> = store.get_all().await.expect("get_all should succeed");
    assert_eq!(all.len() as u64, expected);
}

// ---------------------------------------------------------------------------
// Test: mixed readers, updaters and deleters
// ---------------------------------------------------------------------------

/// Updaters and deleters race on a shared set of ids while readers scan.
/// Every update must end in `Ok` or `NotFound`, never in corruption.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn mixed_workload_stays_consistent() {
    let store = store();
    let ids: Vec<String> = (0..32).map(|i| format!("shared-{i:02}")).collect();
    for id in &ids {
        store.add(id, &testutil::client(id)).await.expect("seed add");
    }
    let ids = Arc::new(ids);

    let mut set = JoinSet::new();
    for task_id in 0..CONCURRENCY {
        let store = Arc::clone(&store);
        let ids = Arc::clone(&ids);
        set.spawn(async move {
            for i in 0..OPS_PER_TASK {
                let id = &ids[(task_id + i) % ids.len()];
                match (task_id + i) % 3 {
                    0 => match store.update(id, &testutil::client(id)).await {
                        Ok(()) | Err(StorageError::NotFound { .. }) => {},
                        Err(e) => panic!("unexpected update error: {e}"),
                    },
                    1 => store.delete::<Client>(id).await.expect("delete should succeed"),
                    _ => {
                        let clients: Vec<Client> = store.get_all().await.expect("scan");
                        assert!(clients.iter().all(|c| c.client_id.starts_with("shared-")));
                    },
                }
            }
        });
    }
    while let Some(result) = set.join_next().await {
        result.expect("task should not panic");
    }

    let remaining = store.count(CLIENT_PREFIX).await.expect("count");
    assert!(remaining <= ids.len() as u64);
}
