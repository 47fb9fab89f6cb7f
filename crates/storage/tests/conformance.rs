//! Conformance suite for the typed store over `MemoryBackend`, with and
//! without the audit decorator.
//!
//! Each test function corresponds to a single conformance check, providing
//! fine-grained failure reporting. The `run_all` tests exercise the full
//! suite as a one-liner to verify no check is accidentally omitted.

#![allow(clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use idp_storage::{
    AuditedDocumentStore, MemoryBackend, TypedStore, conformance, testutil::RecordingAuditSink,
};

fn memory() -> TypedStore<MemoryBackend> {
    TypedStore::new(MemoryBackend::new())
}

fn audited() -> AuditedDocumentStore<TypedStore<MemoryBackend>, Arc<RecordingAuditSink>> {
    AuditedDocumentStore::new(memory(), Arc::new(RecordingAuditSink::new()))
}

// ============================================================================
// CRUD
// ============================================================================

#[tokio::test]
async fn get_missing_returns_none() {
    conformance::get_missing_returns_none(&memory()).await;
}

#[tokio::test]
async fn add_then_get_returns_value() {
    conformance::add_then_get_returns_value(&memory()).await;
}

#[tokio::test]
async fn add_rejects_duplicates() {
    conformance::add_rejects_duplicates(&memory()).await;
}

#[tokio::test]
async fn update_replaces_value() {
    conformance::update_replaces_value(&memory()).await;
}

#[tokio::test]
async fn update_missing_is_not_found() {
    conformance::update_missing_is_not_found(&memory()).await;
}

#[tokio::test]
async fn delete_is_idempotent() {
    conformance::delete_is_idempotent(&memory()).await;
}

#[tokio::test]
async fn types_do_not_collide() {
    conformance::types_do_not_collide(&memory()).await;
}

// ============================================================================
// Batch and prefix
// ============================================================================

#[tokio::test]
async fn get_many_omits_missing() {
    conformance::get_many_omits_missing(&memory()).await;
}

#[tokio::test]
async fn prefix_scan_is_complete() {
    conformance::prefix_scan_is_complete(&memory()).await;
}

#[tokio::test]
async fn count_empty_prefix_is_zero() {
    conformance::count_empty_prefix_is_zero(&memory()).await;
}

#[tokio::test]
async fn delete_updates_count() {
    conformance::delete_updates_count(&memory()).await;
}

// ============================================================================
// Concurrent
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_add_has_one_winner() {
    conformance::concurrent_add_has_one_winner(Arc::new(memory())).await;
}

// ============================================================================
// Full suite
// ============================================================================

#[tokio::test]
async fn run_all_memory() {
    conformance::run_all(memory).await;
}

#[tokio::test]
async fn run_all_audited() {
    conformance::run_all(audited).await;
}
