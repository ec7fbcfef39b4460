//! Snapshot isolation conformance tests.
//!
//! Verifies that uncommitted writes are invisible outside a snapshot,
//! committed writes are visible, and aborted writes are discarded.

use std::future::Future;

use super::{make_state, make_transaction, seed, TestResult};
use crate::{StateStatus, StorageError, VaultStorage};

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "snapshot",
        "uncommitted_state_invisible",
        uncommitted_state_invisible(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "aborted_state_discarded",
        aborted_state_discarded(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "uncommitted_consume_invisible",
        uncommitted_consume_invisible(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "failed_commit_applies_nothing",
        failed_commit_applies_nothing(factory).await,
    ));

    results
}

async fn uncommitted_state_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    s.insert_state(&mut snap, make_state("tx-1", 0, "lin-1"))
        .await
        .map_err(|e| format!("insert: {e}"))?;

    let visible = s
        .query_states("lin-1", StateStatus::All)
        .await
        .map_err(|e| format!("query: {e}"))?;
    let _ = s.abort_snapshot(snap).await;
    if !visible.is_empty() {
        return Err("uncommitted state visible to queries".to_string());
    }
    Ok(())
}

async fn aborted_state_discarded<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    s.insert_transaction(&mut snap, make_transaction("tx-1", 1))
        .await
        .map_err(|e| format!("insert tx: {e}"))?;
    s.insert_state(&mut snap, make_state("tx-1", 0, "lin-1"))
        .await
        .map_err(|e| format!("insert state: {e}"))?;
    s.abort_snapshot(snap)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    match s.get_transaction("tx-1").await {
        Err(StorageError::TransactionNotFound { .. }) => {}
        other => return Err(format!("expected TransactionNotFound, got {:?}", other)),
    }
    match s.get_state("tx-1", 0).await {
        Err(StorageError::StateNotFound { .. }) => Ok(()),
        other => Err(format!("expected StateNotFound, got {:?}", other)),
    }
}

async fn uncommitted_consume_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "tx-1", "lin-1").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    s.consume_state(&mut snap, "tx-1", 0, "tx-2")
        .await
        .map_err(|e| format!("consume: {e}"))?;
    let state = s
        .get_state("tx-1", 0)
        .await
        .map_err(|e| format!("get_state: {e}"))?;
    let _ = s.abort_snapshot(snap).await;
    if state.is_consumed() {
        return Err("uncommitted consume visible".to_string());
    }
    Ok(())
}

/// A snapshot whose commit fails must leave the vault untouched, including
/// writes that on their own would have been valid.
async fn failed_commit_applies_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "tx-1", "lin-1").await?;

    let mut first = s.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    let mut second = s.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    s.consume_state(&mut first, "tx-1", 0, "tx-2")
        .await
        .map_err(|e| format!("consume first: {e}"))?;
    s.insert_transaction(&mut second, make_transaction("tx-3", 3))
        .await
        .map_err(|e| format!("insert second: {e}"))?;
    s.consume_state(&mut second, "tx-1", 0, "tx-3")
        .await
        .map_err(|e| format!("consume second: {e}"))?;

    s.commit_snapshot(first)
        .await
        .map_err(|e| format!("commit first: {e}"))?;
    match s.commit_snapshot(second).await {
        Err(StorageError::AlreadyConsumed { .. }) => {}
        other => return Err(format!("expected AlreadyConsumed, got {:?}", other)),
    }
    match s.get_transaction("tx-3").await {
        Err(StorageError::TransactionNotFound { .. }) => Ok(()),
        other => Err(format!(
            "failed commit leaked its transaction record: {:?}",
            other
        )),
    }
}
