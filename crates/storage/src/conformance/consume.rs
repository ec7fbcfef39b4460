//! Consumption conformance tests.
//!
//! A state is spent by exactly one transaction. Spending it again, inside
//! the same snapshot or a later one, must fail without side effects.

use std::future::Future;

use super::{make_state, make_transaction, seed, TestResult};
use crate::{StateStatus, StorageError, VaultStorage};

pub(super) async fn run_consume_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "consume",
        "consume_marks_state_spent",
        consume_marks_state_spent(factory).await,
    ));
    results.push(TestResult::from_result(
        "consume",
        "second_consume_returns_already_consumed",
        second_consume_returns_already_consumed(factory).await,
    ));
    results.push(TestResult::from_result(
        "consume",
        "double_consume_in_one_snapshot_rejected",
        double_consume_in_one_snapshot_rejected(factory).await,
    ));
    results.push(TestResult::from_result(
        "consume",
        "supersede_leaves_one_unconsumed_version",
        supersede_leaves_one_unconsumed_version(factory).await,
    ));

    results
}

async fn consume_marks_state_spent<S, F, Fut>(factory: &F) -> Result<(), String>
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
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let state = s
        .get_state("tx-1", 0)
        .await
        .map_err(|e| format!("get_state: {e}"))?;
    if state.consumed_by.as_deref() != Some("tx-2") {
        return Err(format!("expected consumed_by tx-2, got {:?}", state.consumed_by));
    }
    Ok(())
}

async fn second_consume_returns_already_consumed<S, F, Fut>(factory: &F) -> Result<(), String>
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
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let mut snap = s.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    let result = s.consume_state(&mut snap, "tx-1", 0, "tx-3").await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::AlreadyConsumed { consumed_by, .. }) if consumed_by == "tx-2" => Ok(()),
        other => Err(format!("expected AlreadyConsumed by tx-2, got {:?}", other)),
    }
}

async fn double_consume_in_one_snapshot_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .map_err(|e| format!("first consume: {e}"))?;
    let result = s.consume_state(&mut snap, "tx-1", 0, "tx-3").await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::AlreadyConsumed { .. }) => Ok(()),
        other => Err(format!("expected AlreadyConsumed, got {:?}", other)),
    }
}

async fn supersede_leaves_one_unconsumed_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "tx-1", "lin-1").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    s.insert_transaction(&mut snap, make_transaction("tx-2", 2))
        .await
        .map_err(|e| format!("insert tx: {e}"))?;
    s.consume_state(&mut snap, "tx-1", 0, "tx-2")
        .await
        .map_err(|e| format!("consume: {e}"))?;
    s.insert_state(&mut snap, make_state("tx-2", 0, "lin-1"))
        .await
        .map_err(|e| format!("insert state: {e}"))?;
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let unconsumed = s
        .query_states("lin-1", StateStatus::Unconsumed)
        .await
        .map_err(|e| format!("query unconsumed: {e}"))?;
    let all = s
        .query_states("lin-1", StateStatus::All)
        .await
        .map_err(|e| format!("query all: {e}"))?;
    if unconsumed.len() != 1 || unconsumed[0].tx_id != "tx-2" {
        return Err(format!("expected only tx-2 unconsumed, got {:?}", unconsumed));
    }
    if all.len() != 2 {
        return Err(format!("expected 2 versions in total, got {}", all.len()));
    }
    Ok(())
}
