use std::future::Future;

use super::{make_state, make_transaction, seed, TestResult};
use crate::{StateStatus, StorageError, VaultStorage};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "error",
        "get_transaction_nonexistent",
        get_transaction_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "get_state_not_found_has_correct_fields",
        get_state_not_found_has_correct_fields(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "consume_nonexistent_state",
        consume_nonexistent_state(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "duplicate_transaction_rejected",
        duplicate_transaction_rejected(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "duplicate_state_rejected",
        duplicate_state_rejected(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "query_empty_for_unknown_linear_id",
        query_empty_for_unknown_linear_id(factory).await,
    ));

    results
}

async fn get_transaction_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_transaction("tx-missing").await {
        Err(StorageError::TransactionNotFound { tx_id }) if tx_id == "tx-missing" => Ok(()),
        other => Err(format!("expected TransactionNotFound, got {:?}", other)),
    }
}

async fn get_state_not_found_has_correct_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_state("tx-42", 7).await {
        Err(StorageError::StateNotFound {
            tx_id,
            output_index,
        }) => {
            if tx_id != "tx-42" || output_index != 7 {
                return Err(format!(
                    "expected tx-42(7), got {}({})",
                    tx_id, output_index
                ));
            }
            Ok(())
        }
        other => Err(format!("expected StateNotFound, got {:?}", other)),
    }
}

async fn consume_nonexistent_state<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    let result = s.consume_state(&mut snap, "tx-none", 0, "tx-2").await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::StateNotFound { .. }) => Ok(()),
        other => Err(format!("expected StateNotFound, got {:?}", other)),
    }
}

async fn duplicate_transaction_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "tx-1", "lin-1").await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    let result = s
        .insert_transaction(&mut snap, make_transaction("tx-1", 1))
        .await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::TransactionAlreadyRecorded { .. }) => Ok(()),
        other => Err(format!("expected TransactionAlreadyRecorded, got {:?}", other)),
    }
}

async fn duplicate_state_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let result = s
        .insert_state(&mut snap, make_state("tx-1", 0, "lin-1"))
        .await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::StateAlreadyRecorded { .. }) => Ok(()),
        other => Err(format!("expected StateAlreadyRecorded, got {:?}", other)),
    }
}

async fn query_empty_for_unknown_linear_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "tx-1", "lin-1").await?;
    let found = s
        .query_states("lin-unknown", StateStatus::All)
        .await
        .map_err(|e| format!("query: {e}"))?;
    if !found.is_empty() {
        return Err(format!("expected no states, got {}", found.len()));
    }
    Ok(())
}
