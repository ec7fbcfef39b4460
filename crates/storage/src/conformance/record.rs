use std::future::Future;

use super::{make_state, make_transaction, seed, TestResult};
use crate::{StateStatus, VaultStorage};

pub(super) async fn run_record_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "record",
        "committed_transaction_is_readable",
        committed_transaction_is_readable(factory).await,
    ));
    results.push(TestResult::from_result(
        "record",
        "committed_state_is_unconsumed",
        committed_state_is_unconsumed(factory).await,
    ));
    results.push(TestResult::from_result(
        "record",
        "query_filters_by_linear_id",
        query_filters_by_linear_id(factory).await,
    ));
    results.push(TestResult::from_result(
        "record",
        "list_transactions_ordered_by_sequence",
        list_transactions_ordered_by_sequence(factory).await,
    ));

    results
}

async fn committed_transaction_is_readable<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "tx-1", "lin-1").await?;
    let record = s
        .get_transaction("tx-1")
        .await
        .map_err(|e| format!("get_transaction: {e}"))?;
    if record.sequence != 1 || record.notary != "Notary" {
        return Err(format!("unexpected transaction record: {:?}", record));
    }
    Ok(())
}

async fn committed_state_is_unconsumed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "tx-1", "lin-1").await?;
    let state = s
        .get_state("tx-1", 0)
        .await
        .map_err(|e| format!("get_state: {e}"))?;
    if state.is_consumed() {
        return Err("freshly recorded state is consumed".to_string());
    }
    let unconsumed = s
        .list_states(StateStatus::Unconsumed)
        .await
        .map_err(|e| format!("list_states: {e}"))?;
    if unconsumed.len() != 1 {
        return Err(format!("expected 1 unconsumed state, got {}", unconsumed.len()));
    }
    Ok(())
}

async fn query_filters_by_linear_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "tx-1", "lin-1").await?;
    seed(&s, "tx-2", "lin-2").await?;
    let found = s
        .query_states("lin-2", StateStatus::Unconsumed)
        .await
        .map_err(|e| format!("query_states: {e}"))?;
    match found.as_slice() {
        [only] if only.tx_id == "tx-2" => Ok(()),
        other => Err(format!("expected only tx-2's state, got {:?}", other)),
    }
}

async fn list_transactions_ordered_by_sequence<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    for (id, seq) in [("tx-c", 3), ("tx-a", 1), ("tx-b", 2)] {
        s.insert_transaction(&mut snap, make_transaction(id, seq))
            .await
            .map_err(|e| format!("insert {id}: {e}"))?;
    }
    s.insert_state(&mut snap, make_state("tx-a", 0, "lin-a"))
        .await
        .map_err(|e| format!("insert state: {e}"))?;
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let ids: Vec<String> = s
        .list_transactions()
        .await
        .map_err(|e| format!("list_transactions: {e}"))?
        .into_iter()
        .map(|t| t.id)
        .collect();
    if ids != ["tx-a", "tx-b", "tx-c"] {
        return Err(format!("unexpected order: {:?}", ids));
    }
    Ok(())
}
