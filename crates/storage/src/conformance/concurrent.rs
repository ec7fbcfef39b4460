use std::future::Future;
use std::sync::Arc;

use super::{make_state, make_transaction, seed, TestResult};
use crate::{StateStatus, StorageError, VaultStorage};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_consume_exactly_one_wins",
        concurrent_consume_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_consume_distinct_states_all_succeed",
        concurrent_consume_distinct_states_all_succeed(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_supersede_leaves_one_successor",
        concurrent_supersede_leaves_one_successor(factory).await,
    ));

    results
}

/// Spend `tx_id(0)` from a fresh snapshot as `consumer`, optionally
/// recording a successor state. `Ok(false)` means the race was lost.
async fn try_spend<S: VaultStorage>(
    s: &S,
    tx_id: &str,
    consumer: &str,
    successor_of: Option<&str>,
) -> Result<bool, StorageError> {
    let mut snap = s.begin_snapshot().await?;
    let staged = async {
        if let Some(linear_id) = successor_of {
            s.insert_transaction(&mut snap, make_transaction(consumer, 2))
                .await?;
            s.insert_state(&mut snap, make_state(consumer, 0, linear_id))
                .await?;
        }
        s.consume_state(&mut snap, tx_id, 0, consumer).await
    }
    .await;

    match staged {
        Ok(()) => match s.commit_snapshot(snap).await {
            Ok(()) => Ok(true),
            Err(StorageError::AlreadyConsumed { .. }) => Ok(false),
            Err(e) => Err(e),
        },
        Err(StorageError::AlreadyConsumed { .. }) => {
            s.abort_snapshot(snap).await?;
            Ok(false)
        }
        Err(e) => {
            let _ = s.abort_snapshot(snap).await;
            Err(e)
        }
    }
}

// ── Concurrent consume: exactly one wins ────────────────────────────────────

/// N tasks race to spend the same state. Exactly one commit succeeds; every
/// other task sees AlreadyConsumed, either while staging or at commit.
async fn concurrent_consume_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed(storage.as_ref(), "tx-0", "lin-0").await?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            try_spend(s.as_ref(), "tx-0", &format!("spender-{i}"), None).await
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    Ok(())
}

// ── Concurrent consume of distinct states: all succeed ──────────────────────

/// N tasks each spend a different state. No false conflicts.
async fn concurrent_consume_distinct_states_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    for i in 0..N {
        seed(storage.as_ref(), &format!("tx-{i}"), &format!("lin-{i}")).await?;
    }

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            try_spend(s.as_ref(), &format!("tx-{i}"), &format!("spender-{i}"), None).await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let won = handle
            .await
            .map_err(|e| format!("task {i} panic: {e}"))?
            .map_err(|e| format!("task {i} failed: {e}"))?;
        if !won {
            return Err(format!("task {i} lost a race it had no rival in"));
        }
    }

    let unconsumed = storage
        .list_states(StateStatus::Unconsumed)
        .await
        .map_err(|e| format!("list_states: {e}"))?;
    if !unconsumed.is_empty() {
        return Err(format!("expected every state spent, {} left", unconsumed.len()));
    }
    Ok(())
}

// ── Concurrent supersede: one successor ─────────────────────────────────────

/// N tasks each try to replace the same record with a new version. Afterwards
/// the record has exactly one unconsumed version and the losing transactions
/// were never recorded.
async fn concurrent_supersede_leaves_one_successor<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed(storage.as_ref(), "tx-0", "lin-0").await?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            try_spend(s.as_ref(), "tx-0", &format!("successor-{i}"), Some("lin-0")).await
        }));
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
    }

    let unconsumed = storage
        .query_states("lin-0", StateStatus::Unconsumed)
        .await
        .map_err(|e| format!("query: {e}"))?;
    if unconsumed.len() != 1 {
        return Err(format!(
            "expected exactly 1 unconsumed version, got {}",
            unconsumed.len()
        ));
    }
    let transactions = storage
        .list_transactions()
        .await
        .map_err(|e| format!("list_transactions: {e}"))?;
    if transactions.len() != 2 {
        return Err(format!(
            "expected seed plus one successor transaction, got {}",
            transactions.len()
        ));
    }
    Ok(())
}
