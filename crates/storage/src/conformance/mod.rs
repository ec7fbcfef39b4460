//! Conformance test suite for `VaultStorage` implementations.
//!
//! This module provides a backend-agnostic test suite that any `VaultStorage`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **Recording**: transactions and states become queryable after commit
//! - **Consumption**: a state is spent exactly once
//! - **Snapshot isolation**: uncommitted writes invisible, aborted writes discarded
//! - **Error handling**: correct error variants for invalid operations
//! - **Concurrency**: racing snapshots that spend one state produce one winner
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use covenant_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn sled_conformance() {
//!     let report = run_conformance_suite(|| async { open_temp_sled_vault().await }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod consume;
mod error;
mod record;
mod snapshot;

use std::fmt;
use std::future::Future;

use crate::record::{StateRecord, TransactionRecord};
use crate::VaultStorage;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "record", "snapshot", "consume").
    pub category: String,
    /// Test name (e.g. "committed_state_is_queryable").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: VaultStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(record::run_record_tests(&factory).await);
    results.extend(consume::run_consume_tests(&factory).await);
    results.extend(snapshot::run_snapshot_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

fn make_transaction(id: &str, sequence: u64) -> TransactionRecord {
    TransactionRecord {
        id: id.to_string(),
        notary: "Notary".to_string(),
        sequence,
        transaction: serde_json::json!({"id": id}),
        recorded_at: "2026-01-01T00:00:00Z".to_string(),
    }
}

fn make_state(tx_id: &str, output_index: u32, linear_id: &str) -> StateRecord {
    StateRecord {
        tx_id: tx_id.to_string(),
        output_index,
        linear_id: linear_id.to_string(),
        contract_state: serde_json::json!({"amount": {"quantity": "100", "currency": "USD"}}),
        participants: vec!["PartyA".to_string(), "PartyB".to_string()],
        recorded_at: "2026-01-01T00:00:00Z".to_string(),
        consumed_by: None,
    }
}

/// Commit one transaction producing one state for `linear_id`.
async fn seed<S: VaultStorage>(s: &S, tx_id: &str, linear_id: &str) -> Result<(), String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    s.insert_transaction(&mut snap, make_transaction(tx_id, 1))
        .await
        .map_err(|e| format!("insert tx: {e}"))?;
    s.insert_state(&mut snap, make_state(tx_id, 0, linear_id))
        .await
        .map_err(|e| format!("insert state: {e}"))?;
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit seed: {e}"))
}
