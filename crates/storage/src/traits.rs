use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{StateRecord, StateStatus, TransactionRecord};

/// The storage trait for Covenant vault backends.
///
/// A `VaultStorage` implementation provides transactional storage for
/// finalized transactions and the records (states) they produce.
///
/// ## Snapshot Semantics
///
/// All mutating operations take `&mut Self::Snapshot`, a type representing an
/// in-progress transaction. The lifecycle is:
///
/// 1. `begin_snapshot()` — start a transaction, returns a `Snapshot`
/// 2. Call mutating methods with `&mut snapshot`
/// 3. `commit_snapshot(snapshot)` — commit and consume the transaction
///    OR `abort_snapshot(snapshot)` — roll back and consume the transaction
///
/// If a `Snapshot` is dropped without committing, nothing it wrote may become
/// visible.
///
/// ## Consumption
///
/// A record may be consumed exactly once. `consume_state` fails with
/// `StorageError::AlreadyConsumed` when the record is already spent, and
/// `commit_snapshot` fails with the same error when another snapshot spent
/// it first. A failed commit applies none of the snapshot's writes.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so a vault can be shared
/// by every workflow task running on a node.
#[async_trait]
pub trait VaultStorage: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this storage backend.
    type Snapshot: Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────────────

    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Commit a snapshot, making all mutations visible atomically.
    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    /// Abort (roll back) a snapshot, discarding all mutations.
    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Recording operations (within snapshot) ────────────────────────────────

    /// Record a finalized transaction.
    ///
    /// Returns `Err(StorageError::TransactionAlreadyRecorded)` on a duplicate id.
    async fn insert_transaction(
        &self,
        snapshot: &mut Self::Snapshot,
        record: TransactionRecord,
    ) -> Result<(), StorageError>;

    /// Record a new unconsumed state.
    ///
    /// Returns `Err(StorageError::StateAlreadyRecorded)` if the
    /// (tx_id, output_index) slot is taken.
    async fn insert_state(
        &self,
        snapshot: &mut Self::Snapshot,
        record: StateRecord,
    ) -> Result<(), StorageError>;

    /// Mark a state consumed by `consuming_tx_id`.
    ///
    /// The state may have been inserted earlier in the same snapshot.
    async fn consume_state(
        &self,
        snapshot: &mut Self::Snapshot,
        tx_id: &str,
        output_index: u32,
        consuming_tx_id: &str,
    ) -> Result<(), StorageError>;

    // ── Query operations (committed data only) ────────────────────────────────

    /// Returns `Err(StorageError::TransactionNotFound)` if not found.
    async fn get_transaction(&self, tx_id: &str) -> Result<TransactionRecord, StorageError>;

    /// Returns `Err(StorageError::StateNotFound)` if not found.
    async fn get_state(&self, tx_id: &str, output_index: u32)
        -> Result<StateRecord, StorageError>;

    /// All versions of the record with `linear_id` matching `status`,
    /// ordered by (tx_id, output_index).
    async fn query_states(
        &self,
        linear_id: &str,
        status: StateStatus,
    ) -> Result<Vec<StateRecord>, StorageError>;

    /// Every state matching `status`, ordered by (tx_id, output_index).
    async fn list_states(&self, status: StateStatus) -> Result<Vec<StateRecord>, StorageError>;

    /// Every recorded transaction, ordered by notary sequence then id.
    async fn list_transactions(&self) -> Result<Vec<TransactionRecord>, StorageError>;
}
