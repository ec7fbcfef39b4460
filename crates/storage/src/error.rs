/// All errors that can be returned by a VaultStorage implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The record was spent by another transaction, either already committed
    /// or committed concurrently before this snapshot.
    #[error("state {tx_id}({output_index}) already consumed by {consumed_by}")]
    AlreadyConsumed {
        tx_id: String,
        output_index: u32,
        consumed_by: String,
    },

    /// No record exists at (tx_id, output_index).
    #[error("state not found: {tx_id}({output_index})")]
    StateNotFound { tx_id: String, output_index: u32 },

    /// A record already exists at (tx_id, output_index).
    #[error("state already recorded: {tx_id}({output_index})")]
    StateAlreadyRecorded { tx_id: String, output_index: u32 },

    /// Transaction record not found.
    #[error("transaction not found: {tx_id}")]
    TransactionNotFound { tx_id: String },

    /// The transaction has already been recorded in this vault.
    #[error("transaction already recorded: {tx_id}")]
    TransactionAlreadyRecorded { tx_id: String },

    /// A backend-specific storage error (DB connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
