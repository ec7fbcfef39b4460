//! Vault storage for Covenant nodes.
//!
//! A vault holds every finalized transaction a node took part in and the
//! records those transactions produced, marking a record consumed once a
//! later finalized transaction spends it. Records are string-typed so that
//! backends never need to understand the ledger model.

pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::{InMemoryVault, MemorySnapshot};
pub use record::{StateRecord, StateStatus, TransactionRecord};
pub use traits::VaultStorage;
