//! Covenant ledger data model.
//!
//! Everything a workflow moves between parties lives here: identities and
//! their keys, the obligation records held in vaults, draft and signed
//! transactions, notarised results, and the contract rules that decide
//! whether a proposed transition is legal.
//!
//! Nothing in this crate performs I/O. Signing happens against an
//! in-memory `ed25519_dalek::SigningKey`; storage, transport and ordering
//! are the concern of `covenant-storage` and `covenant-flows`.

pub mod amount;
pub mod contract;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod state;
pub mod transaction;

pub use amount::Amount;
pub use contract::{Contract, ContractViolation, IouContract};
pub use crypto::{SecureHash, TransactionSignature};
pub use error::LedgerError;
pub use identity::{Party, PublicKey};
pub use state::{Obligation, StateAndRef, StateRef, TransactionState, UniqueIdentifier};
pub use transaction::{
    Command, CommandKind, FinalizedTransaction, LedgerTransaction, SignedTransaction, TimeWindow,
    TransactionBuilder, WireTransaction,
};
