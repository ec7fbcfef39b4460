//! Responder validation policies.
//!
//! Before a responder endorses a proposal it has already checked the
//! mechanics: signatures are valid, its own key is required, and the input
//! records it was sent are the ones the draft consumes. The policy is what
//! decides whether this node actually *wants* the transaction.

mod basic;
mod composite;

pub use basic::{AcceptAll, MaxAmount, RejectAll, VerifyContract};
pub use composite::AllOf;

use async_trait::async_trait;
use covenant_ledger::{Contract, LedgerTransaction, Party, SignedTransaction};

/// Everything a policy may look at.
pub struct ProposalView<'a> {
    /// The draft as received, with the signatures attached so far.
    pub signed: &'a SignedTransaction,
    /// The draft with its inputs resolved.
    pub ledger: &'a LedgerTransaction,
    /// The party that sent the proposal.
    pub proposer: &'a Party,
    /// The contract rules this node runs.
    pub contract: &'a dyn Contract,
}

/// Why a policy declined a proposal. Sent back to the initiator verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct PolicyRejection(pub String);

impl PolicyRejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

#[async_trait]
pub trait ValidationPolicy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn check(&self, proposal: &ProposalView<'_>) -> Result<(), PolicyRejection>;
}
