//! Single-rule policies: AcceptAll, RejectAll, VerifyContract, MaxAmount.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{PolicyRejection, ProposalView, ValidationPolicy};

/// Endorses every proposal that passed the mechanical checks.
///
/// Useful for testing and for nodes that trust every proposer.
pub struct AcceptAll;

#[async_trait]
impl ValidationPolicy for AcceptAll {
    fn name(&self) -> &str {
        "accept-all"
    }

    async fn check(&self, _proposal: &ProposalView<'_>) -> Result<(), PolicyRejection> {
        Ok(())
    }
}

/// Declines every proposal with a fixed reason.
pub struct RejectAll {
    pub reason: String,
}

impl Default for RejectAll {
    fn default() -> Self {
        Self {
            reason: "this node does not endorse proposals".to_string(),
        }
    }
}

#[async_trait]
impl ValidationPolicy for RejectAll {
    fn name(&self) -> &str {
        "reject-all"
    }

    async fn check(&self, _proposal: &ProposalView<'_>) -> Result<(), PolicyRejection> {
        Err(PolicyRejection::new(self.reason.clone()))
    }
}

/// Re-runs the contract rules on the responder's side.
pub struct VerifyContract;

#[async_trait]
impl ValidationPolicy for VerifyContract {
    fn name(&self) -> &str {
        "verify-contract"
    }

    async fn check(&self, proposal: &ProposalView<'_>) -> Result<(), PolicyRejection> {
        proposal
            .contract
            .verify(proposal.ledger)
            .map_err(|violation| PolicyRejection::new(violation.to_string()))
    }
}

/// Declines any proposal creating an obligation above `limit`, in any
/// currency.
pub struct MaxAmount {
    pub limit: Decimal,
}

impl MaxAmount {
    pub fn new(limit: Decimal) -> Self {
        Self { limit }
    }
}

#[async_trait]
impl ValidationPolicy for MaxAmount {
    fn name(&self) -> &str {
        "max-amount"
    }

    async fn check(&self, proposal: &ProposalView<'_>) -> Result<(), PolicyRejection> {
        match proposal
            .ledger
            .outputs
            .iter()
            .find(|iou| iou.amount.quantity > self.limit)
        {
            Some(iou) => Err(PolicyRejection::new(format!(
                "amount {} exceeds the limit of {}",
                iou.amount, self.limit
            ))),
            None => Ok(()),
        }
    }
}
