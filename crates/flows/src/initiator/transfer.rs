use covenant_ledger::{ContractViolation, FinalizedTransaction, Party, UniqueIdentifier};
use covenant_storage::VaultStorage;
use tracing::info;

use super::{endorse_and_finalize, log_failure};
use crate::builder::{lookup_by_linear_id, ProposalBuilder};
use crate::cancel::CancellationToken;
use crate::error::FlowError;
use crate::hub::ServiceHub;
use crate::progress::{ProgressStep, ProgressTracker};

pub const TRANSFER_FLOW: &str = "iou-transfer";

/// Move an obligation this node lends to a new lender. The borrower and the
/// new lender both endorse.
pub struct TransferFlow<S: VaultStorage> {
    hub: ServiceHub<S>,
    progress: ProgressTracker,
    cancel: CancellationToken,
}

impl<S: VaultStorage> TransferFlow<S> {
    pub fn new(hub: ServiceHub<S>) -> Self {
        Self::with_cancellation(hub, CancellationToken::new())
    }

    pub fn with_cancellation(hub: ServiceHub<S>, cancel: CancellationToken) -> Self {
        Self {
            hub,
            progress: ProgressTracker::new(),
            cancel,
        }
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub async fn call(
        &self,
        linear_id: &UniqueIdentifier,
        new_lender: &Party,
    ) -> Result<FinalizedTransaction, FlowError> {
        let result = self.run(linear_id, new_lender).await;
        if let Err(e) = &result {
            log_failure(TRANSFER_FLOW, &self.hub.identity, e);
        }
        result
    }

    async fn run(
        &self,
        linear_id: &UniqueIdentifier,
        new_lender: &Party,
    ) -> Result<FinalizedTransaction, FlowError> {
        self.progress.set(ProgressStep::Building);
        let input = lookup_by_linear_id(self.hub.vault.as_ref(), linear_id).await?;
        if input.state.data.lender != self.hub.identity {
            return Err(ContractViolation::new(
                "only the current lender may transfer an obligation",
            )
            .into());
        }
        info!(linear_id = %linear_id, from = %self.hub.identity, to = %new_lender, "transferring obligation");
        let builder = ProposalBuilder::new(self.hub.clock.now(), self.hub.config.time_window())
            .transfer(self.hub.ordering.as_ref(), input, new_lender.clone())?;
        endorse_and_finalize(&self.hub, &self.progress, &self.cancel, builder, TRANSFER_FLOW).await
    }
}
