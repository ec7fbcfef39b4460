use covenant_ledger::{Amount, FinalizedTransaction, Obligation, Party};
use covenant_storage::VaultStorage;
use tracing::info;

use super::{endorse_and_finalize, log_failure};
use crate::builder::ProposalBuilder;
use crate::cancel::CancellationToken;
use crate::error::FlowError;
use crate::hub::ServiceHub;
use crate::progress::{ProgressStep, ProgressTracker};

pub const ISSUE_FLOW: &str = "iou-issue";

/// Issue a new obligation with this node as lender.
pub struct IssueFlow<S: VaultStorage> {
    hub: ServiceHub<S>,
    progress: ProgressTracker,
    cancel: CancellationToken,
}

impl<S: VaultStorage> IssueFlow<S> {
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

    /// `borrower` owes `amount` to this node once the flow completes.
    pub async fn call(
        &self,
        amount: Amount,
        borrower: &Party,
        external_id: Option<String>,
    ) -> Result<FinalizedTransaction, FlowError> {
        let result = self.run(amount, borrower, external_id).await;
        if let Err(e) = &result {
            log_failure(ISSUE_FLOW, &self.hub.identity, e);
        }
        result
    }

    async fn run(
        &self,
        amount: Amount,
        borrower: &Party,
        external_id: Option<String>,
    ) -> Result<FinalizedTransaction, FlowError> {
        self.progress.set(ProgressStep::Building);
        let iou = Obligation::new(amount, self.hub.identity.clone(), borrower.clone(), external_id);
        info!(linear_id = %iou.linear_id, amount = %iou.amount, borrower = %borrower, "issuing obligation");
        let builder = ProposalBuilder::new(self.hub.clock.now(), self.hub.config.time_window())
            .issue(self.hub.ordering.as_ref(), iou)?;
        endorse_and_finalize(&self.hub, &self.progress, &self.cancel, builder, ISSUE_FLOW).await
    }
}
