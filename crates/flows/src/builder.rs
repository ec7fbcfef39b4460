//! Draft assembly: notary selection, record lookup and the proposal builder.

use std::time::Duration;

use covenant_ledger::{
    CommandKind, Obligation, Party, StateAndRef, TransactionBuilder, UniqueIdentifier,
};
use covenant_storage::VaultStorage;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::FlowError;
use crate::notary::OrderingResolver;
use crate::vault::unconsumed_by_linear_id;

/// The first notary the resolver knows about.
pub fn first_notary(resolver: &dyn OrderingResolver) -> Result<Party, FlowError> {
    resolver
        .notaries()
        .into_iter()
        .next()
        .ok_or(FlowError::NoOrderingAuthority)
}

/// The single unconsumed version of the record `linear_id`.
///
/// Zero matches is `RecordNotFound`; more than one is `AmbiguousRecord`,
/// which means the vault is corrupt.
pub async fn lookup_by_linear_id<S: VaultStorage>(
    vault: &S,
    linear_id: &UniqueIdentifier,
) -> Result<StateAndRef, FlowError> {
    let mut found = unconsumed_by_linear_id(vault, linear_id).await?;
    match found.len() {
        0 => Err(FlowError::RecordNotFound(linear_id.to_string())),
        1 => Ok(found.remove(0)),
        count => Err(FlowError::AmbiguousRecord {
            linear_id: linear_id.to_string(),
            count,
        }),
    }
}

/// Builds drafts for the IOU workflows.
///
/// Signers are always derived from the participants of the records the draft
/// consumes and produces. The validity window starts at `now`.
pub struct ProposalBuilder {
    now: OffsetDateTime,
    window: Duration,
}

impl ProposalBuilder {
    pub fn new(now: OffsetDateTime, window: Duration) -> Self {
        Self { now, window }
    }

    /// Issue `iou`, ordered by the first notary `resolver` knows.
    pub fn issue(
        &self,
        resolver: &dyn OrderingResolver,
        iou: Obligation,
    ) -> Result<TransactionBuilder, FlowError> {
        let notary = first_notary(resolver)?;
        let signers = iou.participant_keys();
        debug!(notary = %notary, linear_id = %iou.linear_id, "building issue proposal");
        Ok(TransactionBuilder::new(notary)
            .add_output_state(iou)
            .add_command(CommandKind::Issue, signers)
            .set_time_window(self.now, self.window)?)
    }

    /// Move `input` to `new_lender`. The draft is ordered by the notary the
    /// input is bound to, which must still be known to `resolver`.
    pub fn transfer(
        &self,
        resolver: &dyn OrderingResolver,
        input: StateAndRef,
        new_lender: Party,
    ) -> Result<TransactionBuilder, FlowError> {
        let notary = input.state.notary.clone();
        if resolver.authority(&notary).is_none() {
            return Err(FlowError::NoOrderingAuthority);
        }
        let output = input.state.data.with_new_lender(new_lender);
        let mut signers = input.state.data.participant_keys();
        signers.extend(output.participant_keys());
        debug!(notary = %notary, linear_id = %output.linear_id, input = %input.reference, "building transfer proposal");
        Ok(TransactionBuilder::new(notary)
            .add_input_state(input)
            .add_output_state(output)
            .add_command(CommandKind::Transfer, signers)
            .set_time_window(self.now, self.window)?)
    }
}
