//! The counterparty side of an endorsement run.

use std::sync::Arc;

use covenant_ledger::{FinalizedTransaction, SecureHash, SignedTransaction, StateAndRef};
use covenant_storage::VaultStorage;
use tracing::{debug, info, warn};

use crate::error::FlowError;
use crate::hub::ServiceHub;
use crate::policy::{PolicyRejection, ProposalView, ValidationPolicy};
use crate::session::{FlowMessage, FlowSession};
use crate::vault::record_finalized;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderState {
    AwaitingDraft,
    Validating,
    Endorsing,
    Rejecting,
    AwaitingFinality,
    Done,
}

/// How a responder run ended, when it ended cleanly.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponderOutcome {
    /// The transaction was endorsed, ordered and recorded.
    Finalized(FinalizedTransaction),
    /// This node declined to endorse.
    Rejected { reason: String },
    /// The initiator gave up.
    Aborted { reason: String },
}

/// Receives a draft, decides whether to sign it, and records the result.
///
/// ```text
/// AwaitingDraft → Validating → Endorsing → AwaitingFinality → Done
///                           ↘ Rejecting → Done
/// ```
///
/// `Abort` from the initiator ends the run from either waiting state.
/// Anything else arriving out of order is a protocol violation.
pub struct SignTransactionResponder<S: VaultStorage> {
    hub: ServiceHub<S>,
    session: FlowSession,
    policy: Arc<dyn ValidationPolicy>,
    state: ResponderState,
    draft: Option<(SignedTransaction, Vec<StateAndRef>)>,
    rejection: Option<String>,
    endorsed: Option<SecureHash>,
}

impl<S: VaultStorage> SignTransactionResponder<S> {
    pub fn new(session: FlowSession, hub: ServiceHub<S>, policy: Arc<dyn ValidationPolicy>) -> Self {
        Self {
            hub,
            session,
            policy,
            state: ResponderState::AwaitingDraft,
            draft: None,
            rejection: None,
            endorsed: None,
        }
    }

    pub fn state(&self) -> ResponderState {
        self.state
    }

    /// Drive the state machine to completion.
    pub async fn run(mut self) -> Result<ResponderOutcome, FlowError> {
        let result = self.drive().await;
        match &result {
            Ok(outcome) => {
                info!(party = %self.hub.identity, session = %self.session.id(), outcome = outcome_label(outcome), "responder finished")
            }
            Err(e) => {
                warn!(party = %self.hub.identity, session = %self.session.id(), state = ?self.state, error = %e, "responder failed");
                if !matches!(e, FlowError::SessionClosed(_)) {
                    let abort = FlowMessage::Abort {
                        reason: e.to_string(),
                    };
                    if let Err(e) = self.session.send(&abort).await {
                        debug!(session = %self.session.id(), error = %e, "abort not delivered");
                    }
                }
            }
        }
        result
    }

    fn transition(&mut self, next: ResponderState) {
        debug!(session = %self.session.id(), from = ?self.state, to = ?next, "responder transition");
        self.state = next;
    }

    fn finish(&mut self, outcome: ResponderOutcome) -> Result<ResponderOutcome, FlowError> {
        self.transition(ResponderState::Done);
        Ok(outcome)
    }

    async fn drive(&mut self) -> Result<ResponderOutcome, FlowError> {
        loop {
            match self.state {
                ResponderState::AwaitingDraft => {
                    let timeout = self.hub.config.session_timeout();
                    match self.session.receive(timeout).await? {
                        FlowMessage::Proposal {
                            transaction,
                            input_states,
                        } => {
                            self.draft = Some((transaction, input_states));
                            self.transition(ResponderState::Validating);
                        }
                        FlowMessage::Abort { reason } => {
                            return self.finish(ResponderOutcome::Aborted { reason })
                        }
                        FlowMessage::Finalized { .. } => {
                            return Err(FlowError::ProtocolViolation(
                                "finalized transaction received before endorsing".to_string(),
                            ))
                        }
                        other => {
                            return Err(FlowError::ProtocolViolation(format!(
                                "expected a proposal, got {}",
                                other.label()
                            )))
                        }
                    }
                }

                ResponderState::Validating => {
                    let verdict = match &self.draft {
                        Some((stx, inputs)) => self.validate(stx, inputs).await,
                        None => Err(PolicyRejection::new("no proposal received")),
                    };
                    match verdict {
                        Ok(()) => self.transition(ResponderState::Endorsing),
                        Err(rejection) => {
                            self.rejection = Some(rejection.0);
                            self.transition(ResponderState::Rejecting);
                        }
                    }
                }

                ResponderState::Endorsing => {
                    let tx_id = match &self.draft {
                        Some((stx, _)) => stx.id(),
                        None => {
                            return Err(FlowError::ProtocolViolation(
                                "no proposal to endorse".to_string(),
                            ))
                        }
                    };
                    let signature = self.hub.keys.sign(&tx_id);
                    self.session
                        .send(&FlowMessage::Endorsement { signature })
                        .await?;
                    info!(tx_id = %tx_id, party = %self.hub.identity, "proposal endorsed");
                    self.endorsed = Some(tx_id);
                    self.transition(ResponderState::AwaitingFinality);
                }

                ResponderState::Rejecting => {
                    let reason = self.rejection.take().unwrap_or_default();
                    info!(party = %self.hub.identity, reason = %reason, "proposal rejected");
                    self.session
                        .send(&FlowMessage::Rejected {
                            reason: reason.clone(),
                        })
                        .await?;
                    return self.finish(ResponderOutcome::Rejected { reason });
                }

                ResponderState::AwaitingFinality => {
                    let timeout = self.hub.config.finality_timeout();
                    match self.session.receive(timeout).await? {
                        FlowMessage::Finalized { transaction } => {
                            self.accept_finalized(&transaction).await?;
                            return self.finish(ResponderOutcome::Finalized(transaction));
                        }
                        FlowMessage::Abort { reason } => {
                            return self.finish(ResponderOutcome::Aborted { reason })
                        }
                        FlowMessage::Proposal { .. } => {
                            return Err(FlowError::ProtocolViolation(
                                "second proposal received after endorsing".to_string(),
                            ))
                        }
                        other => {
                            return Err(FlowError::ProtocolViolation(format!(
                                "expected a finalized transaction, got {}",
                                other.label()
                            )))
                        }
                    }
                }

                ResponderState::Done => {
                    return Err(FlowError::ProtocolViolation(
                        "responder has already finished".to_string(),
                    ))
                }
            }
        }
    }

    /// Mechanical checks first, then the configured policy.
    async fn validate(
        &self,
        stx: &SignedTransaction,
        inputs: &[StateAndRef],
    ) -> Result<(), PolicyRejection> {
        let proposer = self.session.counterparty();
        let our_key = self.hub.identity.owning_key;

        stx.verify_signatures_except(&stx.missing_signers())
            .map_err(|e| PolicyRejection::new(format!("invalid signatures: {}", e)))?;
        if !stx.signers().contains(&proposer.owning_key) {
            return Err(PolicyRejection::new(format!(
                "proposal is not signed by its proposer {}",
                proposer
            )));
        }
        if !stx.tx.required_signers().contains(&our_key) {
            return Err(PolicyRejection::new(format!(
                "{} is not a required signer",
                self.hub.identity
            )));
        }
        let ledger = stx.tx.to_ledger_transaction(inputs).map_err(|e| {
            PolicyRejection::new(format!("input records do not match the draft: {}", e))
        })?;

        let view = ProposalView {
            signed: stx,
            ledger: &ledger,
            proposer,
            contract: self.hub.contract.as_ref(),
        };
        self.policy.check(&view).await.map_err(|rejection| {
            debug!(policy = self.policy.name(), reason = %rejection, "policy declined proposal");
            rejection
        })
    }

    async fn accept_finalized(&mut self, ftx: &FinalizedTransaction) -> Result<(), FlowError> {
        let endorsed = self.endorsed.as_ref().ok_or_else(|| {
            FlowError::ProtocolViolation("finalized transaction received before endorsing".into())
        })?;
        let tx_id = ftx.id();
        if tx_id != *endorsed {
            return Err(FlowError::ProtocolViolation(format!(
                "finalized transaction {} does not match the endorsed draft {}",
                tx_id.short(),
                endorsed.short()
            )));
        }
        ftx.verify()?;
        record_finalized(
            self.hub.vault.as_ref(),
            ftx,
            &self.hub.identity,
            self.hub.clock.now(),
        )
        .await?;
        if let Err(e) = self.session.send(&FlowMessage::FinalityAck).await {
            warn!(tx_id = %tx_id, error = %e, "finality acknowledgement not delivered");
        }
        info!(tx_id = %tx_id, sequence = ftx.sequence, party = %self.hub.identity, "finalized transaction recorded");
        Ok(())
    }
}

fn outcome_label(outcome: &ResponderOutcome) -> &'static str {
    match outcome {
        ResponderOutcome::Finalized(_) => "finalized",
        ResponderOutcome::Rejected { .. } => "rejected",
        ResponderOutcome::Aborted { .. } => "aborted",
    }
}
