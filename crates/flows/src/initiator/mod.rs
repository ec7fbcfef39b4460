//! Initiator flows.
//!
//! Every initiator follows the same run once its draft is built: verify the
//! draft locally, sign it, open one session per counterparty, collect their
//! endorsements, then notarise and distribute. Only draft construction
//! differs between workflows.

mod issue;
mod transfer;

pub use issue::{IssueFlow, ISSUE_FLOW};
pub use transfer::{TransferFlow, TRANSFER_FLOW};

use std::collections::BTreeSet;

use covenant_ledger::{FinalizedTransaction, LedgerTransaction, Party, SignedTransaction, TransactionBuilder};
use covenant_storage::VaultStorage;
use tracing::{info, warn};

use crate::cancel::CancellationToken;
use crate::collect::{abort_all, collect_signatures};
use crate::error::FlowError;
use crate::finality::finalize;
use crate::hub::ServiceHub;
use crate::progress::{ProgressStep, ProgressTracker};
use crate::session::FlowSession;
use crate::verify::verify_locally;

/// Participants of every input and output other than `us`, in first-seen
/// order.
fn counterparties(ltx: &LedgerTransaction, us: &Party) -> Vec<Party> {
    let mut seen = BTreeSet::from([us.owning_key]);
    let inputs = ltx.inputs.iter().map(|input| &input.state.data);
    let mut parties = Vec::new();
    for record in inputs.chain(ltx.outputs.iter()) {
        for party in record.participants() {
            if seen.insert(party.owning_key) {
                parties.push(party.clone());
            }
        }
    }
    parties
}

async fn open_sessions<S: VaultStorage>(
    hub: &ServiceHub<S>,
    parties: &[Party],
    flow_tag: &str,
) -> Result<Vec<FlowSession>, FlowError> {
    let mut sessions = Vec::with_capacity(parties.len());
    for party in parties {
        match hub.transport.open(&hub.identity, party, flow_tag).await {
            Ok(session) => sessions.push(session),
            Err(e) => {
                abort_all(&sessions, &e.to_string()).await;
                return Err(e);
            }
        }
    }
    Ok(sessions)
}

/// Take a built draft through local verification, endorsement and finality.
pub(crate) async fn endorse_and_finalize<S: VaultStorage>(
    hub: &ServiceHub<S>,
    progress: &ProgressTracker,
    cancel: &CancellationToken,
    builder: TransactionBuilder,
    flow_tag: &str,
) -> Result<FinalizedTransaction, FlowError> {
    let ltx = verify_locally(hub.contract.as_ref(), &builder)?;
    if cancel.is_cancelled() {
        return Err(FlowError::Cancelled);
    }

    progress.set(ProgressStep::Signing);
    let wtx = builder.to_wire_transaction();
    let partial = SignedTransaction::new(wtx.clone(), vec![hub.keys.sign(&wtx.id())]);

    progress.set(ProgressStep::Collecting);
    let parties = counterparties(&ltx, &hub.identity);
    let mut sessions = open_sessions(hub, &parties, flow_tag).await?;
    let signed = collect_signatures(
        partial,
        builder.input_states(),
        &mut sessions,
        hub.identity.owning_key,
        hub.config.session_timeout(),
        cancel,
    )
    .await?;

    progress.set(ProgressStep::Finalising);
    let result = finalize(hub, signed, &mut sessions, cancel).await;
    for session in &mut sessions {
        session.close();
    }
    let ftx = result?;
    progress.set(ProgressStep::Done);
    info!(tx_id = %ftx.id(), flow = flow_tag, sequence = ftx.sequence, "flow complete");
    Ok(ftx)
}

/// Log a failed run in one place.
pub(crate) fn log_failure(flow_tag: &str, party: &Party, error: &FlowError) {
    warn!(flow = flow_tag, party = %party, kind = ?error.kind(), error = %error, "flow failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{KeyManagementService, LocalKeyStore};
    use covenant_ledger::{Amount, Obligation, StateAndRef, StateRef, TransactionState, SecureHash};

    fn party(name: &str) -> Party {
        Party::new(name, LocalKeyStore::generate().public_key())
    }

    #[test]
    fn counterparties_are_deduplicated_and_exclude_us() {
        let (a, b, c, notary) = (party("A"), party("B"), party("C"), party("N"));
        let amount = Amount::parse("10 USD").unwrap();
        let iou = Obligation::new(amount, a.clone(), b.clone(), None);
        let input = StateAndRef {
            state: TransactionState {
                data: iou.clone(),
                notary: notary.clone(),
            },
            reference: StateRef {
                txhash: SecureHash::sha256(b"issue"),
                index: 0,
            },
        };
        let ltx = TransactionBuilder::new(notary)
            .add_input_state(input)
            .add_output_state(iou.with_new_lender(c.clone()))
            .to_ledger_transaction();

        assert_eq!(counterparties(&ltx, &a), vec![b.clone(), c.clone()]);
        assert_eq!(counterparties(&ltx, &c), vec![a, b]);
    }
}
