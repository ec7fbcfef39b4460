//! Endorsement collection.
//!
//! The initiator sends the same draft to every counterparty session and waits
//! for all of them concurrently. There is no quorum: one rejection, timeout or
//! malformed reply fails the round and every session is told to abort.

use std::collections::BTreeSet;
use std::time::Duration;

use covenant_ledger::{PublicKey, SecureHash, SignedTransaction, StateAndRef, TransactionSignature};
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::error::FlowError;
use crate::session::{FlowMessage, FlowSession};

/// Tell every session the run is over. Failures are ignored: the peer may
/// already be gone.
pub(crate) async fn abort_all(sessions: &[FlowSession], reason: &str) {
    let message = FlowMessage::Abort {
        reason: reason.to_string(),
    };
    for session in sessions {
        if let Err(e) = session.send(&message).await {
            debug!(session = %session.id(), party = %session.counterparty(), error = %e, "abort not delivered");
        }
    }
}

/// Every session must be with a distinct required signer, and every required
/// signer other than the initiator must have a session.
fn check_coverage(
    partial: &SignedTransaction,
    sessions: &[FlowSession],
    initiator_key: &PublicKey,
) -> Result<(), FlowError> {
    let required = partial.tx.required_signers();
    if !required.contains(initiator_key) {
        return Err(FlowError::ProtocolViolation(
            "the initiator is not a required signer of its own proposal".to_string(),
        ));
    }

    let mut covered = BTreeSet::new();
    for session in sessions {
        let key = session.counterparty().owning_key;
        if !required.contains(&key) {
            return Err(FlowError::ProtocolViolation(format!(
                "session {} is with {}, who is not a required signer",
                session.id(),
                session.counterparty()
            )));
        }
        if !covered.insert(key) {
            return Err(FlowError::ProtocolViolation(format!(
                "more than one session with {}",
                session.counterparty()
            )));
        }
    }

    let uncovered: Vec<String> = required
        .iter()
        .filter(|key| *key != initiator_key && !covered.contains(*key))
        .map(|key| key.fingerprint())
        .collect();
    if !uncovered.is_empty() {
        return Err(FlowError::ProtocolViolation(format!(
            "no session for required signer(s) {}",
            uncovered.join(", ")
        )));
    }
    Ok(())
}

fn accept_reply(
    session: &FlowSession,
    tx_id: &SecureHash,
    reply: Result<FlowMessage, FlowError>,
) -> Result<TransactionSignature, FlowError> {
    let party = session.counterparty();
    match reply? {
        FlowMessage::Endorsement { signature } => {
            if signature.by != party.owning_key {
                return Err(FlowError::ProtocolViolation(format!(
                    "endorsement on session {} signed by {} instead of {}",
                    session.id(),
                    signature.by.fingerprint(),
                    party
                )));
            }
            signature.verify(tx_id).map_err(|e| {
                FlowError::ProtocolViolation(format!("invalid endorsement from {}: {}", party, e))
            })?;
            debug!(tx_id = %tx_id, party = %party, "endorsement received");
            Ok(signature)
        }
        FlowMessage::Rejected { reason } => Err(FlowError::CounterpartyRejected {
            session: session.id(),
            party: party.name.clone(),
            reason,
        }),
        FlowMessage::Abort { reason } => Err(FlowError::Aborted(reason)),
        other => Err(FlowError::ProtocolViolation(format!(
            "expected an endorsement from {}, got {}",
            party,
            other.label()
        ))),
    }
}

/// Gather an endorsement from every session for `partial`, which must already
/// carry the initiator's signature.
///
/// The returned transaction holds exactly one signature per required key.
/// Because signatures are kept sorted by key, the result does not depend on
/// the order in which replies arrive.
pub async fn collect_signatures(
    partial: SignedTransaction,
    input_states: &[StateAndRef],
    sessions: &mut [FlowSession],
    initiator_key: PublicKey,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<SignedTransaction, FlowError> {
    let tx_id = partial.id();

    let precheck = check_coverage(&partial, sessions, &initiator_key).and_then(|()| {
        let mut awaited = partial.tx.required_signers();
        awaited.remove(&initiator_key);
        partial
            .verify_signatures_except(&awaited)
            .map_err(FlowError::from)
    });
    if let Err(e) = precheck {
        warn!(tx_id = %tx_id, error = %e, "proposal not sent");
        abort_all(sessions, &e.to_string()).await;
        return Err(e);
    }
    if cancel.is_cancelled() {
        abort_all(sessions, "cancelled").await;
        return Err(FlowError::Cancelled);
    }

    info!(tx_id = %tx_id, sessions = sessions.len(), "requesting endorsements");
    let proposal = FlowMessage::Proposal {
        transaction: partial.clone(),
        input_states: input_states.to_vec(),
    };
    for session in sessions.iter() {
        if let Err(e) = session.send(&proposal).await {
            abort_all(sessions, &e.to_string()).await;
            return Err(e);
        }
    }

    let mut endorsements = Vec::with_capacity(sessions.len());
    let outcome = {
        let tx_id = &tx_id;
        let mut pending: FuturesUnordered<_> = sessions
            .iter_mut()
            .map(|session| async move {
                let reply = session.receive(timeout).await;
                accept_reply(session, tx_id, reply)
            })
            .collect();
        loop {
            tokio::select! {
                next = pending.next() => match next {
                    Some(Ok(signature)) => endorsements.push(signature),
                    Some(Err(e)) => break Err(e),
                    None => break Ok(()),
                },
                _ = cancel.cancelled() => break Err(FlowError::Cancelled),
            }
        }
    };

    if let Err(e) = outcome {
        warn!(tx_id = %tx_id, error = %e, "endorsement round failed");
        abort_all(sessions, &e.to_string()).await;
        return Err(e);
    }

    let signed = partial.with_additional_signatures(endorsements);
    signed.verify_required_signatures()?;
    info!(tx_id = %tx_id, signatures = signed.sigs().len(), "all endorsements collected");
    Ok(signed)
}
