//! Notarisation and distribution of a fully endorsed transaction.

use std::time::Duration;

use covenant_ledger::{FinalizedTransaction, SignedTransaction};
use covenant_storage::VaultStorage;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::cancel::CancellationToken;
use crate::collect::abort_all;
use crate::error::FlowError;
use crate::hub::ServiceHub;
use crate::session::{FlowMessage, FlowSession};
use crate::vault::record_finalized;

/// Order `stx` with its notary, record it locally, then send it to every
/// session in creation order.
///
/// If ordering fails every session receives `Abort`. Once the notary has
/// ordered the transaction it is final: it is sent to every session even if
/// the local record fails, and that storage error is returned afterwards. A
/// counterparty that fails to acknowledge is only logged.
pub async fn finalize<S: VaultStorage>(
    hub: &ServiceHub<S>,
    stx: SignedTransaction,
    sessions: &mut [FlowSession],
    cancel: &CancellationToken,
) -> Result<FinalizedTransaction, FlowError> {
    let ftx = match notarise(hub, &stx, cancel).await {
        Ok(ftx) => ftx,
        Err(e) => {
            warn!(tx_id = %stx.id(), error = %e, "finality failed");
            abort_all(sessions, &e.to_string()).await;
            return Err(e);
        }
    };

    let recorded =
        record_finalized(hub.vault.as_ref(), &ftx, &hub.identity, hub.clock.now()).await;
    if let Err(e) = &recorded {
        error!(tx_id = %ftx.id(), sequence = ftx.sequence, error = %e, "notarised transaction not recorded locally");
    }
    distribute(&ftx, sessions, hub.config.finality_timeout()).await;
    recorded?;
    Ok(ftx)
}

async fn notarise<S: VaultStorage>(
    hub: &ServiceHub<S>,
    stx: &SignedTransaction,
    cancel: &CancellationToken,
) -> Result<FinalizedTransaction, FlowError> {
    stx.verify_required_signatures()?;
    let notary = hub
        .ordering
        .authority(&stx.tx.notary)
        .ok_or(FlowError::NoOrderingAuthority)?;
    if cancel.is_cancelled() {
        return Err(FlowError::Cancelled);
    }

    let ftx = notary.notarise(stx).await?;
    ftx.verify()?;
    info!(tx_id = %ftx.id(), sequence = ftx.sequence, notary = %ftx.notary, "transaction notarised");
    Ok(ftx)
}

async fn distribute(ftx: &FinalizedTransaction, sessions: &mut [FlowSession], timeout: Duration) {
    let message = FlowMessage::Finalized {
        transaction: ftx.clone(),
    };
    let mut delivered = Vec::with_capacity(sessions.len());
    for session in sessions.iter() {
        match session.send(&message).await {
            Ok(()) => delivered.push(true),
            Err(e) => {
                warn!(tx_id = %ftx.id(), party = %session.counterparty(), error = %e, "finalized transaction not delivered");
                delivered.push(false);
            }
        }
    }

    let acks = join_all(
        sessions
            .iter_mut()
            .zip(delivered)
            .filter(|(_, delivered)| *delivered)
            .map(|(session, _)| async move {
                let reply = session.receive(timeout).await;
                (session.counterparty().name.clone(), reply)
            }),
    )
    .await;

    for (party, reply) in acks {
        match reply {
            Ok(FlowMessage::FinalityAck) => {
                debug!(tx_id = %ftx.id(), party = %party, "finality acknowledged")
            }
            Ok(other) => warn!(
                tx_id = %ftx.id(),
                party = %party,
                message = other.label(),
                "unexpected reply to finalized transaction"
            ),
            Err(e) => warn!(tx_id = %ftx.id(), party = %party, error = %e, "no finality acknowledgement"),
        }
    }
}
