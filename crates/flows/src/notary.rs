//! Ordering service: the neutral authority that decides which of several
//! conflicting transactions wins and stamps the winner with a sequence number.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use covenant_ledger::{FinalizedTransaction, Party, SecureHash, SignedTransaction, StateRef};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::keys::KeyManagementService;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotaryError {
    /// Some input was already spent, or the transaction itself was already
    /// ordered.
    #[error("transaction {tx_id} conflicts with earlier commits")]
    Conflict {
        tx_id: SecureHash,
        consumed: Vec<StateRef>,
    },

    #[error("notary {notary} is unreachable")]
    Unreachable { notary: String },

    /// Bad signatures, wrong notary, or a time window that does not cover
    /// the notary's clock.
    #[error("notary rejected {tx_id}: {reason}")]
    Rejected { tx_id: SecureHash, reason: String },
}

#[async_trait]
pub trait NotaryService: Send + Sync {
    fn identity(&self) -> &Party;

    async fn notarise(&self, stx: &SignedTransaction) -> Result<FinalizedTransaction, NotaryError>;
}

/// Supplies ordering authorities.
pub trait OrderingResolver: Send + Sync {
    /// Every known notary, in a stable order.
    fn notaries(&self) -> Vec<Party>;

    /// The service behind `notary`, if it is known.
    fn authority(&self, notary: &Party) -> Option<Arc<dyn NotaryService>>;
}

#[derive(Debug, Default)]
struct UniquenessIndex {
    consumed: HashMap<StateRef, SecureHash>,
    committed: HashSet<SecureHash>,
    next_sequence: u64,
}

/// A single-node notary holding its uniqueness index in memory.
pub struct InMemoryNotary {
    identity: Party,
    keys: Arc<dyn KeyManagementService>,
    clock: Arc<dyn Clock>,
    reachable: AtomicBool,
    index: Mutex<UniquenessIndex>,
}

impl InMemoryNotary {
    pub fn new(name: &str, keys: Arc<dyn KeyManagementService>, clock: Arc<dyn Clock>) -> Self {
        Self {
            identity: Party::new(name, keys.public_key()),
            keys,
            clock,
            reachable: AtomicBool::new(true),
            index: Mutex::new(UniquenessIndex {
                next_sequence: 1,
                ..Default::default()
            }),
        }
    }

    /// Simulate an outage. While unreachable every submission fails with
    /// [`NotaryError::Unreachable`] and nothing is recorded.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub async fn committed_count(&self) -> usize {
        self.index.lock().await.committed.len()
    }

    fn reject(tx_id: &SecureHash, reason: impl Into<String>) -> NotaryError {
        NotaryError::Rejected {
            tx_id: tx_id.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl NotaryService for InMemoryNotary {
    fn identity(&self) -> &Party {
        &self.identity
    }

    async fn notarise(&self, stx: &SignedTransaction) -> Result<FinalizedTransaction, NotaryError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(NotaryError::Unreachable {
                notary: self.identity.name.clone(),
            });
        }

        let tx_id = stx.id();
        if stx.tx.notary != self.identity {
            return Err(Self::reject(
                &tx_id,
                format!("transaction names {} as its notary", stx.tx.notary),
            ));
        }
        stx.verify_required_signatures()
            .map_err(|e| Self::reject(&tx_id, e.to_string()))?;

        let now = self.clock.now();
        match stx.tx.time_window {
            None => return Err(Self::reject(&tx_id, "transaction has no time window")),
            Some(window) if !window.contains(now) => {
                return Err(Self::reject(
                    &tx_id,
                    format!(
                        "current time {} is outside the time window [{}, {})",
                        now, window.from, window.until
                    ),
                ))
            }
            Some(_) => {}
        }

        let mut index = self.index.lock().await;
        if index.committed.contains(&tx_id) {
            warn!(tx_id = %tx_id, notary = %self.identity, "transaction already ordered");
            return Err(NotaryError::Conflict {
                tx_id,
                consumed: stx.tx.inputs.clone(),
            });
        }
        let consumed: Vec<StateRef> = stx
            .tx
            .inputs
            .iter()
            .filter(|input| index.consumed.contains_key(*input))
            .cloned()
            .collect();
        if !consumed.is_empty() {
            warn!(tx_id = %tx_id, conflicts = consumed.len(), "double spend rejected");
            return Err(NotaryError::Conflict { tx_id, consumed });
        }

        let sequence = index.next_sequence;
        index.next_sequence += 1;
        for input in &stx.tx.inputs {
            index.consumed.insert(input.clone(), tx_id.clone());
        }
        index.committed.insert(tx_id.clone());
        drop(index);

        let attestation = self
            .keys
            .sign_payload(&FinalizedTransaction::attestation_payload(&tx_id, sequence));
        info!(tx_id = %tx_id, sequence, notary = %self.identity, "transaction ordered");
        debug!(inputs = stx.tx.inputs.len(), outputs = stx.tx.outputs.len(), "uniqueness index updated");

        Ok(FinalizedTransaction {
            transaction: stx.clone(),
            notary: self.identity.clone(),
            sequence,
            notarised_at: now,
            notary_signature: attestation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::keys::LocalKeyStore;
    use covenant_ledger::{Amount, CommandKind, Obligation, TransactionBuilder};
    use std::time::Duration;
    use time::macros::datetime;

    struct Fixture {
        notary: InMemoryNotary,
        clock: Arc<FixedClock>,
        lender: LocalKeyStore,
        borrower: LocalKeyStore,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(FixedClock::new(datetime!(2026-05-01 09:00 UTC)));
        let notary = InMemoryNotary::new("Notary", Arc::new(LocalKeyStore::generate()), clock.clone());
        Fixture {
            notary,
            clock,
            lender: LocalKeyStore::generate(),
            borrower: LocalKeyStore::generate(),
        }
    }

    fn issue(f: &Fixture, sign_both: bool) -> SignedTransaction {
        let lender = Party::new("A", f.lender.public_key());
        let borrower = Party::new("B", f.borrower.public_key());
        let iou = Obligation::new(Amount::parse("10 USD").unwrap(), lender, borrower, None);
        let signers = iou.participant_keys();
        let wire = TransactionBuilder::new(f.notary.identity().clone())
            .add_output_state(iou)
            .add_command(CommandKind::Issue, signers)
            .set_time_window(f.clock.now(), Duration::from_secs(60))
            .unwrap()
            .to_wire_transaction();
        let id = wire.id();
        let mut sigs = vec![f.lender.sign(&id)];
        if sign_both {
            sigs.push(f.borrower.sign(&id));
        }
        SignedTransaction::new(wire, sigs)
    }

    #[tokio::test]
    async fn orders_fully_signed_transaction() {
        let f = fixture();
        let stx = issue(&f, true);
        let finalized = f.notary.notarise(&stx).await.unwrap();
        assert_eq!(finalized.sequence, 1);
        assert_eq!(finalized.id(), stx.id());
        finalized.verify().unwrap();
    }

    #[tokio::test]
    async fn resubmission_is_a_conflict() {
        let f = fixture();
        let stx = issue(&f, true);
        f.notary.notarise(&stx).await.unwrap();
        let err = f.notary.notarise(&stx).await.unwrap_err();
        assert!(matches!(err, NotaryError::Conflict { .. }), "{err:?}");
        assert_eq!(f.notary.committed_count().await, 1);
    }

    #[tokio::test]
    async fn missing_signature_is_rejected() {
        let f = fixture();
        let err = f.notary.notarise(&issue(&f, false)).await.unwrap_err();
        assert!(matches!(err, NotaryError::Rejected { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn expired_time_window_is_rejected() {
        let f = fixture();
        let stx = issue(&f, true);
        f.clock.advance(Duration::from_secs(61));
        match f.notary.notarise(&stx).await {
            Err(NotaryError::Rejected { reason, .. }) => assert!(reason.contains("time window")),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn spending_an_input_twice_conflicts() {
        let f = fixture();
        let issued = f.notary.notarise(&issue(&f, true)).await.unwrap();
        let input = issued.transaction.tx.output_states().remove(0);

        let spend = |name: &str| {
            let new_lender_key = LocalKeyStore::generate();
            let out = input
                .state
                .data
                .with_new_lender(Party::new(name, new_lender_key.public_key()));
            let mut signers = input.state.data.participant_keys();
            signers.extend(out.participant_keys());
            let wire = TransactionBuilder::new(f.notary.identity().clone())
                .add_input_state(input.clone())
                .add_output_state(out)
                .add_command(CommandKind::Transfer, signers)
                .set_time_window(f.clock.now(), Duration::from_secs(60))
                .unwrap()
                .to_wire_transaction();
            let id = wire.id();
            let sigs = vec![
                f.lender.sign(&id),
                f.borrower.sign(&id),
                new_lender_key.sign(&id),
            ];
            SignedTransaction::new(wire, sigs)
        };

        let first = spend("C");
        let second = spend("D");
        assert_ne!(first.id(), second.id());

        let winner = f.notary.notarise(&first).await.unwrap();
        assert_eq!(winner.sequence, 2);
        match f.notary.notarise(&second).await.unwrap_err() {
            NotaryError::Conflict { consumed, .. } => assert_eq!(consumed, vec![input.reference]),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_notary_records_nothing() {
        let f = fixture();
        f.notary.set_reachable(false);
        let err = f.notary.notarise(&issue(&f, true)).await.unwrap_err();
        assert!(matches!(err, NotaryError::Unreachable { .. }));
        assert_eq!(f.notary.committed_count().await, 0);
    }
}
