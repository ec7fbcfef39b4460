//! AllOf: every inner policy must accept.

use std::sync::Arc;

use async_trait::async_trait;

use super::{PolicyRejection, ProposalView, ValidationPolicy};

/// Runs the inner policies in order and stops at the first rejection.
///
/// Common composition: `VerifyContract` first, then business limits such as
/// `MaxAmount`.
pub struct AllOf {
    policies: Vec<Arc<dyn ValidationPolicy>>,
}

impl AllOf {
    pub fn new(policies: Vec<Arc<dyn ValidationPolicy>>) -> Self {
        Self { policies }
    }
}

#[async_trait]
impl ValidationPolicy for AllOf {
    fn name(&self) -> &str {
        "all-of"
    }

    async fn check(&self, proposal: &ProposalView<'_>) -> Result<(), PolicyRejection> {
        for policy in &self.policies {
            policy.check(proposal).await.map_err(|rejection| {
                tracing::debug!(policy = policy.name(), reason = %rejection, "policy declined");
                rejection
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{KeyManagementService, LocalKeyStore};
    use crate::policy::{AcceptAll, MaxAmount, RejectAll, VerifyContract};
    use covenant_ledger::{
        Amount, CommandKind, IouContract, Obligation, Party, SignedTransaction, TransactionBuilder,
    };
    use rust_decimal::Decimal;
    use std::time::Duration;
    use time::macros::datetime;

    struct Draft {
        signed: SignedTransaction,
        ledger: covenant_ledger::LedgerTransaction,
        proposer: Party,
    }

    fn draft(amount: &str) -> Draft {
        let lender = Party::new("A", LocalKeyStore::generate().public_key());
        let borrower = Party::new("B", LocalKeyStore::generate().public_key());
        let notary = Party::new("Notary", LocalKeyStore::generate().public_key());
        let iou = Obligation::new(Amount::parse(amount).unwrap(), lender.clone(), borrower, None);
        let signers = iou.participant_keys();
        let builder = TransactionBuilder::new(notary)
            .add_output_state(iou)
            .add_command(CommandKind::Issue, signers)
            .set_time_window(datetime!(2026-02-01 00:00 UTC), Duration::from_secs(300))
            .unwrap();
        Draft {
            signed: SignedTransaction::new(builder.to_wire_transaction(), vec![]),
            ledger: builder.to_ledger_transaction(),
            proposer: lender,
        }
    }

    fn view<'a>(d: &'a Draft, contract: &'a IouContract) -> ProposalView<'a> {
        ProposalView {
            signed: &d.signed,
            ledger: &d.ledger,
            proposer: &d.proposer,
            contract,
        }
    }

    #[tokio::test]
    async fn all_of_accepts_when_every_policy_accepts() {
        let d = draft("100 USD");
        let policy = AllOf::new(vec![
            Arc::new(AcceptAll),
            Arc::new(VerifyContract),
            Arc::new(MaxAmount::new(Decimal::new(1000, 0))),
        ]);
        policy.check(&view(&d, &IouContract)).await.unwrap();
    }

    #[tokio::test]
    async fn all_of_reports_first_rejection() {
        let d = draft("5000 USD");
        let policy = AllOf::new(vec![
            Arc::new(MaxAmount::new(Decimal::new(1000, 0))),
            Arc::new(RejectAll::default()),
        ]);
        let rejection = policy.check(&view(&d, &IouContract)).await.unwrap_err();
        assert_eq!(rejection.0, "amount 5000 USD exceeds the limit of 1000");
    }

    #[tokio::test]
    async fn verify_contract_surfaces_rule() {
        let d = draft("0 USD");
        let rejection = VerifyContract
            .check(&view(&d, &IouContract))
            .await
            .unwrap_err();
        assert!(rejection.0.contains("positive amount"), "{rejection}");
    }
}
