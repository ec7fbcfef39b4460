//! Contract rules: the legality check for a proposed transition.

use std::collections::BTreeSet;

use crate::identity::PublicKey;
use crate::transaction::{Command, CommandKind, LedgerTransaction};

/// A broken contract rule. Carries a human-readable description of the
/// requirement that failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("contract rule violated: {rule}")]
pub struct ContractViolation {
    pub rule: String,
}

impl ContractViolation {
    pub fn new(rule: impl Into<String>) -> Self {
        Self { rule: rule.into() }
    }
}

/// Domain-specific transition rules, evaluated without any I/O.
pub trait Contract: Send + Sync {
    fn verify(&self, tx: &LedgerTransaction) -> Result<(), ContractViolation>;
}

fn require(condition: bool, rule: &str) -> Result<(), ContractViolation> {
    if condition {
        Ok(())
    } else {
        Err(ContractViolation::new(rule))
    }
}

/// Rules for issuing and transferring [`Obligation`](crate::Obligation)s.
#[derive(Debug, Clone, Copy, Default)]
pub struct IouContract;

impl IouContract {
    fn verify_issue(tx: &LedgerTransaction, command: &Command) -> Result<(), ContractViolation> {
        require(
            tx.inputs.is_empty(),
            "no inputs should be consumed when issuing an IOU",
        )?;
        require(
            tx.outputs.len() == 1,
            "only one output state should be created when issuing an IOU",
        )?;
        let iou = &tx.outputs[0];
        require(
            iou.amount.is_positive(),
            "a newly issued IOU must have a positive amount",
        )?;
        require(
            iou.lender.owning_key != iou.borrower.owning_key,
            "the lender and borrower cannot have the same identity",
        )?;
        require(
            command.signers == iou.participant_keys(),
            "both lender and borrower together only may sign the IOU issue transaction",
        )
    }

    fn verify_transfer(tx: &LedgerTransaction, command: &Command) -> Result<(), ContractViolation> {
        require(
            tx.inputs.len() == 1,
            "an IOU transfer transaction should only consume one input state",
        )?;
        require(
            tx.outputs.len() == 1,
            "an IOU transfer transaction should only create one output state",
        )?;
        let input = &tx.inputs[0].state.data;
        let output = &tx.outputs[0];
        require(
            input.linear_id == output.linear_id,
            "the transferred IOU must keep its linear id",
        )?;
        require(
            input.amount == output.amount,
            "only the lender may change when transferring an IOU",
        )?;
        require(
            input.borrower == output.borrower,
            "the borrower may not change when transferring an IOU",
        )?;
        require(
            input.lender.owning_key != output.lender.owning_key,
            "the lender property must change in a transfer",
        )?;
        require(
            output.lender.owning_key != output.borrower.owning_key,
            "the new lender cannot be the borrower",
        )?;
        let expected: BTreeSet<PublicKey> = input
            .participant_keys()
            .union(&output.participant_keys())
            .copied()
            .collect();
        require(
            command.signers == expected,
            "the borrower, old lender and new lender only must sign an IOU transfer transaction",
        )
    }
}

impl Contract for IouContract {
    fn verify(&self, tx: &LedgerTransaction) -> Result<(), ContractViolation> {
        require(
            tx.commands.len() == 1,
            "an IOU transaction carries exactly one command",
        )?;
        require(
            tx.time_window.is_some(),
            "an IOU transaction must carry a time window",
        )?;
        require(
            tx.inputs.iter().all(|i| i.state.notary == tx.notary),
            "inputs must be governed by the transaction's notary",
        )?;
        let command = &tx.commands[0];
        match command.kind {
            CommandKind::Issue => Self::verify_issue(tx, command),
            CommandKind::Transfer => Self::verify_transfer(tx, command),
        }
    }
}
