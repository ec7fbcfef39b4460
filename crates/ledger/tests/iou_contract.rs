//! IOU contract rules for issue and transfer transitions.

use std::collections::BTreeSet;
use std::time::Duration;

use covenant_ledger::{
    Amount, CommandKind, Contract, IouContract, LedgerTransaction, Obligation, Party, PublicKey,
    StateAndRef, TransactionBuilder,
};
use ed25519_dalek::SigningKey;
use time::macros::datetime;

fn party(name: &str) -> Party {
    let mut rng = rand::rngs::OsRng;
    Party::new(
        name,
        PublicKey::from(SigningKey::generate(&mut rng).verifying_key()),
    )
}

fn builder(notary: &Party) -> TransactionBuilder {
    TransactionBuilder::new(notary.clone())
        .set_time_window(datetime!(2026-03-01 12:00 UTC), Duration::from_secs(300))
        .unwrap()
}

fn issue(amount: &str, lender: &Party, borrower: &Party, notary: &Party) -> LedgerTransaction {
    let iou = Obligation::new(
        Amount::parse(amount).unwrap(),
        lender.clone(),
        borrower.clone(),
        Some("X-1".to_string()),
    );
    let signers = iou.participant_keys();
    builder(notary)
        .add_output_state(iou)
        .add_command(CommandKind::Issue, signers)
        .to_ledger_transaction()
}

fn issued_state(lender: &Party, borrower: &Party, notary: &Party) -> StateAndRef {
    let iou = Obligation::new(
        Amount::parse("100 USD").unwrap(),
        lender.clone(),
        borrower.clone(),
        Some("X-1".to_string()),
    );
    let signers = iou.participant_keys();
    builder(notary)
        .add_output_state(iou)
        .add_command(CommandKind::Issue, signers)
        .to_wire_transaction()
        .output_states()
        .remove(0)
}

fn transfer(input: &StateAndRef, new_lender: &Party, notary: &Party) -> LedgerTransaction {
    let output = input.state.data.with_new_lender(new_lender.clone());
    let signers: BTreeSet<PublicKey> = input
        .state
        .data
        .participant_keys()
        .union(&output.participant_keys())
        .copied()
        .collect();
    builder(notary)
        .add_input_state(input.clone())
        .add_output_state(output)
        .add_command(CommandKind::Transfer, signers)
        .to_ledger_transaction()
}

#[test]
fn valid_issue_passes() {
    let (a, b, n) = (party("A"), party("B"), party("Notary"));
    assert!(IouContract.verify(&issue("100 USD", &a, &b, &n)).is_ok());
}

#[test]
fn issue_with_zero_amount_fails() {
    let (a, b, n) = (party("A"), party("B"), party("Notary"));
    let err = IouContract.verify(&issue("0 USD", &a, &b, &n)).unwrap_err();
    assert!(err.rule.contains("positive amount"));
}

#[test]
fn issue_to_self_fails() {
    let (a, n) = (party("A"), party("Notary"));
    let err = IouContract.verify(&issue("10 USD", &a, &a, &n)).unwrap_err();
    assert!(err.rule.contains("same identity"));
}

#[test]
fn issue_with_ad_hoc_signers_fails() {
    let (a, b, n) = (party("A"), party("B"), party("Notary"));
    let iou = Obligation::new(Amount::parse("5 USD").unwrap(), a.clone(), b, None);
    let tx = builder(&n)
        .add_output_state(iou)
        .add_command(CommandKind::Issue, [a.owning_key].into_iter().collect())
        .to_ledger_transaction();
    let err = IouContract.verify(&tx).unwrap_err();
    assert!(err.rule.contains("must sign") || err.rule.contains("may sign"));
}

#[test]
fn issue_without_time_window_fails() {
    let (a, b, n) = (party("A"), party("B"), party("Notary"));
    let iou = Obligation::new(Amount::parse("5 USD").unwrap(), a, b, None);
    let signers = iou.participant_keys();
    let tx = TransactionBuilder::new(n)
        .add_output_state(iou)
        .add_command(CommandKind::Issue, signers)
        .to_ledger_transaction();
    let err = IouContract.verify(&tx).unwrap_err();
    assert!(err.rule.contains("time window"));
}

#[test]
fn valid_transfer_passes() {
    let (a, b, c, n) = (party("A"), party("B"), party("C"), party("Notary"));
    let input = issued_state(&a, &b, &n);
    assert!(IouContract.verify(&transfer(&input, &c, &n)).is_ok());
}

#[test]
fn transfer_to_same_lender_fails() {
    let (a, b, n) = (party("A"), party("B"), party("Notary"));
    let input = issued_state(&a, &b, &n);
    let err = IouContract.verify(&transfer(&input, &a, &n)).unwrap_err();
    assert!(err.rule.contains("lender property must change"));
}

#[test]
fn transfer_to_borrower_fails() {
    let (a, b, n) = (party("A"), party("B"), party("Notary"));
    let input = issued_state(&a, &b, &n);
    let err = IouContract.verify(&transfer(&input, &b, &n)).unwrap_err();
    assert!(err.rule.contains("cannot be the borrower"));
}

#[test]
fn transfer_changing_amount_fails() {
    let (a, b, c, n) = (party("A"), party("B"), party("C"), party("Notary"));
    let input = issued_state(&a, &b, &n);
    let mut output = input.state.data.with_new_lender(c);
    output.amount = Amount::parse("1000 USD").unwrap();
    let signers: BTreeSet<PublicKey> = input
        .state
        .data
        .participant_keys()
        .union(&output.participant_keys())
        .copied()
        .collect();
    let tx = builder(&n)
        .add_input_state(input)
        .add_output_state(output)
        .add_command(CommandKind::Transfer, signers)
        .to_ledger_transaction();
    let err = IouContract.verify(&tx).unwrap_err();
    assert!(err.rule.contains("only the lender may change"));
}

#[test]
fn transfer_of_input_under_other_notary_fails() {
    let (a, b, c, n, other) = (
        party("A"),
        party("B"),
        party("C"),
        party("Notary"),
        party("OtherNotary"),
    );
    let input = issued_state(&a, &b, &other);
    let err = IouContract.verify(&transfer(&input, &c, &n)).unwrap_err();
    assert!(err.rule.contains("notary"));
}
