//! End-to-end transfer runs: three signers, one consumed input.

mod common;

use std::sync::Arc;

use common::{usd, TestNetwork};
use covenant_flows::policy::VerifyContract;
use covenant_flows::vault::{finalized_transactions, unconsumed_states};
use covenant_flows::{ErrorKind, FlowError, ResponderOutcome};
use covenant_ledger::{SecureHash, UniqueIdentifier};
use covenant_storage::{StateStatus, VaultStorage};

#[tokio::test]
async fn transfer_moves_the_obligation_to_the_new_lender() {
    let net = TestNetwork::new();
    let a = net.node("A");
    let b = net.node("B");
    let c = net.node("C");
    for node in [&b, &c] {
        node.register_iou_responders(Arc::new(VerifyContract));
    }

    let issued = a.issue(usd("250"), "B", Some("T-1".into())).await.unwrap();
    let linear_id = issued.transaction.tx.outputs[0].linear_id.clone();
    let moved = a.transfer(&linear_id, "C").await.unwrap();

    assert_eq!(moved.sequence, 2);
    assert_eq!(moved.transaction.sigs().len(), 3);
    assert_eq!(moved.transaction.tx.inputs, vec![issued.transaction.tx.output_ref(0)]);
    let output = &moved.transaction.tx.outputs[0];
    assert_eq!(output.lender, *c.identity());
    assert_eq!(output.borrower, *b.identity());
    assert_eq!(output.linear_id, linear_id);

    // A no longer takes part in the record.
    assert!(unconsumed_states(a.vault()).await.unwrap().is_empty());
    let consumed = a.vault().list_states(StateStatus::Consumed).await.unwrap();
    assert_eq!(consumed.len(), 1);
    assert_eq!(consumed[0].consumed_by.as_deref(), Some(moved.id().as_str()));

    // B held the old version and holds the new one.
    let held = unconsumed_states(b.vault()).await.unwrap();
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].state.data, *output);
    assert_eq!(b.vault().list_states(StateStatus::Consumed).await.unwrap().len(), 1);

    // C never saw the issue but records the transfer.
    let held = unconsumed_states(c.vault()).await.unwrap();
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].state.data.lender, *c.identity());
    assert_eq!(finalized_transactions(c.vault()).await.unwrap(), vec![moved.clone()]);

    let outcomes = c.drain_responders().await;
    assert!(matches!(&outcomes[..], [Ok(ResponderOutcome::Finalized(t))] if *t == moved));
    let outcomes = b.drain_responders().await;
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| matches!(o, Ok(ResponderOutcome::Finalized(_)))));
}

#[tokio::test]
async fn only_the_lender_may_transfer() {
    let net = TestNetwork::new();
    let a = net.node("A");
    let b = net.node("B");
    let c = net.node("C");
    for node in [&b, &c] {
        node.register_iou_responders(Arc::new(VerifyContract));
    }

    let issued = a.issue(usd("10"), "B", None).await.unwrap();
    let linear_id = issued.transaction.tx.outputs[0].linear_id.clone();

    let err = b.transfer(&linear_id, "C").await.unwrap_err();
    assert!(matches!(err, FlowError::InvalidTransition(_)), "{err:?}");
    assert!(c.drain_responders().await.is_empty());
}

#[tokio::test]
async fn unknown_record_fails_before_any_session() {
    let net = TestNetwork::new();
    let a = net.node("A");
    let c = net.node("C");
    c.register_iou_responders(Arc::new(VerifyContract));

    let err = a
        .transfer(&UniqueIdentifier::new(None), "C")
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::RecordNotFound(_)));
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert!(c.drain_responders().await.is_empty());
}

#[tokio::test]
async fn duplicate_unconsumed_versions_are_ambiguous() {
    let net = TestNetwork::new();
    let a = net.node("A");
    let b = net.node("B");
    let c = net.node("C");
    b.register_iou_responders(Arc::new(VerifyContract));
    c.register_iou_responders(Arc::new(VerifyContract));

    let issued = a.issue(usd("10"), "B", None).await.unwrap();
    let linear_id = issued.transaction.tx.outputs[0].linear_id.clone();

    let mut copy = a.vault().list_states(StateStatus::Unconsumed).await.unwrap().remove(0);
    copy.tx_id = SecureHash::sha256(b"duplicate").to_string();
    let mut snapshot = a.vault().begin_snapshot().await.unwrap();
    a.vault().insert_state(&mut snapshot, copy).await.unwrap();
    a.vault().commit_snapshot(snapshot).await.unwrap();

    let err = a.transfer(&linear_id, "C").await.unwrap_err();
    assert!(matches!(err, FlowError::AmbiguousRecord { count: 2, .. }), "{err:?}");
    assert!(c.drain_responders().await.is_empty());
}

#[tokio::test]
async fn concurrent_transfers_of_one_record_have_one_winner() {
    let net = TestNetwork::new();
    let a = net.node("A");
    let b = net.node("B");
    let c = net.node("C");
    let d = net.node("D");
    for node in [&b, &c, &d] {
        node.register_iou_responders(Arc::new(VerifyContract));
    }

    let issued = a.issue(usd("75"), "B", None).await.unwrap();
    let linear_id = issued.transaction.tx.outputs[0].linear_id.clone();

    let (to_c, to_d) = tokio::join!(a.transfer(&linear_id, "C"), a.transfer(&linear_id, "D"));
    let results = [to_c, to_d];
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "{results:?}");
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(loser.kind(), ErrorKind::OrderingConflict, "{loser:?}");
    assert_eq!(net.notary.committed_count().await, 2);

    // The borrower holds exactly one successor.
    let held = unconsumed_states(b.vault()).await.unwrap();
    assert_eq!(held.len(), 1);
    assert_ne!(held[0].state.data.lender, *a.identity());
}
