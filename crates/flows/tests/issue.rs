//! End-to-end issue runs between in-process nodes.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{test_config, usd, TestNetwork};
use covenant_flows::policy::{RejectAll, VerifyContract};
use covenant_flows::vault::{finalized_transactions, unconsumed_states};
use covenant_flows::{
    finalize, CancellationToken, ErrorKind, FlowConfig, FlowError, IssueFlow, Node, ProgressStep,
    ResponderOutcome,
};
use covenant_ledger::LedgerError;
use covenant_storage::{
    InMemoryVault, StateRecord, StateStatus, StorageError, TransactionRecord, VaultStorage,
};

/// An in-memory vault that refuses every commit.
#[derive(Default)]
struct FullDiskVault {
    inner: InMemoryVault,
}

#[async_trait]
impl VaultStorage for FullDiskVault {
    type Snapshot = <InMemoryVault as VaultStorage>::Snapshot;

    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError> {
        self.inner.begin_snapshot().await
    }

    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError> {
        self.inner.abort_snapshot(snapshot).await?;
        Err(StorageError::Backend("disk full".into()))
    }

    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError> {
        self.inner.abort_snapshot(snapshot).await
    }

    async fn insert_transaction(
        &self,
        snapshot: &mut Self::Snapshot,
        record: TransactionRecord,
    ) -> Result<(), StorageError> {
        self.inner.insert_transaction(snapshot, record).await
    }

    async fn insert_state(
        &self,
        snapshot: &mut Self::Snapshot,
        record: StateRecord,
    ) -> Result<(), StorageError> {
        self.inner.insert_state(snapshot, record).await
    }

    async fn consume_state(
        &self,
        snapshot: &mut Self::Snapshot,
        tx_id: &str,
        output_index: u32,
        consuming_tx_id: &str,
    ) -> Result<(), StorageError> {
        self.inner
            .consume_state(snapshot, tx_id, output_index, consuming_tx_id)
            .await
    }

    async fn get_transaction(&self, tx_id: &str) -> Result<TransactionRecord, StorageError> {
        self.inner.get_transaction(tx_id).await
    }

    async fn get_state(&self, tx_id: &str, output_index: u32) -> Result<StateRecord, StorageError> {
        self.inner.get_state(tx_id, output_index).await
    }

    async fn query_states(
        &self,
        linear_id: &str,
        status: StateStatus,
    ) -> Result<Vec<StateRecord>, StorageError> {
        self.inner.query_states(linear_id, status).await
    }

    async fn list_states(&self, status: StateStatus) -> Result<Vec<StateRecord>, StorageError> {
        self.inner.list_states(status).await
    }

    async fn list_transactions(&self) -> Result<Vec<TransactionRecord>, StorageError> {
        self.inner.list_transactions().await
    }
}

#[tokio::test]
async fn issue_is_recorded_identically_by_both_parties() {
    let net = TestNetwork::new();
    let a = net.node("A");
    let b = net.node("B");
    b.register_iou_responders(Arc::new(VerifyContract));

    let ftx = a.issue(usd("100"), "B", Some("X-1".into())).await.unwrap();

    let outcomes = b.drain_responders().await;
    assert!(
        matches!(&outcomes[..], [Ok(ResponderOutcome::Finalized(t))] if *t == ftx),
        "{outcomes:?}"
    );

    assert_eq!(ftx.sequence, 1);
    assert!(ftx.transaction.tx.inputs.is_empty());
    assert_eq!(ftx.transaction.tx.outputs.len(), 1);
    assert_eq!(ftx.transaction.sigs().len(), 2);
    ftx.verify().unwrap();

    let iou = &ftx.transaction.tx.outputs[0];
    assert_eq!(iou.lender, *a.identity());
    assert_eq!(iou.borrower, *b.identity());
    assert_eq!(iou.amount, usd("100"));
    assert_eq!(iou.linear_id.external_id.as_deref(), Some("X-1"));

    for vault in [a.vault(), b.vault()] {
        assert_eq!(finalized_transactions(vault).await.unwrap(), vec![ftx.clone()]);
        let states = unconsumed_states(vault).await.unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].state.data, *iou);
        assert_eq!(states[0].reference, ftx.transaction.tx.output_ref(0));
    }
}

#[tokio::test]
async fn issue_flow_reports_progress() {
    let net = TestNetwork::new();
    let a = net.node("A");
    let b = net.node("B");
    b.register_iou_responders(Arc::new(VerifyContract));

    let flow = IssueFlow::new(a.hub().clone());
    let mut steps = flow.progress().subscribe();
    assert_eq!(*steps.borrow_and_update(), ProgressStep::Initialising);

    flow.call(usd("5"), b.identity(), None).await.unwrap();
    assert_eq!(flow.progress().current(), ProgressStep::Done);
    assert!(steps.has_changed().unwrap());
}

#[tokio::test]
async fn rejection_leaves_every_vault_untouched() {
    let net = TestNetwork::new();
    let a = net.node("A");
    let b = net.node("B");
    b.register_iou_responders(Arc::new(RejectAll::default()));

    let err = a.issue(usd("100"), "B", None).await.unwrap_err();
    match &err {
        FlowError::CounterpartyRejected { party, reason, .. } => {
            assert_eq!(party, "B");
            assert_eq!(reason, "this node does not endorse proposals");
        }
        other => panic!("expected CounterpartyRejected, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Protocol);

    let outcomes = b.drain_responders().await;
    assert!(matches!(&outcomes[..], [Ok(ResponderOutcome::Rejected { .. })]));
    assert_eq!(net.notary.committed_count().await, 0);
    assert!(finalized_transactions(a.vault()).await.unwrap().is_empty());
    assert!(finalized_transactions(b.vault()).await.unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_notary_aborts_the_responder() {
    let net = TestNetwork::new();
    let a = net.node("A");
    let b = net.node("B");
    b.register_iou_responders(Arc::new(VerifyContract));
    net.notary.set_reachable(false);

    let err = a.issue(usd("100"), "B", None).await.unwrap_err();
    assert!(matches!(err, FlowError::OrderingUnreachable { ref notary } if notary == "Notary"));
    assert_eq!(err.kind(), ErrorKind::OrderingUnreachable);

    let outcomes = b.drain_responders().await;
    assert!(matches!(&outcomes[..], [Ok(ResponderOutcome::Aborted { .. })]), "{outcomes:?}");
    assert!(unconsumed_states(a.vault()).await.unwrap().is_empty());
    assert!(unconsumed_states(b.vault()).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_responder_is_a_configuration_error() {
    let net = TestNetwork::new();
    let a = net.node("A");
    let _b = net.node("B");

    let err = a.issue(usd("100"), "B", None).await.unwrap_err();
    assert!(matches!(err, FlowError::NoResponderRegistered { ref flow, .. } if flow == "iou-issue"));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn unknown_counterparty_is_refused() {
    let net = TestNetwork::new();
    let a = net.node("A");

    let err = a.issue(usd("100"), "Nobody", None).await.unwrap_err();
    assert!(matches!(err, FlowError::UnknownCounterparty(ref name) if name == "Nobody"));
}

#[tokio::test]
async fn invalid_draft_never_leaves_the_initiator() {
    let net = TestNetwork::new();
    let a = net.node("A");
    let b = net.node("B");
    b.register_iou_responders(Arc::new(VerifyContract));

    let err = a.issue(usd("0"), "B", None).await.unwrap_err();
    assert!(matches!(err, FlowError::InvalidTransition(_)), "{err:?}");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(b.drain_responders().await.is_empty());
}

#[tokio::test]
async fn cancelled_flow_opens_no_sessions() {
    let net = TestNetwork::new();
    let a = net.node("A");
    let b = net.node("B");
    b.register_iou_responders(Arc::new(VerifyContract));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let flow = IssueFlow::with_cancellation(a.hub().clone(), cancel);
    let err = flow.call(usd("1"), b.identity(), None).await.unwrap_err();
    assert!(matches!(err, FlowError::Cancelled));
    assert!(b.drain_responders().await.is_empty());
}

#[tokio::test]
async fn resubmitting_a_finalized_transaction_conflicts() {
    let net = TestNetwork::new();
    let a = net.node("A");
    let b = net.node("B");
    b.register_iou_responders(Arc::new(VerifyContract));

    let ftx = a.issue(usd("100"), "B", None).await.unwrap();
    let err = finalize(a.hub(), ftx.transaction.clone(), &mut [], &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::ConflictDetected { ref tx_id, .. } if *tx_id == ftx.id()));
    assert_eq!(err.kind(), ErrorKind::OrderingConflict);
    assert_eq!(net.notary.committed_count().await, 1);
}

#[tokio::test]
async fn local_storage_failure_still_distributes_the_ordered_transaction() {
    let net = TestNetwork::new();
    let hub = net.hub_with_vault("A", test_config(), Arc::new(FullDiskVault::default()));
    let a = Node::new(hub, &net.transport);
    let b = net.node("B");
    b.register_iou_responders(Arc::new(VerifyContract));

    let err = a.issue(usd("100"), "B", None).await.unwrap_err();
    assert!(
        matches!(err, FlowError::Storage(StorageError::Backend(ref m)) if m == "disk full"),
        "{err:?}"
    );
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert_eq!(net.notary.committed_count().await, 1);

    let outcomes = b.drain_responders().await;
    let ftx = match &outcomes[..] {
        [Ok(ResponderOutcome::Finalized(ftx))] => ftx.clone(),
        other => panic!("expected the responder to finalize, got {other:?}"),
    };
    assert_eq!(finalized_transactions(b.vault()).await.unwrap(), vec![ftx]);
    assert!(finalized_transactions(a.vault()).await.unwrap().is_empty());
}

#[tokio::test]
async fn oversized_time_window_fails_before_any_session() {
    let net = TestNetwork::new();
    let config = FlowConfig {
        time_window_secs: i64::MAX as u64,
        ..test_config()
    };
    let a = net.node_with("A", config);
    let b = net.node("B");
    b.register_iou_responders(Arc::new(VerifyContract));

    let err = a.issue(usd("1"), "B", None).await.unwrap_err();
    assert!(
        matches!(err, FlowError::Signature(LedgerError::InvalidTimeWindow(_))),
        "{err:?}"
    );
    assert!(b.drain_responders().await.is_empty());
    assert_eq!(net.notary.committed_count().await, 0);
}
