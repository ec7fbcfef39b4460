//! A node: one identity, its services, and the responders it runs.

use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use covenant_ledger::{Amount, FinalizedTransaction, Party, UniqueIdentifier};
use covenant_storage::VaultStorage;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::FlowError;
use crate::hub::ServiceHub;
use crate::initiator::{IssueFlow, TransferFlow, ISSUE_FLOW, TRANSFER_FLOW};
use crate::network::{InMemoryNetwork, SessionAcceptor};
use crate::policy::ValidationPolicy;
use crate::registry::{ResponderFactory, ResponderRegistry};
use crate::responder::ResponderOutcome;
use crate::session::FlowSession;

type ResponderHandle = JoinHandle<Result<ResponderOutcome, FlowError>>;

struct NodeInner<S: VaultStorage> {
    hub: ServiceHub<S>,
    registry: RwLock<ResponderRegistry<S>>,
    responders: Mutex<Vec<ResponderHandle>>,
}

#[async_trait]
impl<S: VaultStorage> SessionAcceptor for NodeInner<S> {
    async fn accept(&self, session: FlowSession) -> Result<(), FlowError> {
        let factory = self
            .registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(session.flow_tag())
            .ok_or_else(|| FlowError::NoResponderRegistered {
                party: self.hub.identity.name.clone(),
                flow: session.flow_tag().to_string(),
            })?;
        debug!(party = %self.hub.identity, session = %session.id(), flow = session.flow_tag(), "starting responder");
        let handle = tokio::spawn(factory(session, self.hub.clone()));
        let mut responders = self.responders.lock().unwrap_or_else(|e| e.into_inner());
        // Finished responders have already logged their outcome.
        responders.retain(|h| !h.is_finished());
        responders.push(handle);
        Ok(())
    }
}

/// A participant attached to an [`InMemoryNetwork`].
///
/// Initiator flows run on the caller's task. Each incoming session runs its
/// responder on a task of its own; [`Node::drain_responders`] waits for the
/// ones still tracked. Handles of responders that have finished are dropped
/// whenever a new session arrives.
pub struct Node<S: VaultStorage> {
    inner: Arc<NodeInner<S>>,
}

impl<S: VaultStorage> Clone for Node<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: VaultStorage> Node<S> {
    pub fn new(hub: ServiceHub<S>, network: &InMemoryNetwork) -> Self {
        let inner = Arc::new(NodeInner {
            hub,
            registry: RwLock::new(ResponderRegistry::new()),
            responders: Mutex::new(Vec::new()),
        });
        let acceptor: Arc<dyn SessionAcceptor> = inner.clone();
        network.attach(inner.hub.identity.clone(), Arc::downgrade(&acceptor));
        Self { inner }
    }

    pub fn hub(&self) -> &ServiceHub<S> {
        &self.inner.hub
    }

    pub fn identity(&self) -> &Party {
        &self.inner.hub.identity
    }

    pub fn vault(&self) -> &S {
        self.inner.hub.vault.as_ref()
    }

    pub fn register_responder(&self, flow_tag: &str, factory: ResponderFactory<S>) {
        self.inner
            .registry
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .register(flow_tag, factory);
    }

    pub fn register_signer(&self, flow_tag: &str, policy: Arc<dyn ValidationPolicy>) {
        self.inner
            .registry
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .register_signer(flow_tag, policy);
    }

    /// Answer both IOU workflows with `policy`.
    pub fn register_iou_responders(&self, policy: Arc<dyn ValidationPolicy>) {
        self.register_signer(ISSUE_FLOW, policy.clone());
        self.register_signer(TRANSFER_FLOW, policy);
    }

    fn counterparty(&self, name: &str) -> Result<Party, FlowError> {
        self.inner
            .hub
            .directory
            .well_known_party(name)
            .ok_or_else(|| FlowError::UnknownCounterparty(name.to_string()))
    }

    /// Issue `amount` owed by `borrower` to this node.
    pub async fn issue(
        &self,
        amount: Amount,
        borrower: &str,
        external_id: Option<String>,
    ) -> Result<FinalizedTransaction, FlowError> {
        let borrower = self.counterparty(borrower)?;
        IssueFlow::new(self.inner.hub.clone())
            .call(amount, &borrower, external_id)
            .await
    }

    /// Transfer the obligation `linear_id` to `new_lender`.
    pub async fn transfer(
        &self,
        linear_id: &UniqueIdentifier,
        new_lender: &str,
    ) -> Result<FinalizedTransaction, FlowError> {
        let new_lender = self.counterparty(new_lender)?;
        TransferFlow::new(self.inner.hub.clone())
            .call(linear_id, &new_lender)
            .await
    }

    /// Wait for every tracked responder and return their results in start
    /// order.
    pub async fn drain_responders(&self) -> Vec<Result<ResponderOutcome, FlowError>> {
        let handles: Vec<ResponderHandle> = std::mem::take(
            &mut *self
                .inner
                .responders
                .lock()
                .unwrap_or_else(|e| e.into_inner()),
        );
        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(party = %self.inner.hub.identity, error = %e, "responder task failed");
                    outcomes.push(Err(FlowError::Aborted(format!("responder task failed: {}", e))));
                }
            }
        }
        outcomes
    }
}
