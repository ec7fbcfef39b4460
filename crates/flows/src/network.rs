//! Who is on the network, and how to reach them.
//!
//! [`NetworkMap`] is the identity directory and the ordering resolver.
//! [`InMemoryNetwork`] is the transport: it connects a session between two
//! nodes living in the same process and hands the far end to the responder
//! node, which decides what to run on it.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, Weak};

use async_trait::async_trait;
use covenant_ledger::Party;
use tracing::debug;

use crate::error::FlowError;
use crate::notary::{NotaryService, OrderingResolver};
use crate::session::FlowSession;

/// Resolves party names to identities.
pub trait IdentityDirectory: Send + Sync {
    fn well_known_party(&self, name: &str) -> Option<Party>;
}

/// Directory of parties and notaries.
#[derive(Default)]
pub struct NetworkMap {
    parties: RwLock<BTreeMap<String, Party>>,
    notaries: RwLock<Vec<(Party, Arc<dyn NotaryService>)>>,
}

impl NetworkMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_party(&self, party: Party) {
        self.parties
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(party.name.clone(), party);
    }

    pub fn add_notary(&self, service: Arc<dyn NotaryService>) {
        let identity = service.identity().clone();
        self.add_party(identity.clone());
        self.notaries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((identity, service));
    }

    /// Look up a party by name, failing with `UnknownCounterparty`.
    pub fn resolve(&self, name: &str) -> Result<Party, FlowError> {
        self.well_known_party(name)
            .ok_or_else(|| FlowError::UnknownCounterparty(name.to_string()))
    }
}

impl IdentityDirectory for NetworkMap {
    fn well_known_party(&self, name: &str) -> Option<Party> {
        self.parties
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }
}

impl OrderingResolver for NetworkMap {
    fn notaries(&self) -> Vec<Party> {
        self.notaries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(party, _)| party.clone())
            .collect()
    }

    fn authority(&self, notary: &Party) -> Option<Arc<dyn NotaryService>> {
        self.notaries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|(party, _)| party == notary)
            .map(|(_, service)| service.clone())
    }
}

/// Opens sessions to counterparties.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a session from `from` to `to` for the workflow `flow_tag`. Fails
    /// if `to` is not reachable or has nothing registered for `flow_tag`.
    async fn open(&self, from: &Party, to: &Party, flow_tag: &str)
        -> Result<FlowSession, FlowError>;
}

/// The receiving side of a transport: a node that starts a responder for
/// each incoming session.
#[async_trait]
pub trait SessionAcceptor: Send + Sync {
    async fn accept(&self, session: FlowSession) -> Result<(), FlowError>;
}

struct Endpoint {
    party: Party,
    acceptor: Weak<dyn SessionAcceptor>,
}

/// A transport whose nodes all live in this process.
#[derive(Default)]
pub struct InMemoryNetwork {
    endpoints: RwLock<BTreeMap<String, Endpoint>>,
}

impl InMemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `party` reachable. The network holds the acceptor weakly, so a
    /// dropped node simply becomes unreachable.
    pub fn attach(&self, party: Party, acceptor: Weak<dyn SessionAcceptor>) {
        self.endpoints
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(party.name.clone(), Endpoint { party, acceptor });
    }

    fn acceptor_for(&self, to: &Party) -> Result<Arc<dyn SessionAcceptor>, FlowError> {
        let endpoints = self.endpoints.read().unwrap_or_else(|e| e.into_inner());
        let endpoint = endpoints
            .get(&to.name)
            .filter(|endpoint| endpoint.party == *to)
            .ok_or_else(|| FlowError::UnknownCounterparty(to.name.clone()))?;
        endpoint
            .acceptor
            .upgrade()
            .ok_or_else(|| FlowError::UnknownCounterparty(to.name.clone()))
    }
}

#[async_trait]
impl Transport for InMemoryNetwork {
    async fn open(
        &self,
        from: &Party,
        to: &Party,
        flow_tag: &str,
    ) -> Result<FlowSession, FlowError> {
        let acceptor = self.acceptor_for(to)?;
        let (ours, theirs) = FlowSession::pair(from.clone(), to.clone(), flow_tag);
        debug!(session = %ours.id(), from = %from, to = %to, flow = flow_tag, "opening session");
        acceptor.accept(theirs).await?;
        Ok(ours)
    }
}
