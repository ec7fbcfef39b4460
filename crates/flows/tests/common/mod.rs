//! Shared fixture: one notary, a network map and any number of nodes, all in
//! this process on a clock that only moves when a test moves it.

#![allow(dead_code)]

use std::sync::Arc;

use covenant_flows::{
    Clock, FixedClock, FlowConfig, InMemoryNetwork, InMemoryNotary, KeyManagementService, LocalKeyStore,
    NetworkMap, Node, ProposalBuilder, ServiceHub,
};
use covenant_ledger::{Amount, IouContract, Obligation, Party, SignedTransaction};
use covenant_storage::{InMemoryVault, VaultStorage};
use time::macros::datetime;

pub struct TestNetwork {
    pub clock: Arc<FixedClock>,
    pub map: Arc<NetworkMap>,
    pub notary: Arc<InMemoryNotary>,
    pub notary_keys: Arc<LocalKeyStore>,
    pub transport: Arc<InMemoryNetwork>,
}

/// Short timeouts so failure cases finish quickly.
pub fn test_config() -> FlowConfig {
    FlowConfig {
        session_timeout_ms: 2_000,
        finality_timeout_ms: 2_000,
        ..FlowConfig::default()
    }
}

pub fn usd(quantity: &str) -> Amount {
    Amount::parse(&format!("{} USD", quantity)).unwrap()
}

impl TestNetwork {
    pub fn new() -> Self {
        let clock = Arc::new(FixedClock::new(datetime!(2026-06-01 10:00 UTC)));
        let map = Arc::new(NetworkMap::new());
        let notary_keys = Arc::new(LocalKeyStore::generate());
        let notary = Arc::new(InMemoryNotary::new(
            "Notary",
            notary_keys.clone(),
            clock.clone(),
        ));
        map.add_notary(notary.clone());
        Self {
            clock,
            map,
            notary,
            notary_keys,
            transport: InMemoryNetwork::new(),
        }
    }

    pub fn node(&self, name: &str) -> Node<InMemoryVault> {
        self.node_with(name, test_config())
    }

    pub fn node_with(&self, name: &str, config: FlowConfig) -> Node<InMemoryVault> {
        Node::new(self.hub(name, config), &self.transport)
    }

    /// A hub for a party that is in the directory but not attached to the
    /// transport, for driving responders by hand.
    pub fn hub(&self, name: &str, config: FlowConfig) -> ServiceHub<InMemoryVault> {
        self.hub_with_vault(name, config, Arc::new(InMemoryVault::new()))
    }

    /// A hub backed by `vault` instead of a fresh in-memory one.
    pub fn hub_with_vault<S: VaultStorage>(
        &self,
        name: &str,
        config: FlowConfig,
        vault: Arc<S>,
    ) -> ServiceHub<S> {
        let keys = Arc::new(LocalKeyStore::generate());
        let identity = Party::new(name, keys.public_key());
        self.map.add_party(identity.clone());
        ServiceHub {
            identity,
            keys,
            clock: self.clock.clone(),
            vault,
            directory: self.map.clone(),
            ordering: self.map.clone(),
            transport: self.transport.clone(),
            contract: Arc::new(IouContract),
            config,
        }
    }

    /// An issue draft from `lender` to `borrower`, signed by the lender only.
    pub fn issue_proposal(
        &self,
        lender: &ServiceHub<InMemoryVault>,
        borrower: &Party,
        amount: Amount,
    ) -> SignedTransaction {
        let iou = Obligation::new(amount, lender.identity.clone(), borrower.clone(), None);
        let builder = ProposalBuilder::new(lender.clock.now(), lender.config.time_window())
            .issue(self.map.as_ref(), iou)
            .unwrap();
        let wtx = builder.to_wire_transaction();
        SignedTransaction::new(wtx.clone(), vec![lender.keys.sign(&wtx.id())])
    }
}
