//! The services a workflow run may use, passed explicitly to every run.

use std::sync::Arc;

use covenant_ledger::{Contract, Party};
use covenant_storage::VaultStorage;

use crate::clock::Clock;
use crate::config::FlowConfig;
use crate::keys::KeyManagementService;
use crate::network::{IdentityDirectory, Transport};
use crate::notary::OrderingResolver;

pub struct ServiceHub<S: VaultStorage> {
    /// The party this node acts as.
    pub identity: Party,
    pub keys: Arc<dyn KeyManagementService>,
    pub clock: Arc<dyn Clock>,
    pub vault: Arc<S>,
    pub directory: Arc<dyn IdentityDirectory>,
    pub ordering: Arc<dyn OrderingResolver>,
    pub transport: Arc<dyn Transport>,
    pub contract: Arc<dyn Contract>,
    pub config: FlowConfig,
}

impl<S: VaultStorage> Clone for ServiceHub<S> {
    fn clone(&self) -> Self {
        Self {
            identity: self.identity.clone(),
            keys: self.keys.clone(),
            clock: self.clock.clone(),
            vault: self.vault.clone(),
            directory: self.directory.clone(),
            ordering: self.ordering.clone(),
            transport: self.transport.clone(),
            contract: self.contract.clone(),
            config: self.config.clone(),
        }
    }
}
