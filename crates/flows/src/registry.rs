//! Responder registration.
//!
//! A node answers an incoming session by looking up the session's flow tag
//! here and running whatever the factory returns.

use std::collections::BTreeMap;
use std::sync::Arc;

use covenant_storage::VaultStorage;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::FlowError;
use crate::hub::ServiceHub;
use crate::policy::ValidationPolicy;
use crate::responder::{ResponderOutcome, SignTransactionResponder};
use crate::session::FlowSession;

pub type ResponderFuture = BoxFuture<'static, Result<ResponderOutcome, FlowError>>;

/// Builds the responder for one incoming session.
pub type ResponderFactory<S> =
    Arc<dyn Fn(FlowSession, ServiceHub<S>) -> ResponderFuture + Send + Sync>;

/// A factory running [`SignTransactionResponder`] under `policy`.
pub fn signer_factory<S: VaultStorage>(policy: Arc<dyn ValidationPolicy>) -> ResponderFactory<S> {
    Arc::new(move |session, hub| {
        SignTransactionResponder::new(session, hub, policy.clone())
            .run()
            .boxed()
    })
}

pub struct ResponderRegistry<S: VaultStorage> {
    factories: BTreeMap<String, ResponderFactory<S>>,
}

impl<S: VaultStorage> Default for ResponderRegistry<S> {
    fn default() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }
}

impl<S: VaultStorage> ResponderRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` for `flow_tag`, replacing any earlier registration.
    pub fn register(&mut self, flow_tag: impl Into<String>, factory: ResponderFactory<S>) {
        self.factories.insert(flow_tag.into(), factory);
    }

    pub fn register_signer(&mut self, flow_tag: impl Into<String>, policy: Arc<dyn ValidationPolicy>) {
        self.register(flow_tag, signer_factory(policy));
    }

    pub fn get(&self, flow_tag: &str) -> Option<ResponderFactory<S>> {
        self.factories.get(flow_tag).cloned()
    }

    pub fn flow_tags(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::AcceptAll;
    use covenant_storage::InMemoryVault;

    #[test]
    fn later_registration_replaces_earlier() {
        let mut registry = ResponderRegistry::<InMemoryVault>::new();
        registry.register_signer("iou-issue", Arc::new(AcceptAll));
        registry.register_signer("iou-transfer", Arc::new(AcceptAll));
        registry.register_signer("iou-issue", Arc::new(AcceptAll));
        assert_eq!(registry.flow_tags(), ["iou-issue", "iou-transfer"]);
        assert!(registry.get("iou-issue").is_some());
        assert!(registry.get("iou-settle").is_none());
    }
}
