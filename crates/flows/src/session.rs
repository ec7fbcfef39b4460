//! Point-to-point sessions between the two parties of one workflow run.
//!
//! A session is an ordered, bidirectional channel. Messages cross it as
//! JSON so that every value a flow sends survives the same encoding a real
//! transport would apply.

use std::fmt;
use std::time::Duration;

use covenant_ledger::{
    FinalizedTransaction, Party, SignedTransaction, StateAndRef, TransactionSignature,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::FlowError;

/// Messages in flight between a buffered session's two ends.
const SESSION_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything the endorsement protocol exchanges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowMessage {
    /// Initiator → responder: the draft with the initiator's signature and the
    /// records it consumes.
    Proposal {
        transaction: SignedTransaction,
        input_states: Vec<StateAndRef>,
    },
    /// Responder → initiator.
    Endorsement { signature: TransactionSignature },
    /// Responder → initiator.
    Rejected { reason: String },
    /// Initiator → responder, after ordering.
    Finalized { transaction: FinalizedTransaction },
    /// Responder → initiator, once the finalized transaction is recorded.
    FinalityAck,
    /// Either direction; ends the run.
    Abort { reason: String },
}

impl FlowMessage {
    pub fn label(&self) -> &'static str {
        match self {
            FlowMessage::Proposal { .. } => "proposal",
            FlowMessage::Endorsement { .. } => "endorsement",
            FlowMessage::Rejected { .. } => "rejected",
            FlowMessage::Finalized { .. } => "finalized",
            FlowMessage::FinalityAck => "finality_ack",
            FlowMessage::Abort { .. } => "abort",
        }
    }
}

/// One end of a session.
#[derive(Debug)]
pub struct FlowSession {
    id: SessionId,
    counterparty: Party,
    flow_tag: String,
    outbound: Option<mpsc::Sender<Vec<u8>>>,
    inbound: mpsc::Receiver<Vec<u8>>,
}

impl FlowSession {
    /// Two connected ends: the first belongs to `initiator` and talks to
    /// `responder`, the second the other way round.
    pub fn pair(initiator: Party, responder: Party, flow_tag: &str) -> (FlowSession, FlowSession) {
        let id = SessionId::random();
        let (to_responder, from_initiator) = mpsc::channel(SESSION_BUFFER);
        let (to_initiator, from_responder) = mpsc::channel(SESSION_BUFFER);
        let initiator_end = FlowSession {
            id,
            counterparty: responder,
            flow_tag: flow_tag.to_string(),
            outbound: Some(to_responder),
            inbound: from_responder,
        };
        let responder_end = FlowSession {
            id,
            counterparty: initiator,
            flow_tag: flow_tag.to_string(),
            outbound: Some(to_initiator),
            inbound: from_initiator,
        };
        (initiator_end, responder_end)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The party at the other end.
    pub fn counterparty(&self) -> &Party {
        &self.counterparty
    }

    pub fn flow_tag(&self) -> &str {
        &self.flow_tag
    }

    pub async fn send(&self, message: &FlowMessage) -> Result<(), FlowError> {
        let outbound = self
            .outbound
            .as_ref()
            .ok_or(FlowError::SessionClosed(self.id))?;
        let bytes = serde_json::to_vec(message)?;
        tracing::trace!(session = %self.id, to = %self.counterparty, message = message.label(), "send");
        outbound
            .send(bytes)
            .await
            .map_err(|_| FlowError::SessionClosed(self.id))
    }

    /// Wait up to `timeout` for the next message.
    pub async fn receive(&mut self, timeout: Duration) -> Result<FlowMessage, FlowError> {
        let bytes = match tokio::time::timeout(timeout, self.inbound.recv()).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Err(FlowError::SessionClosed(self.id)),
            Err(_) => {
                return Err(FlowError::SessionTimeout {
                    session: self.id,
                    party: self.counterparty.name.clone(),
                })
            }
        };
        let message: FlowMessage = serde_json::from_slice(&bytes)?;
        tracing::trace!(session = %self.id, from = %self.counterparty, message = message.label(), "receive");
        Ok(message)
    }

    /// Stop sending. Messages already queued are still delivered.
    pub fn close(&mut self) {
        self.outbound = None;
    }
}
