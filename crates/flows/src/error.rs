use covenant_ledger::{ContractViolation, LedgerError, SecureHash, StateRef};
use covenant_storage::StorageError;

use crate::notary::NotaryError;
use crate::session::SessionId;

/// Broad classification of a [`FlowError`], used by callers to decide how to
/// react (fix configuration, investigate data, report to the user, retry
/// later).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Integrity,
    Validation,
    Protocol,
    OrderingConflict,
    OrderingUnreachable,
}

/// Every way a workflow run can fail.
///
/// A run that returns any of these has committed nothing: the notary did not
/// order the transaction, or ordering succeeded and the error concerns only
/// the local record.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    // Configuration
    #[error("no ordering authority is available")]
    NoOrderingAuthority,

    #[error("unknown counterparty '{0}'")]
    UnknownCounterparty(String),

    #[error("{party} has no responder registered for flow '{flow}'")]
    NoResponderRegistered { party: String, flow: String },

    // Integrity
    #[error("no unconsumed record with linear id {0}")]
    RecordNotFound(String),

    #[error("{count} unconsumed records share linear id {linear_id}")]
    AmbiguousRecord { linear_id: String, count: usize },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("encoding error: {0}")]
    Encoding(String),

    // Validation
    #[error("invalid transition: {0}")]
    InvalidTransition(#[from] ContractViolation),

    #[error("notary rejected {tx_id}: {reason}")]
    NotaryRejected { tx_id: SecureHash, reason: String },

    #[error(transparent)]
    Signature(#[from] LedgerError),

    // Protocol
    #[error("{party} rejected the proposal on session {session}: {reason}")]
    CounterpartyRejected {
        session: SessionId,
        party: String,
        reason: String,
    },

    #[error("session {session} with {party} timed out")]
    SessionTimeout { session: SessionId, party: String },

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("session {0} is closed")]
    SessionClosed(SessionId),

    #[error("flow aborted by counterparty: {0}")]
    Aborted(String),

    #[error("flow cancelled")]
    Cancelled,

    // Ordering
    #[error("transaction {tx_id} conflicts with earlier commits ({} input(s) already consumed)", .consumed.len())]
    ConflictDetected {
        tx_id: SecureHash,
        consumed: Vec<StateRef>,
    },

    #[error("ordering service {notary} is unreachable")]
    OrderingUnreachable { notary: String },
}

impl FlowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowError::NoOrderingAuthority
            | FlowError::UnknownCounterparty(_)
            | FlowError::NoResponderRegistered { .. } => ErrorKind::Configuration,
            FlowError::RecordNotFound(_)
            | FlowError::AmbiguousRecord { .. }
            | FlowError::Storage(_)
            | FlowError::Encoding(_) => ErrorKind::Integrity,
            FlowError::InvalidTransition(_)
            | FlowError::NotaryRejected { .. }
            | FlowError::Signature(_) => ErrorKind::Validation,
            FlowError::CounterpartyRejected { .. }
            | FlowError::SessionTimeout { .. }
            | FlowError::ProtocolViolation(_)
            | FlowError::SessionClosed(_)
            | FlowError::Aborted(_)
            | FlowError::Cancelled => ErrorKind::Protocol,
            FlowError::ConflictDetected { .. } => ErrorKind::OrderingConflict,
            FlowError::OrderingUnreachable { .. } => ErrorKind::OrderingUnreachable,
        }
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(e: serde_json::Error) -> Self {
        FlowError::Encoding(e.to_string())
    }
}

impl From<time::error::Format> for FlowError {
    fn from(e: time::error::Format) -> Self {
        FlowError::Encoding(e.to_string())
    }
}

impl From<NotaryError> for FlowError {
    fn from(e: NotaryError) -> Self {
        match e {
            NotaryError::Conflict { tx_id, consumed } => {
                FlowError::ConflictDetected { tx_id, consumed }
            }
            NotaryError::Unreachable { notary } => FlowError::OrderingUnreachable { notary },
            NotaryError::Rejected { tx_id, reason } => FlowError::NotaryRejected { tx_id, reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notary_errors_map_to_ordering_kinds() {
        let hash = SecureHash::sha256(b"tx");
        let conflict: FlowError = NotaryError::Conflict {
            tx_id: hash.clone(),
            consumed: vec![],
        }
        .into();
        assert_eq!(conflict.kind(), ErrorKind::OrderingConflict);

        let unreachable: FlowError = NotaryError::Unreachable {
            notary: "Notary".into(),
        }
        .into();
        assert_eq!(unreachable.kind(), ErrorKind::OrderingUnreachable);

        let rejected: FlowError = NotaryError::Rejected {
            tx_id: hash,
            reason: "outside time window".into(),
        }
        .into();
        assert_eq!(rejected.kind(), ErrorKind::Validation);
    }

    #[test]
    fn storage_errors_are_integrity_failures() {
        let err: FlowError = StorageError::Backend("disk gone".into()).into();
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert!(err.to_string().contains("disk gone"));
    }

    #[test]
    fn contract_violation_is_invalid_transition() {
        let err: FlowError = ContractViolation::new("amount must be positive").into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            err.to_string(),
            "invalid transition: contract rule violated: amount must be positive"
        );
    }
}
