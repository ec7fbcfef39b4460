use serde::{Deserialize, Serialize};

/// One output of a finalized transaction as stored in a vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub tx_id: String,
    pub output_index: u32,
    /// Logical identifier shared by every version of the record.
    pub linear_id: String,
    pub contract_state: serde_json::Value,
    /// Names of the parties the record concerns.
    pub participants: Vec<String>,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub recorded_at: String,
    /// Id of the transaction that spent this record, if any.
    pub consumed_by: Option<String>,
}

impl StateRecord {
    pub fn is_consumed(&self) -> bool {
        self.consumed_by.is_some()
    }
}

/// A finalized transaction as stored in a vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub notary: String,
    /// Position assigned by the notary.
    pub sequence: u64,
    pub transaction: serde_json::Value,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub recorded_at: String,
}

/// Filter for state queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateStatus {
    #[default]
    Unconsumed,
    Consumed,
    All,
}

impl StateStatus {
    pub fn matches(&self, record: &StateRecord) -> bool {
        match self {
            StateStatus::Unconsumed => !record.is_consumed(),
            StateStatus::Consumed => record.is_consumed(),
            StateStatus::All => true,
        }
    }
}
