//! In-memory `VaultStorage` backend.
//!
//! Snapshots buffer their writes and validate them twice: eagerly against
//! committed data when each write is made, and again under the write lock at
//! commit time. The second check is what makes concurrent snapshots that
//! spend the same state resolve to exactly one winner.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::record::{StateRecord, StateStatus, TransactionRecord};
use crate::traits::VaultStorage;

type StateKey = (String, u32);

#[derive(Debug, Default)]
struct VaultData {
    transactions: HashMap<String, TransactionRecord>,
    states: BTreeMap<StateKey, StateRecord>,
}

/// Pending writes of an uncommitted in-memory snapshot.
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    transactions: Vec<TransactionRecord>,
    states: Vec<StateRecord>,
    consumed: Vec<(StateKey, String)>,
}

impl MemorySnapshot {
    fn has_transaction(&self, tx_id: &str) -> bool {
        self.transactions.iter().any(|t| t.id == tx_id)
    }

    fn has_state(&self, key: &StateKey) -> bool {
        self.states
            .iter()
            .any(|s| s.tx_id == key.0 && s.output_index == key.1)
    }

    fn consumer_of(&self, key: &StateKey) -> Option<&str> {
        self.consumed
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, by)| by.as_str())
    }
}

/// A vault held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryVault {
    data: RwLock<VaultData>,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_transaction(data: &VaultData, record: &TransactionRecord) -> Result<(), StorageError> {
    if data.transactions.contains_key(&record.id) {
        return Err(StorageError::TransactionAlreadyRecorded {
            tx_id: record.id.clone(),
        });
    }
    Ok(())
}

fn check_state(data: &VaultData, record: &StateRecord) -> Result<(), StorageError> {
    let key = (record.tx_id.clone(), record.output_index);
    if data.states.contains_key(&key) {
        return Err(StorageError::StateAlreadyRecorded {
            tx_id: record.tx_id.clone(),
            output_index: record.output_index,
        });
    }
    Ok(())
}

/// Validate a consume against committed data. `pending_insert` is true when
/// the state was inserted by the same snapshot.
fn check_consume(
    data: &VaultData,
    key: &StateKey,
    pending_insert: bool,
) -> Result<(), StorageError> {
    match data.states.get(key) {
        Some(StateRecord {
            consumed_by: Some(by),
            ..
        }) => Err(StorageError::AlreadyConsumed {
            tx_id: key.0.clone(),
            output_index: key.1,
            consumed_by: by.clone(),
        }),
        Some(_) => Ok(()),
        None if pending_insert => Ok(()),
        None => Err(StorageError::StateNotFound {
            tx_id: key.0.clone(),
            output_index: key.1,
        }),
    }
}

#[async_trait]
impl VaultStorage for InMemoryVault {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        Ok(MemorySnapshot::default())
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        let mut data = self.data.write().await;

        // Validate everything before touching anything.
        for record in &snapshot.transactions {
            check_transaction(&data, record)?;
        }
        for record in &snapshot.states {
            check_state(&data, record)?;
        }
        for (key, _) in &snapshot.consumed {
            check_consume(&data, key, snapshot.has_state(key))?;
        }

        for record in snapshot.transactions {
            data.transactions.insert(record.id.clone(), record);
        }
        for record in snapshot.states {
            data.states
                .insert((record.tx_id.clone(), record.output_index), record);
        }
        for (key, by) in snapshot.consumed {
            if let Some(state) = data.states.get_mut(&key) {
                state.consumed_by = Some(by);
            }
        }
        Ok(())
    }

    async fn abort_snapshot(&self, _snapshot: MemorySnapshot) -> Result<(), StorageError> {
        Ok(())
    }

    async fn insert_transaction(
        &self,
        snapshot: &mut MemorySnapshot,
        record: TransactionRecord,
    ) -> Result<(), StorageError> {
        let data = self.data.read().await;
        check_transaction(&data, &record)?;
        if snapshot.has_transaction(&record.id) {
            return Err(StorageError::TransactionAlreadyRecorded { tx_id: record.id });
        }
        snapshot.transactions.push(record);
        Ok(())
    }

    async fn insert_state(
        &self,
        snapshot: &mut MemorySnapshot,
        record: StateRecord,
    ) -> Result<(), StorageError> {
        let data = self.data.read().await;
        check_state(&data, &record)?;
        let key = (record.tx_id.clone(), record.output_index);
        if snapshot.has_state(&key) {
            return Err(StorageError::StateAlreadyRecorded {
                tx_id: record.tx_id,
                output_index: record.output_index,
            });
        }
        snapshot.states.push(record);
        Ok(())
    }

    async fn consume_state(
        &self,
        snapshot: &mut MemorySnapshot,
        tx_id: &str,
        output_index: u32,
        consuming_tx_id: &str,
    ) -> Result<(), StorageError> {
        let data = self.data.read().await;
        let key = (tx_id.to_string(), output_index);
        check_consume(&data, &key, snapshot.has_state(&key))?;
        if let Some(by) = snapshot.consumer_of(&key) {
            return Err(StorageError::AlreadyConsumed {
                tx_id: key.0,
                output_index,
                consumed_by: by.to_string(),
            });
        }
        snapshot.consumed.push((key, consuming_tx_id.to_string()));
        Ok(())
    }

    async fn get_transaction(&self, tx_id: &str) -> Result<TransactionRecord, StorageError> {
        let data = self.data.read().await;
        data.transactions
            .get(tx_id)
            .cloned()
            .ok_or_else(|| StorageError::TransactionNotFound {
                tx_id: tx_id.to_string(),
            })
    }

    async fn get_state(
        &self,
        tx_id: &str,
        output_index: u32,
    ) -> Result<StateRecord, StorageError> {
        let data = self.data.read().await;
        data.states
            .get(&(tx_id.to_string(), output_index))
            .cloned()
            .ok_or_else(|| StorageError::StateNotFound {
                tx_id: tx_id.to_string(),
                output_index,
            })
    }

    async fn query_states(
        &self,
        linear_id: &str,
        status: StateStatus,
    ) -> Result<Vec<StateRecord>, StorageError> {
        let data = self.data.read().await;
        Ok(data
            .states
            .values()
            .filter(|s| s.linear_id == linear_id && status.matches(s))
            .cloned()
            .collect())
    }

    async fn list_states(&self, status: StateStatus) -> Result<Vec<StateRecord>, StorageError> {
        let data = self.data.read().await;
        Ok(data
            .states
            .values()
            .filter(|s| status.matches(s))
            .cloned()
            .collect())
    }

    async fn list_transactions(&self) -> Result<Vec<TransactionRecord>, StorageError> {
        let data = self.data.read().await;
        let mut records: Vec<TransactionRecord> = data.transactions.values().cloned().collect();
        records.sort_by(|a, b| a.sequence.cmp(&b.sequence).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }
}
