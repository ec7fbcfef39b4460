//! Bridge between ledger values and the string-typed vault records.

use covenant_ledger::{
    FinalizedTransaction, Party, SecureHash, StateAndRef, StateRef, TransactionState,
    UniqueIdentifier,
};
use covenant_storage::{StateRecord, StateStatus, StorageError, TransactionRecord, VaultStorage};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::FlowError;

fn state_record(
    state: &StateAndRef,
    recorded_at: &str,
) -> Result<StateRecord, FlowError> {
    Ok(StateRecord {
        tx_id: state.reference.txhash.to_string(),
        output_index: state.reference.index,
        linear_id: state.state.data.linear_id.to_string(),
        contract_state: serde_json::to_value(&state.state)?,
        participants: state
            .state
            .data
            .participants()
            .iter()
            .map(|p| p.name.clone())
            .collect(),
        recorded_at: recorded_at.to_string(),
        consumed_by: None,
    })
}

/// Rebuild a ledger record from its vault form.
pub fn state_from_record(record: &StateRecord) -> Result<StateAndRef, FlowError> {
    let state: TransactionState = serde_json::from_value(record.contract_state.clone())?;
    let txhash =
        SecureHash::parse(&record.tx_id).map_err(|e| FlowError::Encoding(e.to_string()))?;
    Ok(StateAndRef {
        state,
        reference: StateRef {
            txhash,
            index: record.output_index,
        },
    })
}

/// All unconsumed versions of `linear_id` held in the vault.
pub async fn unconsumed_by_linear_id<S: VaultStorage>(
    vault: &S,
    linear_id: &UniqueIdentifier,
) -> Result<Vec<StateAndRef>, FlowError> {
    vault
        .query_states(&linear_id.to_string(), StateStatus::Unconsumed)
        .await?
        .iter()
        .map(state_from_record)
        .collect()
}

/// Every unconsumed record in the vault.
pub async fn unconsumed_states<S: VaultStorage>(vault: &S) -> Result<Vec<StateAndRef>, FlowError> {
    vault
        .list_states(StateStatus::Unconsumed)
        .await?
        .iter()
        .map(state_from_record)
        .collect()
}

/// Load a finalized transaction previously recorded with [`record_finalized`].
pub async fn load_finalized<S: VaultStorage>(
    vault: &S,
    tx_id: &SecureHash,
) -> Result<FinalizedTransaction, FlowError> {
    let record = vault.get_transaction(tx_id.as_str()).await?;
    Ok(serde_json::from_value(record.transaction)?)
}

/// Every finalized transaction in the vault, in notary order.
pub async fn finalized_transactions<S: VaultStorage>(
    vault: &S,
) -> Result<Vec<FinalizedTransaction>, FlowError> {
    vault
        .list_transactions()
        .await?
        .into_iter()
        .map(|record| serde_json::from_value(record.transaction).map_err(FlowError::from))
        .collect()
}

/// Record `ftx` in `owner`'s vault in one snapshot: inputs the vault holds
/// are marked consumed, outputs `owner` participates in are inserted.
pub async fn record_finalized<S: VaultStorage>(
    vault: &S,
    ftx: &FinalizedTransaction,
    owner: &Party,
    recorded_at: OffsetDateTime,
) -> Result<(), FlowError> {
    let tx_id = ftx.id();
    let recorded_at = recorded_at.format(&Rfc3339)?;

    let mut snapshot = vault.begin_snapshot().await?;
    match stage(vault, &mut snapshot, ftx, &tx_id, owner, &recorded_at).await {
        Ok(()) => {
            vault.commit_snapshot(snapshot).await?;
            debug!(tx_id = %tx_id, party = %owner, "finalized transaction recorded");
            Ok(())
        }
        Err(e) => {
            let _ = vault.abort_snapshot(snapshot).await;
            Err(e)
        }
    }
}

async fn stage<S: VaultStorage>(
    vault: &S,
    snapshot: &mut S::Snapshot,
    ftx: &FinalizedTransaction,
    tx_id: &SecureHash,
    owner: &Party,
    recorded_at: &str,
) -> Result<(), FlowError> {
    vault
        .insert_transaction(
            snapshot,
            TransactionRecord {
                id: tx_id.to_string(),
                notary: ftx.notary.name.clone(),
                sequence: ftx.sequence,
                transaction: serde_json::to_value(ftx)?,
                recorded_at: recorded_at.to_string(),
            },
        )
        .await?;

    for input in &ftx.transaction.tx.inputs {
        let txhash = input.txhash.to_string();
        match vault
            .consume_state(snapshot, &txhash, input.index, tx_id.as_str())
            .await
        {
            Ok(()) => {}
            // Parties that never held the input (a new lender) have nothing
            // to consume.
            Err(StorageError::StateNotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }

    for output in ftx.transaction.tx.output_states() {
        if output.state.data.participants().contains(&owner) {
            vault
                .insert_state(snapshot, state_record(&output, recorded_at)?)
                .await?;
        }
    }
    Ok(())
}
