//! Draft, signed and finalized transactions.
//!
//! A [`WireTransaction`] is the byte-stable draft every party signs. Its id
//! is the SHA-256 of its canonical JSON encoding, so two parties holding the
//! same id are guaranteed to hold the same draft. Signers are never supplied
//! directly: they are derived from the participants of the records a
//! command touches.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::crypto::{SecureHash, TransactionSignature};
use crate::error::LedgerError;
use crate::identity::{Party, PublicKey};
use crate::state::{Obligation, StateAndRef, StateRef};

/// The transition a command asks the contract to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Issue,
    Transfer,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Issue => f.write_str("issue"),
            CommandKind::Transfer => f.write_str("transfer"),
        }
    }
}

/// An action tag plus the keys that must endorse it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    pub signers: BTreeSet<PublicKey>,
}

/// Validity window enforced by the notary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(with = "time::serde::rfc3339")]
    pub from: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub until: OffsetDateTime,
}

impl TimeWindow {
    pub fn between(
        from: OffsetDateTime,
        duration: std::time::Duration,
    ) -> Result<Self, LedgerError> {
        let out_of_range = || {
            LedgerError::InvalidTimeWindow(format!(
                "{}s from {} is out of range",
                duration.as_secs(),
                from
            ))
        };
        let until = time::Duration::try_from(duration)
            .ok()
            .and_then(|d| from.checked_add(d))
            .ok_or_else(out_of_range)?;
        // Both ends must survive the wire encoding.
        for instant in [from, until] {
            instant.format(&Rfc3339).map_err(|_| out_of_range())?;
        }
        Ok(Self { from, until })
    }

    /// Half-open containment: `from <= instant < until`.
    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        self.from <= instant && instant < self.until
    }
}

/// The unsigned draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTransaction {
    pub notary: Party,
    pub inputs: Vec<StateRef>,
    pub outputs: Vec<Obligation>,
    pub commands: Vec<Command>,
    pub time_window: Option<TimeWindow>,
}

impl WireTransaction {
    /// SHA-256 of the canonical JSON encoding.
    ///
    /// # Panics
    ///
    /// Never in practice: every field serializes to plain JSON values, and
    /// [`TimeWindow::between`] refuses instants RFC 3339 cannot encode.
    pub fn id(&self) -> SecureHash {
        let canonical = serde_json::to_vec(self)
            .expect("wire transaction serializes to JSON");
        SecureHash::sha256(&canonical)
    }

    /// Union of every command's signers.
    pub fn required_signers(&self) -> BTreeSet<PublicKey> {
        self.commands
            .iter()
            .flat_map(|c| c.signers.iter().copied())
            .collect()
    }

    /// Reference to output `index` of this transaction.
    pub fn output_ref(&self, index: u32) -> StateRef {
        StateRef {
            txhash: self.id(),
            index,
        }
    }

    /// Outputs paired with the references they will have once recorded.
    pub fn output_states(&self) -> Vec<StateAndRef> {
        let id = self.id();
        self.outputs
            .iter()
            .enumerate()
            .map(|(index, data)| StateAndRef {
                state: crate::state::TransactionState {
                    data: data.clone(),
                    notary: self.notary.clone(),
                },
                reference: StateRef {
                    txhash: id.clone(),
                    index: index as u32,
                },
            })
            .collect()
    }

    /// Bind resolved input records to this draft for contract verification.
    ///
    /// `resolved` must hold exactly one record per input, in input order.
    pub fn to_ledger_transaction(
        &self,
        resolved: &[StateAndRef],
    ) -> Result<LedgerTransaction, LedgerError> {
        if resolved.len() != self.inputs.len() {
            return Err(LedgerError::InputMismatch {
                expected: format!("{} inputs", self.inputs.len()),
                found: format!("{} resolved records", resolved.len()),
            });
        }
        for (expected, found) in self.inputs.iter().zip(resolved) {
            if *expected != found.reference {
                return Err(LedgerError::InputMismatch {
                    expected: expected.to_string(),
                    found: found.reference.to_string(),
                });
            }
        }
        Ok(LedgerTransaction {
            id: self.id(),
            notary: self.notary.clone(),
            inputs: resolved.to_vec(),
            outputs: self.outputs.clone(),
            commands: self.commands.clone(),
            time_window: self.time_window,
        })
    }
}

/// A draft with its inputs resolved to full records; what contracts see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTransaction {
    pub id: SecureHash,
    pub notary: Party,
    pub inputs: Vec<StateAndRef>,
    pub outputs: Vec<Obligation>,
    pub commands: Vec<Command>,
    pub time_window: Option<TimeWindow>,
}

/// Mutable assembly of a draft.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    notary: Party,
    inputs: Vec<StateAndRef>,
    outputs: Vec<Obligation>,
    commands: Vec<Command>,
    time_window: Option<TimeWindow>,
}

impl TransactionBuilder {
    pub fn new(notary: Party) -> Self {
        Self {
            notary,
            inputs: Vec::new(),
            outputs: Vec::new(),
            commands: Vec::new(),
            time_window: None,
        }
    }

    pub fn add_input_state(mut self, input: StateAndRef) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn add_output_state(mut self, output: Obligation) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn add_command(mut self, kind: CommandKind, signers: BTreeSet<PublicKey>) -> Self {
        self.commands.push(Command { kind, signers });
        self
    }

    pub fn set_time_window(
        mut self,
        from: OffsetDateTime,
        duration: std::time::Duration,
    ) -> Result<Self, LedgerError> {
        self.time_window = Some(TimeWindow::between(from, duration)?);
        Ok(self)
    }

    pub fn notary(&self) -> &Party {
        &self.notary
    }

    pub fn input_states(&self) -> &[StateAndRef] {
        &self.inputs
    }

    pub fn to_wire_transaction(&self) -> WireTransaction {
        WireTransaction {
            notary: self.notary.clone(),
            inputs: self.inputs.iter().map(|i| i.reference.clone()).collect(),
            outputs: self.outputs.clone(),
            commands: self.commands.clone(),
            time_window: self.time_window,
        }
    }

    pub fn to_ledger_transaction(&self) -> LedgerTransaction {
        let wire = self.to_wire_transaction();
        LedgerTransaction {
            id: wire.id(),
            notary: wire.notary,
            inputs: self.inputs.clone(),
            outputs: wire.outputs,
            commands: wire.commands,
            time_window: wire.time_window,
        }
    }
}

/// A draft plus the endorsements gathered so far.
///
/// Signatures are kept sorted by signer key with at most one per key, so
/// the same set of endorsements always yields the same value no matter the
/// order in which they arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx: WireTransaction,
    sigs: Vec<TransactionSignature>,
}

impl SignedTransaction {
    pub fn new(tx: WireTransaction, sigs: Vec<TransactionSignature>) -> Self {
        let mut signed = Self {
            tx,
            sigs: Vec::new(),
        };
        for sig in sigs {
            signed.insert(sig);
        }
        signed
    }

    pub fn id(&self) -> SecureHash {
        self.tx.id()
    }

    pub fn sigs(&self) -> &[TransactionSignature] {
        &self.sigs
    }

    pub fn with_additional_signature(mut self, sig: TransactionSignature) -> Self {
        self.insert(sig);
        self
    }

    pub fn with_additional_signatures(
        mut self,
        sigs: impl IntoIterator<Item = TransactionSignature>,
    ) -> Self {
        for sig in sigs {
            self.insert(sig);
        }
        self
    }

    fn insert(&mut self, sig: TransactionSignature) {
        match self.sigs.binary_search_by(|s| s.by.cmp(&sig.by)) {
            Ok(pos) => self.sigs[pos] = sig,
            Err(pos) => self.sigs.insert(pos, sig),
        }
    }

    pub fn signers(&self) -> BTreeSet<PublicKey> {
        self.sigs.iter().map(|s| s.by).collect()
    }

    /// Required keys that have not signed yet.
    pub fn missing_signers(&self) -> BTreeSet<PublicKey> {
        let present = self.signers();
        self.tx
            .required_signers()
            .into_iter()
            .filter(|k| !present.contains(k))
            .collect()
    }

    /// Check every attached signature and that only keys in `allowed_missing`
    /// are still absent. Signatures by keys no command requires are rejected.
    pub fn verify_signatures_except(
        &self,
        allowed_missing: &BTreeSet<PublicKey>,
    ) -> Result<(), LedgerError> {
        let id = self.id();
        let required = self.tx.required_signers();
        for sig in &self.sigs {
            if !required.contains(&sig.by) {
                return Err(LedgerError::UnexpectedSigner {
                    tx_id: id.to_string(),
                    signer: sig.by.fingerprint(),
                });
            }
            sig.verify(&id)?;
        }
        let missing: Vec<String> = self
            .missing_signers()
            .iter()
            .filter(|k| !allowed_missing.contains(k))
            .map(|k| k.fingerprint())
            .collect();
        if !missing.is_empty() {
            return Err(LedgerError::MissingSignatures {
                tx_id: id.to_string(),
                missing,
            });
        }
        Ok(())
    }

    /// Fully endorsed: every required key has a valid signature.
    pub fn verify_required_signatures(&self) -> Result<(), LedgerError> {
        self.verify_signatures_except(&BTreeSet::new())
    }
}

/// A signed transaction the notary has ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedTransaction {
    pub transaction: SignedTransaction,
    pub notary: Party,
    /// Position assigned by the notary; strictly increasing per notary.
    pub sequence: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub notarised_at: OffsetDateTime,
    pub notary_signature: TransactionSignature,
}

impl FinalizedTransaction {
    pub fn id(&self) -> SecureHash {
        self.transaction.id()
    }

    /// The bytes a notary signs to attest `tx_id` at `sequence`.
    pub fn attestation_payload(tx_id: &SecureHash, sequence: u64) -> Vec<u8> {
        format!("{}:{}", tx_id, sequence).into_bytes()
    }

    /// Check the endorsements and the notary attestation.
    pub fn verify(&self) -> Result<(), LedgerError> {
        let id = self.id();
        if self.notary != self.transaction.tx.notary {
            return Err(LedgerError::InvalidAttestation {
                tx_id: id.to_string(),
                reason: format!(
                    "ordered by {} but draft names {}",
                    self.notary, self.transaction.tx.notary
                ),
            });
        }
        if self.notary_signature.by != self.notary.owning_key {
            return Err(LedgerError::InvalidAttestation {
                tx_id: id.to_string(),
                reason: "attestation not signed by the notary key".to_string(),
            });
        }
        self.notary_signature
            .verify_payload(&Self::attestation_payload(&id, self.sequence))?;
        self.transaction.verify_required_signatures()
    }
}
