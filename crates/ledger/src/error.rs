/// Errors raised while building, signing or checking ledger data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Key material could not be decoded or is not a valid Ed25519 point.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A signature failed verification against the transaction id.
    #[error("invalid signature by {signer} over {tx_id}")]
    InvalidSignature { signer: String, tx_id: String },

    /// One or more required signers have not signed.
    #[error("transaction {tx_id} is missing signatures from: {}", missing.join(", "))]
    MissingSignatures { tx_id: String, missing: Vec<String> },

    /// A signature is attached by a key that no command requires.
    #[error("transaction {tx_id} carries a signature from unexpected key {signer}")]
    UnexpectedSigner { tx_id: String, signer: String },

    /// The resolved input records do not line up with the transaction's inputs.
    #[error("input mismatch: expected {expected}, found {found}")]
    InputMismatch { expected: String, found: String },

    /// The notary attestation does not match the finalized transaction.
    #[error("invalid notary attestation on {tx_id}: {reason}")]
    InvalidAttestation { tx_id: String, reason: String },

    /// A monetary amount could not be parsed.
    #[error("invalid amount '{0}'")]
    InvalidAmount(String),

    /// A validity window cannot be represented.
    #[error("invalid time window: {0}")]
    InvalidTimeWindow(String),

    /// A linear identifier or hash could not be parsed.
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),
}
