//! Transaction hashes and signatures.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::LedgerError;
use crate::identity::PublicKey;

/// Lowercase hex SHA-256 digest.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SecureHash(String);

impl SecureHash {
    pub fn sha256(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(bytes)))
    }

    /// Parse a 64-character hex digest.
    pub fn parse(hex: &str) -> Result<Self, LedgerError> {
        if hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(hex.to_ascii_lowercase()))
        } else {
            Err(LedgerError::InvalidIdentifier(hex.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for logs.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Debug for SecureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureHash({})", self.short())
    }
}

impl fmt::Display for SecureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for SecureHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SecureHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        SecureHash::parse(&hex).map_err(serde::de::Error::custom)
    }
}

/// A detached Ed25519 signature over a transaction id.
///
/// The signed message is the UTF-8 hex form of the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub by: PublicKey,
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
}

impl TransactionSignature {
    /// Sign `tx_id` with `key`.
    pub fn create(key: &SigningKey, tx_id: &SecureHash) -> Self {
        Self::sign_payload(key, tx_id.as_str().as_bytes())
    }

    /// Sign an arbitrary payload. Used for notary attestations.
    pub fn sign_payload(key: &SigningKey, payload: &[u8]) -> Self {
        let signature = key.sign(payload);
        Self {
            by: PublicKey::from(key.verifying_key()),
            bytes: signature.to_bytes().to_vec(),
        }
    }

    pub fn verify(&self, tx_id: &SecureHash) -> Result<(), LedgerError> {
        self.verify_payload(tx_id.as_str().as_bytes())
    }

    pub fn verify_payload(&self, payload: &[u8]) -> Result<(), LedgerError> {
        self.by.verify(payload, &self.bytes)
    }
}

pub(crate) mod base64_bytes {
    use super::BASE64;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map_err(serde::de::Error::custom)
    }
}
