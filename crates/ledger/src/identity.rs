//! Party identities and their Ed25519 owning keys.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::LedgerError;

/// An Ed25519 public key, stored as its 32 compressed bytes.
///
/// Keys order by their byte representation, which is what keeps signer sets
/// and signature lists deterministic regardless of the order in which they
/// were gathered. Serialized as a base64 string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Wrap raw key bytes, rejecting anything that is not a valid curve point.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, LedgerError> {
        VerifyingKey::from_bytes(&bytes).map_err(|e| LedgerError::InvalidKey(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Decode a base64-encoded key.
    pub fn from_base64(encoded: &str) -> Result<Self, LedgerError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| LedgerError::InvalidKey(e.to_string()))?;
        let key_bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| LedgerError::InvalidKey("expected 32 bytes".to_string()))?;
        Self::from_bytes(key_bytes)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Short hex fingerprint (first 8 key bytes) for logs.
    pub fn fingerprint(&self) -> String {
        self.0[..8].iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Verify `signature` over `message` with this key.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), LedgerError> {
        let key = VerifyingKey::from_bytes(&self.0)
            .map_err(|e| LedgerError::InvalidKey(e.to_string()))?;
        let sig = Signature::from_slice(signature).map_err(|_| LedgerError::InvalidSignature {
            signer: self.fingerprint(),
            tx_id: String::from_utf8_lossy(message).into_owned(),
        })?;
        key.verify(message, &sig)
            .map_err(|_| LedgerError::InvalidSignature {
                signer: self.fingerprint(),
                tx_id: String::from_utf8_lossy(message).into_owned(),
            })
    }
}

impl From<VerifyingKey> for PublicKey {
    fn from(key: VerifyingKey) -> Self {
        Self(key.to_bytes())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.fingerprint())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        PublicKey::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

/// A named network participant and the key that owns its records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub owning_key: PublicKey,
}

impl Party {
    pub fn new(name: impl Into<String>, owning_key: PublicKey) -> Self {
        Self {
            name: name.into(),
            owning_key,
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
