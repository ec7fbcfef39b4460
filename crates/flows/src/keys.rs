//! Key management: the only place a node's private key is held.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use covenant_ledger::{LedgerError, PublicKey, SecureHash, TransactionSignature};
use ed25519_dalek::SigningKey;

pub trait KeyManagementService: Send + Sync {
    fn public_key(&self) -> PublicKey;

    /// Endorse a transaction id.
    fn sign(&self, tx_id: &SecureHash) -> TransactionSignature;

    /// Sign arbitrary bytes, e.g. a notary attestation.
    fn sign_payload(&self, payload: &[u8]) -> TransactionSignature;
}

/// Holds one Ed25519 signing key in memory.
#[derive(Debug)]
pub struct LocalKeyStore {
    key: SigningKey,
}

impl LocalKeyStore {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self::new(SigningKey::generate(&mut csprng))
    }

    /// Load a 32-byte secret key encoded as base64, as written by
    /// `covenant keygen`.
    pub fn from_base64(encoded: &str) -> Result<Self, LedgerError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| LedgerError::InvalidKey(format!("invalid base64 secret key: {}", e)))?;
        let secret: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            LedgerError::InvalidKey(format!("secret key must be 32 bytes, got {}", v.len()))
        })?;
        Ok(Self::new(SigningKey::from_bytes(&secret)))
    }
}

impl KeyManagementService for LocalKeyStore {
    fn public_key(&self) -> PublicKey {
        PublicKey::from(self.key.verifying_key())
    }

    fn sign(&self, tx_id: &SecureHash) -> TransactionSignature {
        TransactionSignature::create(&self.key, tx_id)
    }

    fn sign_payload(&self, payload: &[u8]) -> TransactionSignature {
        TransactionSignature::sign_payload(&self.key, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_secret_round_trips_to_same_public_key() {
        let key = SigningKey::generate(&mut rand::rngs::OsRng);
        let encoded = BASE64.encode(key.to_bytes());
        let loaded = LocalKeyStore::from_base64(&format!("{encoded}\n")).unwrap();
        assert_eq!(loaded.public_key(), PublicKey::from(key.verifying_key()));
    }

    #[test]
    fn short_secret_is_rejected() {
        let err = LocalKeyStore::from_base64(&BASE64.encode([7u8; 16]))
            .err()
            .expect("16 bytes is not a key");
        assert!(err.to_string().contains("32 bytes"));
    }

    #[test]
    fn signatures_verify_against_public_key() {
        let store = LocalKeyStore::generate();
        let id = SecureHash::sha256(b"draft");
        let sig = store.sign(&id);
        assert_eq!(sig.by, store.public_key());
        sig.verify(&id).unwrap();
    }
}
