use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use covenant_flows::LocalKeyStore;
use covenant_ledger::PublicKey;
use ed25519_dalek::SigningKey;

/// Generate a node identity key and write it to `<prefix>.secret` and
/// `<prefix>.pub`, both base64. The secret file is made owner-only on Unix.
pub fn cmd_keygen(algorithm: &str, output_prefix: &str, quiet: bool) {
    if algorithm != "ed25519" {
        eprintln!(
            "error: unsupported algorithm '{}'; only 'ed25519' is supported",
            algorithm
        );
        std::process::exit(1);
    }

    let mut rng = rand::rngs::OsRng;
    let signing_key = SigningKey::generate(&mut rng);
    let public_key = PublicKey::from(signing_key.verifying_key());

    let secret_path = format!("{}.secret", output_prefix);
    if let Err(e) = std::fs::write(&secret_path, BASE64.encode(signing_key.to_bytes())) {
        eprintln!("error writing secret key to '{}': {}", secret_path, e);
        std::process::exit(1);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        if let Err(e) = std::fs::set_permissions(&secret_path, perms) {
            eprintln!(
                "warning: failed to set permissions on '{}': {}",
                secret_path, e
            );
        }
    }

    let pub_path = format!("{}.pub", output_prefix);
    if let Err(e) = std::fs::write(&pub_path, public_key.to_base64()) {
        eprintln!("error writing public key to '{}': {}", pub_path, e);
        std::process::exit(1);
    }

    if !quiet {
        println!(
            "Generated Ed25519 keypair: {}.secret, {}.pub (fingerprint {})",
            output_prefix,
            output_prefix,
            public_key.fingerprint()
        );
    }
}

/// Load a key store from a secret key file written by `covenant keygen`.
pub fn read_secret_key(path: &Path) -> Result<LocalKeyStore, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("error reading secret key '{}': {}", path.display(), e))?;
    LocalKeyStore::from_base64(&contents)
        .map_err(|e| format!("error loading secret key '{}': {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_flows::KeyManagementService;
    use tempfile::TempDir;

    /// Read a public key file written by `covenant keygen`.
    fn read_public_key(path: &Path) -> Result<PublicKey, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("error reading public key '{}': {}", path.display(), e))?;
        PublicKey::from_base64(contents.trim())
            .map_err(|e| format!("error loading public key '{}': {}", path.display(), e))
    }

    /// Check that a secret key file and a public key file belong together.
    fn keys_match(secret: &Path, public: &Path) -> Result<bool, String> {
        Ok(read_secret_key(secret)?.public_key() == read_public_key(public)?)
    }

    #[test]
    fn keygen_round_trips_through_files() {
        let tmp = TempDir::new().unwrap();
        let prefix = tmp.path().join("node");
        cmd_keygen("ed25519", prefix.to_str().unwrap(), true);

        let secret = tmp.path().join("node.secret");
        let public = tmp.path().join("node.pub");
        assert!(keys_match(&secret, &public).unwrap());

        let store = read_secret_key(&secret).unwrap();
        let sig = store.sign_payload(b"roundtrip");
        sig.verify_payload(b"roundtrip").unwrap();
        assert_eq!(sig.by, read_public_key(&public).unwrap());
    }

    #[test]
    fn invalid_key_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let bad = tmp.path().join("bad.secret");
        std::fs::write(&bad, "not-valid-base64!!!").unwrap();
        assert!(read_secret_key(&bad).is_err());

        let short = tmp.path().join("short.secret");
        std::fs::write(&short, BASE64.encode([7u8; 16])).unwrap();
        let err = read_secret_key(&short).unwrap_err();
        assert!(err.contains("32 bytes"), "{err}");
    }

    #[test]
    fn missing_key_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(read_secret_key(&tmp.path().join("absent.secret")).is_err());
    }
}
