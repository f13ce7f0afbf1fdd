//! Security-sensitive operations centralized for audit: bearer-token
//! comparison, webhook signature verification, and the message-at-rest
//! encryption key lifecycle.
use crate::constants::{ENCRYPTION_KEY_FILE, ENCRYPTION_KEY_LEN};
use crate::{FleetError, Result};
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::fs;
use std::path::{Path, PathBuf};
use subtle::ConstantTimeEq;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Constant-time equality check for secrets received over the wire
/// (bearer tokens, webhook signatures). Avoids leaking length/prefix
/// information via early-exit comparison timing.
pub fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Verifies a Linear-style `linear-signature` header: lowercase hex
/// HMAC-SHA256 of the raw request body under the shared webhook secret.
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let expected = mac.finalize().into_bytes();
    let expected_hex = hex_encode(&expected);
    secure_compare(&expected_hex, &signature_hex.to_lowercase())
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

/// 256-bit key for message-at-rest encryption, cached for the process
/// lifetime by the caller (see `main.rs`).
#[derive(Clone)]
pub struct EncryptionKey([u8; ENCRYPTION_KEY_LEN]);

impl EncryptionKey {
    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new_from_slice(&self.0).expect("key length fixed at compile time")
    }

    /// Encrypts `plaintext`, returning a base64-encoded `nonce || ciphertext`.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let cipher = self.cipher();
        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| FleetError::Internal(anyhow::anyhow!("message encryption failed")))?;
        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(combined))
    }

    /// Decrypts a value produced by `encrypt`.
    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let combined = BASE64
            .decode(encoded)
            .map_err(|_| FleetError::Internal(anyhow::anyhow!("malformed ciphertext encoding")))?;
        if combined.len() < 12 {
            return Err(FleetError::Internal(anyhow::anyhow!(
                "ciphertext too short to contain a nonce"
            )));
        }
        let (nonce_bytes, ciphertext) = combined.split_at(12);
        let cipher = self.cipher();
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| FleetError::Internal(anyhow::anyhow!("message decryption failed")))?;
        String::from_utf8(plaintext)
            .map_err(|_| FleetError::Internal(anyhow::anyhow!("decrypted message was not utf-8")))
    }
}

/// Loads the encryption key from `<data_dir>/message-key.bin`, generating
/// and persisting a new one on first run. The key directory and file are
/// restricted to owner-only access.
pub fn load_or_generate_encryption_key(data_dir: &Path) -> Result<EncryptionKey> {
    fs::create_dir_all(data_dir)
        .map_err(|e| FleetError::Config(format!("failed to create data dir: {e}")))?;
    set_dir_permissions(data_dir)?;

    let key_path = data_dir.join(ENCRYPTION_KEY_FILE);

    if key_path.exists() {
        let bytes = fs::read(&key_path)
            .map_err(|e| FleetError::Config(format!("failed to read encryption key: {e}")))?;
        if bytes.len() != ENCRYPTION_KEY_LEN {
            warn!(
                "encryption key file has unexpected length {} (expected {})",
                bytes.len(),
                ENCRYPTION_KEY_LEN
            );
            return Err(FleetError::Config(
                "encryption key file is corrupt".to_string(),
            ));
        }
        info!("loaded message encryption key from {}", key_path.display());
        let mut key = [0u8; ENCRYPTION_KEY_LEN];
        key.copy_from_slice(&bytes);
        return Ok(EncryptionKey(key));
    }

    info!("no encryption key found, generating one at {}", key_path.display());
    let mut key = [0u8; ENCRYPTION_KEY_LEN];
    OsRng.fill_bytes(&mut key);
    fs::write(&key_path, key)
        .map_err(|e| FleetError::Config(format!("failed to write encryption key: {e}")))?;
    set_file_permissions(&key_path)?;
    Ok(EncryptionKey(key))
}

#[cfg(unix)]
fn set_file_permissions(path: &PathBuf) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)
        .map_err(|e| FleetError::Config(format!("failed to stat key file: {e}")))?
        .permissions();
    perms.set_mode(0o600);
    fs::set_permissions(path, perms)
        .map_err(|e| FleetError::Config(format!("failed to chmod key file: {e}")))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &PathBuf) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)
        .map_err(|e| FleetError::Config(format!("failed to stat data dir: {e}")))?
        .permissions();
    perms.set_mode(0o700);
    fs::set_permissions(path, perms)
        .map_err(|e| FleetError::Config(format!("failed to chmod data dir: {e}")))
}

#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
