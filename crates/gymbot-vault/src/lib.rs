//! `gymbot-vault` — reversible encryption for stored provider credentials.
//!
//! The booking provider has no delegated-auth mechanism, so the user's own
//! password must be recoverable at fire time. Secrets are sealed with
//! AES-256-GCM under a single key from config; the stored form is
//! `base64(nonce ‖ ciphertext)` with a fresh random 96-bit nonce per call.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use thiserror::Error;

/// Key size in bytes (256 bits for AES-256).
pub const KEY_SIZE: usize = 32;

/// AES-GCM nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Invalid vault key: {0}")]
    InvalidKey(String),

    #[error("Encryption failed: {0}")]
    Encrypt(String),

    #[error("Decryption failed: {0}")]
    Decrypt(String),
}

pub type Result<T> = std::result::Result<T, VaultError>;

/// Seals and unseals provider credentials.
pub struct CredentialVault {
    cipher: Aes256Gcm,
}

impl CredentialVault {
    /// Build a vault from a base64-encoded 32-byte key.
    pub fn from_base64_key(key_b64: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(key_b64.trim())
            .map_err(|e| VaultError::InvalidKey(e.to_string()))?;
        if bytes.len() != KEY_SIZE {
            return Err(VaultError::InvalidKey(format!(
                "expected {KEY_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let key = Key::<Aes256Gcm>::from_slice(&bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Generate a fresh random key in the base64 form the config expects.
    pub fn generate_key() -> String {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        BASE64.encode(key)
    }

    /// Encrypt a secret for storage. Each call produces a different token
    /// even for the same input (random nonce).
    pub fn encrypt(&self, secret: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, secret.as_bytes())
            .map_err(|e| VaultError::Encrypt(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(sealed))
    }

    /// Recover a secret previously produced by [`CredentialVault::encrypt`].
    pub fn decrypt(&self, token: &str) -> Result<String> {
        let sealed = BASE64
            .decode(token.trim())
            .map_err(|e| VaultError::Decrypt(e.to_string()))?;
        if sealed.len() <= NONCE_SIZE {
            return Err(VaultError::Decrypt("token too short".to_string()));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| VaultError::Decrypt(e.to_string()))?;
        String::from_utf8(plaintext).map_err(|e| VaultError::Decrypt(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> CredentialVault {
        CredentialVault::from_base64_key(&CredentialVault::generate_key()).unwrap()
    }

    #[test]
    fn roundtrip() {
        let v = vault();
        let token = v.encrypt("hunter2").unwrap();
        assert_eq!(v.decrypt(&token).unwrap(), "hunter2");
    }

    #[test]
    fn tokens_differ_for_same_secret() {
        let v = vault();
        let a = v.encrypt("same").unwrap();
        let b = v.encrypt("same").unwrap();
        assert_ne!(a, b);
        assert_eq!(v.decrypt(&a).unwrap(), v.decrypt(&b).unwrap());
    }

    #[test]
    fn wrong_key_fails() {
        let token = vault().encrypt("secret").unwrap();
        let other = vault();
        assert!(other.decrypt(&token).is_err());
    }

    #[test]
    fn tampered_token_fails() {
        let v = vault();
        let token = v.encrypt("secret").unwrap();
        let mut sealed = BASE64.decode(&token).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(v.decrypt(&BASE64.encode(sealed)).is_err());
    }

    #[test]
    fn bad_key_material_rejected() {
        assert!(CredentialVault::from_base64_key("not base64!!").is_err());
        assert!(CredentialVault::from_base64_key(&BASE64.encode([0u8; 16])).is_err());
    }
}
