// src/cipher.rs
//! Multi-key authenticated cipher for individual field values
//!
//! Encrypts with the primary key (position 0) and decrypts with whichever
//! held key opens the token. Re-initialising with `[new, old, ...]` is the
//! whole rotation protocol: new writes go out under `new`, old tokens keep
//! opening under `old`.
//!
//! Token layout (base64url, no padding):
//! `[version tag: 1][nonce: 24][ciphertext + Poly1305 tag: N + 16]`

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
#[allow(deprecated)] // upstream generic-array 0.x deprecation
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use parking_lot::RwLock;
use rand::RngCore;
use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::consts::{NONCE_LEN, TAG_LEN};
use crate::enums::EncryptionAlgorithm;
use crate::error::{CoreError, Result};
use crate::key::SymmetricKey;

/// Shared, re-initialisable key ring + AEAD.
///
/// Owned by the application and handed around as `Arc<Cipher>`; there is no
/// global instance.
#[derive(Default)]
pub struct Cipher {
    keys: RwLock<Vec<SymmetricKey>>,
}

impl Cipher {
    /// An uninitialised cipher; every operation fails until [`initialize`](Self::initialize)
    pub fn new() -> Self {
        Self::default()
    }

    /// A cipher that is ready to use
    pub fn with_keys(keys: Vec<SymmetricKey>) -> Result<Self> {
        let cipher = Self::new();
        cipher.initialize(keys)?;
        Ok(cipher)
    }

    /// Replace the key ring. `keys[0]` becomes the primary.
    pub fn initialize(&self, keys: Vec<SymmetricKey>) -> Result<()> {
        if keys.is_empty() {
            return Err(CoreError::Configuration("key list cannot be empty".into()));
        }
        debug!(
            "Initialising cipher with {} key(s), primary {}",
            keys.len(),
            keys[0].fingerprint()
        );
        *self.keys.write() = keys;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        !self.keys.read().is_empty()
    }

    pub fn key_count(&self) -> usize {
        self.keys.read().len()
    }

    pub fn primary_fingerprint(&self) -> Option<String> {
        self.keys.read().first().map(SymmetricKey::fingerprint)
    }

    /// Snapshot of the current ring, primary first
    pub fn keys(&self) -> Vec<SymmetricKey> {
        self.keys.read().clone()
    }

    /// Encrypt under the primary key
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let keys = self.keys.read();
        let primary = keys.first().ok_or_else(not_initialized)?;
        seal(primary, plaintext.as_bytes())
    }

    /// Decrypt with the first held key that opens `token`
    pub fn decrypt(&self, token: &str) -> Result<String> {
        let keys = self.keys.read();
        if keys.is_empty() {
            return Err(not_initialized());
        }

        let blob = parse_token(token)?;
        for (idx, key) in keys.iter().enumerate() {
            if let Some(mut plaintext) = open(key, &blob) {
                trace!("Token opened with key #{idx} ({})", key.fingerprint());
                return String::from_utf8(std::mem::take(&mut *plaintext)).map_err(|_| {
                    CoreError::Decryption("decrypted value is not valid UTF-8".into())
                });
            }
        }
        Err(CoreError::Decryption(format!(
            "none of the {} held key(s) opened the token",
            keys.len()
        )))
    }
}

fn not_initialized() -> CoreError {
    CoreError::Configuration("encryption keys not set".into())
}

#[allow(deprecated)]
fn seal(key: &SymmetricKey, plaintext: &[u8]) -> Result<String> {
    let aead = XChaCha20Poly1305::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = aead
        .encrypt(nonce, plaintext)
        .map_err(|e| CoreError::Configuration(format!("encryption failed: {e}")))?;

    let mut blob = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
    blob.push(EncryptionAlgorithm::XChaCha20Poly1305.version_tag());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(URL_SAFE_NO_PAD.encode(blob))
}

struct TokenBlob {
    nonce: [u8; NONCE_LEN],
    body: Vec<u8>,
}

fn parse_token(token: &str) -> Result<TokenBlob> {
    let raw = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|_| CoreError::Decryption("token is not base64url".into()))?;
    if raw.len() < 1 + NONCE_LEN + TAG_LEN {
        return Err(CoreError::Decryption(format!(
            "token too short ({} bytes)",
            raw.len()
        )));
    }

    match EncryptionAlgorithm::from_tag(raw[0]) {
        Some(EncryptionAlgorithm::XChaCha20Poly1305) => {}
        _ => {
            return Err(CoreError::Decryption(format!(
                "unknown token version 0x{:02x}",
                raw[0]
            )))
        }
    }

    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&raw[1..1 + NONCE_LEN]);
    Ok(TokenBlob {
        nonce,
        body: raw[1 + NONCE_LEN..].to_vec(),
    })
}

#[allow(deprecated)]
fn open(key: &SymmetricKey, blob: &TokenBlob) -> Option<Zeroizing<Vec<u8>>> {
    let aead = XChaCha20Poly1305::new(key.as_bytes().into());
    aead.decrypt(XNonce::from_slice(&blob.nonce), blob.body.as_slice())
        .ok()
        .map(Zeroizing::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_starts_with_version_tag() {
        let cipher = Cipher::with_keys(vec![SymmetricKey::generate()]).unwrap();
        let token = cipher.encrypt("x").unwrap();
        let raw = URL_SAFE_NO_PAD.decode(token).unwrap();
        assert_eq!(raw[0], EncryptionAlgorithm::XChaCha20Poly1305.version_tag());
        assert_eq!(raw.len(), 1 + NONCE_LEN + 1 + TAG_LEN);
    }

    #[test]
    fn unknown_version_is_a_decryption_error() {
        let cipher = Cipher::with_keys(vec![SymmetricKey::generate()]).unwrap();
        let token = cipher.encrypt("x").unwrap();
        let mut raw = URL_SAFE_NO_PAD.decode(token).unwrap();
        raw[0] = 0x7f;
        let forged = URL_SAFE_NO_PAD.encode(raw);
        assert!(matches!(
            cipher.decrypt(&forged),
            Err(CoreError::Decryption(_))
        ));
    }

    #[test]
    fn nonces_differ_between_encryptions() {
        let cipher = Cipher::with_keys(vec![SymmetricKey::generate()]).unwrap();
        assert_ne!(
            cipher.encrypt("same input").unwrap(),
            cipher.encrypt("same input").unwrap()
        );
    }
}
