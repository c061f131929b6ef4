// src/key.rs
//! Symmetric field keys and their string representations
//!
//! A key is 32 secret bytes. Outside the process it only ever exists as a
//! base64url string (in the OS keyring). Log lines identify keys by their
//! BLAKE3 fingerprint, never by content.

use std::fmt;

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::aliases::KeyBytes32;
use crate::consts::{FINGERPRINT_LEN, KEY_LEN};
use crate::error::{CoreError, Result};

/// 256-bit symmetric key, zeroized on drop
pub struct SymmetricKey(KeyBytes32);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(KeyBytes32::new(bytes))
    }

    /// Generate a new random key from the thread-local CSPRNG
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        rand::rng().fill_bytes(&mut bytes[..]);
        Self::from_bytes(*bytes)
    }

    /// Parse the external representation (padded or unpadded base64url).
    ///
    /// Wrong encoding or length fails here, never later at encrypt/decrypt time.
    pub fn from_base64url(encoded: &str) -> Result<Self> {
        let trimmed = encoded.trim();
        let decoded = URL_SAFE
            .decode(trimmed)
            .or_else(|_| URL_SAFE_NO_PAD.decode(trimmed))
            .map(Zeroizing::new)
            .map_err(|e| CoreError::InvalidKey(format!("not base64url: {e}")))?;

        let bytes: [u8; KEY_LEN] = decoded.as_slice().try_into().map_err(|_| {
            CoreError::InvalidKey(format!(
                "expected {KEY_LEN} bytes, got {}",
                decoded.len()
            ))
        })?;
        Ok(Self::from_bytes(bytes))
    }

    /// Padded base64url, the format the keyring has always stored
    pub fn to_base64url(&self) -> String {
        URL_SAFE.encode(self.0.expose_secret())
    }

    /// Short non-secret identifier for logs and reports
    pub fn fingerprint(&self) -> String {
        let hash = blake3::hash(self.0.expose_secret());
        hash.to_hex().as_str()[..FINGERPRINT_LEN * 2].to_string()
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        self.0.expose_secret()
    }
}

impl Clone for SymmetricKey {
    fn clone(&self) -> Self {
        Self::from_bytes(*self.0.expose_secret())
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        // blake3::Hash equality is constant-time
        blake3::hash(self.0.expose_secret()) == blake3::hash(other.0.expose_secret())
    }
}

impl Eq for SymmetricKey {}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SymmetricKey")
            .field(&self.fingerprint())
            .finish()
    }
}

/// Whether `encoded` would be accepted as a key
pub fn is_valid_key(encoded: &str) -> bool {
    SymmetricKey::from_base64url(encoded).is_ok()
}
