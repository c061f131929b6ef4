// src/enums.rs
//! Public enum types used throughout the crate
//!
//! Central location for the small enums that describe formats:
//! token algorithms and keyring storage shapes.

use serde::{Deserialize, Serialize};

/// Algorithm of a ciphertext token, identified by its first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[non_exhaustive]
pub enum EncryptionAlgorithm {
    #[default]
    XChaCha20Poly1305,
}

impl EncryptionAlgorithm {
    pub const fn version_tag(self) -> u8 {
        match self {
            EncryptionAlgorithm::XChaCha20Poly1305 => 0x01,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(EncryptionAlgorithm::XChaCha20Poly1305),
            _ => None,
        }
    }
}

/// Shape in which an identity's keys were found in the credential store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyringFormat {
    /// `{uid}_key_count` marker plus one `{uid}_key_{idx}` entry per key
    Versioned,
    /// Single `(uid, username)` entry holding a JSON array of keys
    LegacyJsonList,
    /// Single `(uid, username)` entry holding one bare key
    LegacySingle,
    /// Nothing stored for this identity
    Empty,
}
