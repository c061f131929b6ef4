// src/codec.rs
//! Read/write hooks that keep encrypted columns opaque at rest
//!
//! This is the only place ciphertext is produced or consumed. Callers hand
//! it plaintext on the way in and get plaintext back on the way out.
//! `None` (SQL NULL) is passed through untouched in both directions.

use std::sync::Arc;

use crate::cipher::Cipher;
use crate::error::Result;

#[derive(Clone)]
pub struct FieldCodec {
    cipher: Arc<Cipher>,
}

impl FieldCodec {
    pub fn new(cipher: Arc<Cipher>) -> Self {
        Self { cipher }
    }

    pub fn cipher(&self) -> &Arc<Cipher> {
        &self.cipher
    }

    /// Write hook: plaintext → stored token
    pub fn encode(&self, value: Option<&str>) -> Result<Option<String>> {
        value.map(|v| self.cipher.encrypt(v)).transpose()
    }

    /// Read hook: stored token → plaintext
    pub fn decode(&self, stored: Option<&str>) -> Result<Option<String>> {
        stored.map(|token| self.cipher.decrypt(token)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::key::SymmetricKey;

    #[test]
    fn null_never_reaches_the_cipher() {
        // An uninitialised cipher would fail any real call
        let codec = FieldCodec::new(Arc::new(Cipher::new()));
        assert_eq!(codec.encode(None).unwrap(), None);
        assert_eq!(codec.decode(None).unwrap(), None);
        assert!(matches!(
            codec.encode(Some("x")),
            Err(CoreError::Configuration(_))
        ));
    }

    #[test]
    fn empty_string_is_a_value_not_a_null() {
        let cipher = Cipher::with_keys(vec![SymmetricKey::generate()]).unwrap();
        let codec = FieldCodec::new(Arc::new(cipher));
        let stored = codec.encode(Some("")).unwrap();
        assert!(stored.as_deref().is_some_and(|t| !t.is_empty()));
        assert_eq!(codec.decode(stored.as_deref()).unwrap(), Some(String::new()));
    }
}
