// src/kdf.rs
//! PBKDF2-HMAC-SHA256 key derivation for password → field key

use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

use crate::consts::KEY_LEN;
use crate::error::{CoreError, Result};
use crate::key::SymmetricKey;

/// Derive a field key from a password.
///
/// Deterministic: the same password, salt and iteration count always give
/// the same key. The iteration count is a parameter because keys issued
/// under an older count must stay reproducible.
pub fn derive_key(password: &str, salt: &[u8], iterations: u32) -> Result<SymmetricKey> {
    if iterations == 0 {
        return Err(CoreError::Configuration(
            "KDF iteration count must be at least 1".into(),
        ));
    }
    if salt.is_empty() {
        return Err(CoreError::Configuration("KDF salt must not be empty".into()));
    }

    debug!("Deriving key with {iterations} iterations");
    let mut output = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut output[..]);
    Ok(SymmetricKey::from_bytes(*output))
}
