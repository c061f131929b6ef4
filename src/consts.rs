// src/consts.rs
//! Shared constants: security parameters and defaults

/// PBKDF2 iterations for newly derived keys
pub const DEFAULT_KDF_ITERATIONS: u32 = 600_000;

/// Iteration count used by older releases; needed to re-derive their keys
pub const LEGACY_KDF_ITERATIONS: u32 = 480_000;

/// Field keys are 256-bit
pub const KEY_LEN: usize = 32;

/// Salt file length in bytes
pub const SALT_LEN: usize = 16;

/// XChaCha20-Poly1305 nonce length
pub const NONCE_LEN: usize = 24;

/// Poly1305 tag length
pub const TAG_LEN: usize = 16;

/// Bytes of the BLAKE3 digest shown as a key fingerprint
pub const FINGERPRINT_LEN: usize = 8;

/// Records per migration transaction
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Keyring service name used when no config overrides it
pub const DEFAULT_APP_UID: &str = "liebermann-schulpsychologie.github.io";

/// Suffix of the keyring service that holds the versioned key count
pub const KEY_COUNT_SUFFIX: &str = "_key_count";

/// Infix of the keyring services that hold individual keys (`{uid}_key_{idx}`)
pub const KEY_ENTRY_INFIX: &str = "_key_";

/// Directory name under the platform config/data dirs
pub const APP_DIR_NAME: &str = "records-vault";
