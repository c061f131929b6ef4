// src/lib.rs
//! records-vault: encrypted-field persistence and key rotation for client records
//!
//! Features:
//! - PBKDF2-HMAC-SHA256 password keys with a write-once salt file
//! - Versioned key rings in the OS credential store (legacy shapes still read)
//! - Multi-key XChaCha20-Poly1305 field encryption
//! - Batched, verified re-encryption with per-batch rollback

pub mod aliases;
pub mod cipher;
pub mod codec;
pub mod config;
pub mod consts;
pub mod db;
pub mod enums;
pub mod error;
pub mod kdf;
pub mod key;
pub mod keystore;
pub mod migration;
pub mod rotate_keys;
pub mod salt;

// Re-export everything users need at the crate root
pub use aliases::Passphrase;
pub use cipher::Cipher;
pub use codec::FieldCodec;
pub use config::{load as load_config, Config};
pub use db::{
    open_records_db, ClientField, ClientPatch, ClientRecord, ClientStore, EncryptedTable,
    CLIENTS_TABLE,
};
pub use enums::{EncryptionAlgorithm, KeyringFormat};
pub use error::{CoreError, MigrationError, MigrationPhase, Result};
pub use kdf::derive_key;
pub use key::{is_valid_key, SymmetricKey};
#[cfg(feature = "os-keyring")]
pub use keystore::OsCredentialStore;
pub use keystore::{CredentialStore, Identity, KeyringStore, MemoryCredentialStore};
pub use migration::{
    BatchProgress, Checkpoint, KeyProbe, MigrationCheckpoint, MigrationEngine, MigrationReport,
    MigrationState,
};
pub use rotate_keys::{
    change_password, ensure_identity_keys, load_cipher, migrate_password, rotate_to_primary,
};
pub use salt::load_or_create_salt;
