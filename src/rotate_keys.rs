// src/rotate_keys.rs
//! Key-management workflows the application runs on startup and on
//! password changes
//!
//! These tie the pieces together: salt + KDF produce keys, the keyring keeps
//! them, the cipher uses them, and the migration engine moves stored data
//! between them. None of them prompt; passwords arrive as [`Passphrase`].

use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::aliases::Passphrase;
use crate::cipher::Cipher;
use crate::db::table::CLIENTS_TABLE;
use crate::error::{CoreError, Result};
use crate::kdf::derive_key;
use crate::key::SymmetricKey;
use crate::keystore::{CredentialStore, Identity, KeyringStore};
use crate::migration::{KeyProbe, MigrationEngine, MigrationReport};
use crate::salt::load_or_create_salt;

/// Build the application's cipher from the keys stored for `identity`
pub fn load_cipher<S: CredentialStore>(
    store: &KeyringStore<S>,
    identity: &Identity,
) -> Result<Arc<Cipher>> {
    let keys = store.get_keys(identity)?;
    if keys.is_empty() {
        return Err(CoreError::Configuration(format!(
            "no encryption keys stored for '{}'; set a password first",
            identity.username
        )));
    }
    Ok(Arc::new(Cipher::with_keys(keys)?))
}

fn derive_from_password(
    password: &Passphrase,
    salt_path: &Path,
    iterations: u32,
) -> Result<SymmetricKey> {
    let salt = load_or_create_salt(salt_path)?;
    derive_key(password.expose_secret(), &salt, iterations)
}

/// First-run setup: derive and store a key unless the identity already has keys
pub fn ensure_identity_keys<S: CredentialStore>(
    store: &KeyringStore<S>,
    identity: &Identity,
    password: &Passphrase,
    salt_path: &Path,
    iterations: u32,
) -> Result<Vec<SymmetricKey>> {
    let existing = store.get_keys(identity)?;
    if !existing.is_empty() {
        debug!(
            "Identity '{}' already has {} key(s)",
            identity.username,
            existing.len()
        );
        return Ok(existing);
    }

    let key = derive_from_password(password, salt_path, iterations)?;
    let keys = vec![key];
    store.set_keys(identity, &keys)?;
    info!(
        "Stored initial key {} for '{}'",
        keys[0].fingerprint(),
        identity.username
    );
    Ok(keys)
}

/// Make a key derived from `new_password` the primary.
///
/// Previously stored keys stay behind it so existing data remains readable
/// until a migration moves it over.
pub fn change_password<S: CredentialStore>(
    store: &KeyringStore<S>,
    identity: &Identity,
    new_password: &Passphrase,
    salt_path: &Path,
    iterations: u32,
) -> Result<Vec<SymmetricKey>> {
    let new_key = derive_from_password(new_password, salt_path, iterations)?;
    let previous = store.get_keys(identity)?;

    let mut keys = Vec::with_capacity(previous.len() + 1);
    keys.push(new_key);
    for key in previous {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    store.set_keys(identity, &keys)?;
    info!(
        "New primary key {} for '{}', {} older key(s) kept",
        keys[0].fingerprint(),
        identity.username,
        keys.len() - 1
    );
    Ok(keys)
}

/// Move all client data from a key derived from `old_password` to the
/// keyring's current primary, then store only the primary.
///
/// The old password is checked against stored data before anything is
/// written. A table whose first rows already open under the primary (an
/// earlier run that failed part-way) is accepted, so re-running is safe.
#[allow(clippy::too_many_arguments)]
pub fn migrate_password<S: CredentialStore>(
    conn: &mut Connection,
    cipher: &Arc<Cipher>,
    store: &KeyringStore<S>,
    identity: &Identity,
    old_password: &Passphrase,
    salt_path: &Path,
    old_iterations: u32,
    batch_size: usize,
) -> Result<MigrationReport> {
    let new_key = store
        .get_keys(identity)?
        .into_iter()
        .next()
        .ok_or_else(|| {
            CoreError::Configuration(format!(
                "no encryption keys stored for '{}'; set a new password first",
                identity.username
            ))
        })?;
    let old_key = derive_from_password(old_password, salt_path, old_iterations)?;

    let mut engine =
        MigrationEngine::new(Arc::clone(cipher), CLIENTS_TABLE).with_batch_size(batch_size)?;

    if engine.probe_key(conn, &old_key)? == KeyProbe::Rejected
        && engine.probe_key(conn, &new_key)? == KeyProbe::Rejected
    {
        return Err(CoreError::Decryption(
            "old password does not decrypt the stored data".into(),
        ));
    }

    let report = engine.reencrypt_with_new_key(conn, &old_key, &new_key)?;
    store.set_keys(identity, std::slice::from_ref(&new_key))?;
    info!(
        "Password migration for '{}' done, {} record(s) now under {}",
        identity.username,
        report.records,
        new_key.fingerprint()
    );
    Ok(report)
}

/// Re-seal all client data under the cipher's primary key.
///
/// With `retire_old`, the keyring and the cipher are reduced to the primary
/// once verification has passed.
pub fn rotate_to_primary<S: CredentialStore>(
    conn: &mut Connection,
    cipher: &Arc<Cipher>,
    store: &KeyringStore<S>,
    identity: &Identity,
    batch_size: usize,
    retire_old: bool,
) -> Result<MigrationReport> {
    let mut engine =
        MigrationEngine::new(Arc::clone(cipher), CLIENTS_TABLE).with_batch_size(batch_size)?;
    let report = engine.reencrypt_with_primary(conn)?;

    if retire_old {
        if let Some(primary) = cipher.keys().into_iter().next() {
            store.set_keys(identity, std::slice::from_ref(&primary))?;
            cipher.initialize(vec![primary])?;
            info!(
                "Retired all keys except the primary for '{}'",
                identity.username
            );
        }
    }
    Ok(report)
}
