// src/keystore/mod.rs
//! Durable storage of an identity's key ring in a credential store
//!
//! The canonical on-disk shape is the versioned one:
//!
//! | service               | account    | secret          |
//! |-----------------------|------------|-----------------|
//! | `{uid}_key_count`     | `username` | `"N"`           |
//! | `{uid}_key_{idx}`     | `username` | base64url key   |
//!
//! Older releases kept everything in one `(uid, username)` entry, either as a
//! JSON array of keys or as a single bare key. Both are still read; any
//! `set_keys` call rewrites the identity in the versioned shape.

mod memory;
#[cfg(feature = "os-keyring")]
mod os;

pub use memory::MemoryCredentialStore;
#[cfg(feature = "os-keyring")]
pub use os::OsCredentialStore;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::consts::{KEY_COUNT_SUFFIX, KEY_ENTRY_INFIX};
use crate::enums::KeyringFormat;
use crate::error::{CoreError, Result};
use crate::key::SymmetricKey;

/// get/set/delete over `(service, account)` pairs
pub trait CredentialStore {
    /// `Ok(None)` when no entry exists
    fn get(&self, service: &str, account: &str) -> Result<Option<String>>;

    fn set(&self, service: &str, account: &str, secret: &str) -> Result<()>;

    /// Deleting a missing entry is not an error
    fn delete(&self, service: &str, account: &str) -> Result<()>;
}

/// Application identity + user the keys belong to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub app_uid: String,
    pub username: String,
}

impl Identity {
    pub fn new(app_uid: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            app_uid: app_uid.into(),
            username: username.into(),
        }
    }

    fn count_service(&self) -> String {
        format!("{}{KEY_COUNT_SUFFIX}", self.app_uid)
    }

    fn entry_service(&self, idx: usize) -> String {
        format!("{}{KEY_ENTRY_INFIX}{idx}", self.app_uid)
    }
}

/// Ordered key lists per identity, on top of any [`CredentialStore`]
pub struct KeyringStore<S> {
    backend: S,
}

impl<S: CredentialStore> KeyringStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// All stored keys, primary first. Empty when nothing is stored.
    pub fn get_keys(&self, identity: &Identity) -> Result<Vec<SymmetricKey>> {
        let (format, keys) = self.load(identity)?;
        debug!(
            "Loaded {} key(s) for '{}' ({format:?})",
            keys.len(),
            identity.username
        );
        Ok(keys)
    }

    /// Which on-disk shape currently holds this identity's keys
    pub fn stored_format(&self, identity: &Identity) -> Result<KeyringFormat> {
        Ok(self.load(identity)?.0)
    }

    /// Replace the stored key list.
    ///
    /// Entries are written last index first. When the list grows over an
    /// existing versioned ring, the count marker is raised before any entry
    /// is touched (missing entries are skipped on read). Together this keeps
    /// every previously stored key readable at each intermediate step of the
    /// usual `[new, old...]` and `[primary]` updates, so an interrupted call
    /// never strands data. Removing stale entries afterwards is best-effort:
    /// a failed delete is logged and ignored.
    pub fn set_keys(&self, identity: &Identity, keys: &[SymmetricKey]) -> Result<()> {
        if keys.is_empty() {
            return Err(CoreError::Configuration(
                "refusing to store an empty key list".into(),
            ));
        }
        debug!(
            "Storing {} key(s) for '{}' in keyring",
            keys.len(),
            identity.username
        );

        let previous_count = match self.read_count(identity) {
            Ok(count) => count,
            Err(e) => {
                warn!("Could not read previous key count: {e}");
                None
            }
        };

        if previous_count.is_some_and(|old| keys.len() > old) {
            self.write_count(identity, keys.len())?;
        }
        for (idx, key) in keys.iter().enumerate().rev() {
            self.backend.set(
                &identity.entry_service(idx),
                &identity.username,
                &key.to_base64url(),
            )?;
        }
        self.write_count(identity, keys.len())?;

        // Cleanup
        if let Some(old_count) = previous_count {
            for idx in keys.len()..old_count {
                if let Err(e) = self
                    .backend
                    .delete(&identity.entry_service(idx), &identity.username)
                {
                    warn!("Could not delete stale key entry {idx}: {e}");
                }
            }
        }
        if let Err(e) = self
            .backend
            .delete(&identity.app_uid, &identity.username)
        {
            warn!("Could not delete legacy key entry: {e}");
        }

        Ok(())
    }

    fn write_count(&self, identity: &Identity, count: usize) -> Result<()> {
        self.backend.set(
            &identity.count_service(),
            &identity.username,
            &count.to_string(),
        )
    }

    fn read_count(&self, identity: &Identity) -> Result<Option<usize>> {
        let Some(raw) = self
            .backend
            .get(&identity.count_service(), &identity.username)?
        else {
            return Ok(None);
        };
        raw.trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| CoreError::Keyring(format!("invalid key count marker `{raw}`")))
    }

    fn load(&self, identity: &Identity) -> Result<(KeyringFormat, Vec<SymmetricKey>)> {
        if let Some(count) = self.read_count(identity)? {
            let mut keys = Vec::with_capacity(count);
            for idx in 0..count {
                match self
                    .backend
                    .get(&identity.entry_service(idx), &identity.username)?
                {
                    Some(encoded) => keys.push(SymmetricKey::from_base64url(&encoded)?),
                    None => warn!("Key entry {idx} of {count} is missing; skipping it"),
                }
            }
            return Ok((KeyringFormat::Versioned, keys));
        }

        let Some(data) = self.backend.get(&identity.app_uid, &identity.username)? else {
            return Ok((KeyringFormat::Empty, Vec::new()));
        };
        if data.trim().is_empty() {
            return Ok((KeyringFormat::Empty, Vec::new()));
        }

        match serde_json::from_str::<serde_json::Value>(&data) {
            Ok(serde_json::Value::Array(items)) => {
                let keys = items
                    .iter()
                    .map(|item| match item.as_str() {
                        Some(encoded) => SymmetricKey::from_base64url(encoded),
                        None => Err(CoreError::Keyring(
                            "legacy key list contains a non-string entry".into(),
                        )),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok((KeyringFormat::LegacyJsonList, keys))
            }
            Ok(serde_json::Value::String(encoded)) => Ok((
                KeyringFormat::LegacySingle,
                vec![SymmetricKey::from_base64url(&encoded)?],
            )),
            _ => {
                debug!("Legacy entry is not a JSON list, reading it as a single key");
                Ok((
                    KeyringFormat::LegacySingle,
                    vec![SymmetricKey::from_base64url(&data)?],
                ))
            }
        }
    }
}
