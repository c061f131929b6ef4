// src/keystore/os.rs
//! Platform credential store (macOS Keychain, Windows Credential Manager, Linux keyutils)

use ::keyring::{Entry, Error as KeyringError};

use super::CredentialStore;
use crate::error::{CoreError, Result};

/// [`CredentialStore`] backed by the `keyring` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct OsCredentialStore;

fn entry(service: &str, account: &str) -> Result<Entry> {
    Entry::new(service, account).map_err(|e| CoreError::Keyring(e.to_string()))
}

impl CredentialStore for OsCredentialStore {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>> {
        match entry(service, account)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(KeyringError::NoEntry) => Ok(None),
            Err(e) => Err(CoreError::Keyring(e.to_string())),
        }
    }

    fn set(&self, service: &str, account: &str, secret: &str) -> Result<()> {
        entry(service, account)?
            .set_password(secret)
            .map_err(|e| CoreError::Keyring(e.to_string()))
    }

    fn delete(&self, service: &str, account: &str) -> Result<()> {
        match entry(service, account)?.delete_credential() {
            Ok(()) | Err(KeyringError::NoEntry) => Ok(()),
            Err(e) => Err(CoreError::Keyring(e.to_string())),
        }
    }
}
