// src/keystore/memory.rs
//! In-process credential store with fault injection

use std::collections::HashMap;

use parking_lot::Mutex;

use super::CredentialStore;
use crate::error::{CoreError, Result};

#[derive(Default)]
struct State {
    entries: HashMap<(String, String), String>,
    fail_deletes: bool,
    writes_left: Option<usize>,
}

/// `HashMap`-backed [`CredentialStore`] for tests, demos and headless setups
#[derive(Default)]
pub struct MemoryCredentialStore {
    state: Mutex<State>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `delete` fail
    pub fn fail_deletes(&self, fail: bool) {
        self.state.lock().fail_deletes = fail;
    }

    /// Allow `n` more successful writes, then fail every `set`. `None` lifts the limit.
    pub fn fail_writes_after(&self, n: Option<usize>) {
        self.state.lock().writes_left = n;
    }

    pub fn contains(&self, service: &str, account: &str) -> bool {
        self.state
            .lock()
            .entries
            .contains_key(&(service.to_owned(), account.to_owned()))
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>> {
        Ok(self
            .state
            .lock()
            .entries
            .get(&(service.to_owned(), account.to_owned()))
            .cloned())
    }

    fn set(&self, service: &str, account: &str, secret: &str) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(left) = state.writes_left.as_mut() {
            if *left == 0 {
                return Err(CoreError::Keyring(format!("injected write failure for {service}")));
            }
            *left -= 1;
        }
        state
            .entries
            .insert((service.to_owned(), account.to_owned()), secret.to_owned());
        Ok(())
    }

    fn delete(&self, service: &str, account: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_deletes {
            return Err(CoreError::Keyring(format!("injected delete failure for {service}")));
        }
        state
            .entries
            .remove(&(service.to_owned(), account.to_owned()));
        Ok(())
    }
}
