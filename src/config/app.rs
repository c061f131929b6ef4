// src/config/app.rs
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::defaults::*;
use crate::error::{CoreError, Result};
use crate::keystore::Identity;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub identity: IdentityConfig,
    pub paths: Paths,
    pub kdf: KdfConfig,
    pub migration: MigrationConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub app_uid: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub database: PathBuf,
    pub salt: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfConfig {
    pub iterations: u32,
    /// Iteration count older releases derived keys with
    pub legacy_iterations: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub batch_size: usize,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        default_identity()
    }
}

impl Default for Paths {
    fn default() -> Self {
        default_paths()
    }
}

impl Default for KdfConfig {
    fn default() -> Self {
        default_kdf()
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        default_migration()
    }
}

impl Config {
    /// Keyring identity the configured user's keys live under
    pub fn identity(&self) -> Identity {
        Identity::new(&self.identity.app_uid, &self.identity.username)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(uid) = std::env::var("RV_APP_UID") {
            self.identity.app_uid = uid;
        }
        if let Ok(user) = std::env::var("RV_USERNAME") {
            self.identity.username = user;
        }
        if let Ok(db) = std::env::var("RV_DATABASE") {
            self.paths.database = PathBuf::from(db);
        }
        if let Ok(salt) = std::env::var("RV_SALT_PATH") {
            self.paths.salt = PathBuf::from(salt);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.identity.app_uid.is_empty() || self.identity.username.is_empty() {
            return Err(CoreError::Configuration(
                "identity.app_uid and identity.username must not be empty".into(),
            ));
        }
        if self.kdf.iterations == 0 || self.kdf.legacy_iterations == 0 {
            return Err(CoreError::Configuration(
                "kdf iteration counts must be positive".into(),
            ));
        }
        if self.migration.batch_size == 0 {
            return Err(CoreError::Configuration(
                "migration.batch_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Parse a config document; missing keys fall back to defaults. No env overrides.
pub fn from_toml_str(content: &str) -> Result<Config> {
    let conf: Config = toml::from_str(content)?;
    conf.validate()?;
    Ok(conf)
}

/// Load from an explicit path, then apply env overrides
pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let mut conf = if path.exists() {
        debug!("Loading config from {}", path.display());
        toml::from_str(&std::fs::read_to_string(path)?)?
    } else {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        Config::default()
    };

    conf.apply_env_overrides();
    conf.validate()?;
    Ok(conf)
}

/// Load from `RV_CONFIG`, or the platform config dir when unset
pub fn load() -> Result<Config> {
    let path = std::env::var("RV_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_config_path());
    load_from(path)
}
