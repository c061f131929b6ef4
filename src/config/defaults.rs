// src/config/defaults.rs
use std::path::PathBuf;

use crate::config::app::{IdentityConfig, KdfConfig, MigrationConfig, Paths};
use crate::consts::{
    APP_DIR_NAME, DEFAULT_APP_UID, DEFAULT_BATCH_SIZE, DEFAULT_KDF_ITERATIONS,
    LEGACY_KDF_ITERATIONS,
};

pub const DEFAULT_DATABASE_FILE: &str = "records.db";
pub const DEFAULT_SALT_FILE: &str = "salt.bin";
pub const CONFIG_FILE_NAME: &str = "config.toml";

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "default".into())
}

fn app_dir(base: Option<PathBuf>) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR_NAME)
}

pub fn default_config_path() -> PathBuf {
    app_dir(dirs::config_dir()).join(CONFIG_FILE_NAME)
}

pub fn default_identity() -> IdentityConfig {
    IdentityConfig {
        app_uid: DEFAULT_APP_UID.into(),
        username: current_user(),
    }
}

pub fn default_paths() -> Paths {
    Paths {
        database: app_dir(dirs::data_dir()).join(DEFAULT_DATABASE_FILE),
        salt: app_dir(dirs::config_dir()).join(DEFAULT_SALT_FILE),
    }
}

pub fn default_kdf() -> KdfConfig {
    KdfConfig {
        iterations: DEFAULT_KDF_ITERATIONS,
        legacy_iterations: LEGACY_KDF_ITERATIONS,
    }
}

pub fn default_migration() -> MigrationConfig {
    MigrationConfig {
        batch_size: DEFAULT_BATCH_SIZE,
    }
}
