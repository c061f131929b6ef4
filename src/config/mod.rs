// src/config/mod.rs
//! Configuration system for records-vault
//!
//! TOML file + env overrides, built-in defaults when no file exists.

pub use app::{
    from_toml_str, load, load_from, Config, IdentityConfig, KdfConfig, MigrationConfig, Paths,
};

mod app;
mod defaults;
