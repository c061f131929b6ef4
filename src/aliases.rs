// src/aliases.rs
//! secure-gate wrappers for secret material
//!
//! These are the canonical secret types used throughout records-vault.
//! Both zeroize on drop and never print their contents.

use secure_gate::{dynamic_alias, fixed_alias};

// Fixed-size secrets
fixed_alias!(KeyBytes32, 32); // 256-bit field-encryption key

// Dynamic secrets
dynamic_alias!(Passphrase, String); // user password, only ever fed to the KDF
