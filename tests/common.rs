// tests/common.rs
//! Shared test utilities: logging setup and fixtures

#![allow(dead_code)]

use std::sync::Arc;

use records_vault::{
    Cipher, ClientRecord, ClientStore, FieldCodec, Identity, KeyringStore,
    MemoryCredentialStore,
};
use rusqlite::Connection;

#[cfg(feature = "logging")]
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Keeps PBKDF2 fast in tests; production uses 600k
pub const FAST_ITERATIONS: u32 = 1_000;

/// Initialize test-friendly logging, respects RUST_LOG=
/// Call once at the start of any test that needs logs
pub fn setup() {
    #[cfg(feature = "logging")]
    tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok(); // idempotent

    #[cfg(not(feature = "logging"))]
    { /* no-op */ }
}

/// Force info-level logging, used by migration tests to show progress lines
pub fn setup_info() {
    #[cfg(feature = "logging")]
    tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(EnvFilter::new("info"))
        .try_init()
        .ok();

    #[cfg(not(feature = "logging"))]
    { /* no-op */ }
}

pub fn test_identity() -> Identity {
    Identity::new("test.records-vault", "tester")
}

pub fn memory_keyring() -> KeyringStore<MemoryCredentialStore> {
    KeyringStore::new(MemoryCredentialStore::new())
}

/// In-memory client database sharing `cipher`
pub fn memory_store(cipher: &Arc<Cipher>) -> ClientStore {
    let conn = Connection::open_in_memory().unwrap();
    ClientStore::new(conn, FieldCodec::new(Arc::clone(cipher))).unwrap()
}

/// Deterministic, distinguishable sample client
pub fn sample_client(n: usize) -> ClientRecord {
    use records_vault::ClientField::*;
    let mut client = ClientRecord::new(
        format!("School {}", n % 3),
        format!("First{n}"),
        format!("Last{n}"),
    )
    .with(City, format!("City {n}"))
    .with(Notes, format!("notes for client {n}"));
    if n % 2 == 0 {
        client = client.with(Email, format!("client{n}@example.org"));
    }
    client
}

/// Insert `count` sample clients and return their ids
pub fn seed_clients(store: &mut ClientStore, count: usize) -> Vec<i64> {
    (1..=count)
        .map(|n| store.add_client(&sample_client(n)).unwrap())
        .collect()
}
