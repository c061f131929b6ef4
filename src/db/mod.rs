// src/db/mod.rs
//! SQLite persistence for encrypted records

pub mod client_ops;
pub mod records_db_conn;
pub mod table;

pub use client_ops::{ClientField, ClientPatch, ClientRecord, ClientStore};
pub use records_db_conn::{ensure_schema, open_records_db};
pub use table::{EncryptedTable, RawRow, CLIENTS_TABLE, CLIENT_ENCRYPTED_COLUMNS};
