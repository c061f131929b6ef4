// src/db/records_db_conn.rs
//! Opening the records database and creating its schema

use std::fs;
use std::path::Path;

use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;

/// Open (or create) the records database and make sure the schema exists
pub fn open_records_db<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(path)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// Apply pragmas and create tables; idempotent
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    // In-memory databases report `memory`
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    debug!("journal_mode = {mode}");
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS clients (
            client_id INTEGER PRIMARY KEY,
            school TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,

            -- Encrypted columns: opaque tokens, route through FieldCodec
            first_name_encr TEXT NOT NULL,
            last_name_encr TEXT NOT NULL,
            gender_encr TEXT,
            birthday_encr TEXT,
            street_encr TEXT,
            city_encr TEXT,
            parent_encr TEXT,
            telephone1_encr TEXT,
            telephone2_encr TEXT,
            email_encr TEXT,
            notes_encr TEXT,
            keyword_taet_encr TEXT,
            lrst_diagnosis_encr TEXT,
            lrst_last_test_date_encr TEXT,
            lrst_last_test_by_encr TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_clients_school ON clients(school);
        "#,
    )?;
    Ok(())
}
