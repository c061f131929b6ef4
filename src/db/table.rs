// src/db/table.rs
//! Generic access to tables with encrypted columns
//!
//! The migration engine only needs three things from a table: how many rows
//! it has, a stable id-ordered batch of raw column values, and a way to write
//! a row's values back. Values here are stored tokens, never plaintext.

use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{CoreError, Result};

/// Description of a table whose listed columns hold ciphertext tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptedTable {
    pub name: &'static str,
    /// INTEGER primary key used for stable batch ordering
    pub id_column: &'static str,
    pub encrypted_columns: &'static [&'static str],
}

/// Encrypted columns of the `clients` table, in schema order
pub const CLIENT_ENCRYPTED_COLUMNS: [&str; 15] = [
    "first_name_encr",
    "last_name_encr",
    "gender_encr",
    "birthday_encr",
    "street_encr",
    "city_encr",
    "parent_encr",
    "telephone1_encr",
    "telephone2_encr",
    "email_encr",
    "notes_encr",
    "keyword_taet_encr",
    "lrst_diagnosis_encr",
    "lrst_last_test_date_encr",
    "lrst_last_test_by_encr",
];

pub const CLIENTS_TABLE: EncryptedTable = EncryptedTable {
    name: "clients",
    id_column: "client_id",
    encrypted_columns: &CLIENT_ENCRYPTED_COLUMNS,
};

/// One row's id and stored (still encrypted) column values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub id: i64,
    pub values: Vec<Option<String>>,
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

impl EncryptedTable {
    /// Names are spliced into SQL, so only plain identifiers are accepted
    pub fn validate(&self) -> Result<()> {
        if self.encrypted_columns.is_empty() {
            return Err(CoreError::Configuration(format!(
                "table `{}` lists no encrypted columns",
                self.name
            )));
        }
        let all = [self.name, self.id_column]
            .into_iter()
            .chain(self.encrypted_columns.iter().copied());
        for name in all {
            if !is_identifier(name) {
                return Err(CoreError::Configuration(format!(
                    "`{name}` is not a plain SQL identifier"
                )));
            }
        }
        Ok(())
    }

    pub fn count_rows(&self, conn: &Connection) -> Result<usize> {
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", self.name), [], |r| {
                r.get(0)
            })?;
        Ok(count as usize)
    }

    /// Up to `limit` rows with id greater than `after`, ordered by id.
    /// `None` starts at the lowest id, `i64::MIN` included.
    pub fn fetch_batch(
        &self,
        conn: &Connection,
        after: Option<i64>,
        limit: usize,
    ) -> Result<Vec<RawRow>> {
        let sql = format!(
            "SELECT {id}, {cols} FROM {table} WHERE (?1 IS NULL OR {id} > ?1) ORDER BY {id} LIMIT ?2",
            id = self.id_column,
            cols = self.encrypted_columns.join(", "),
            table = self.name,
        );
        let width = self.encrypted_columns.len();
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![after, limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let values = (1..=width)
                .map(|idx| row.get::<_, Option<String>>(idx))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(RawRow { id, values })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Overwrite every encrypted column of one row
    pub fn update_row(&self, conn: &Connection, id: i64, values: &[Option<String>]) -> Result<()> {
        if values.len() != self.encrypted_columns.len() {
            return Err(CoreError::Configuration(format!(
                "expected {} values for `{}`, got {}",
                self.encrypted_columns.len(),
                self.name,
                values.len()
            )));
        }
        let assignments = self
            .encrypted_columns
            .iter()
            .enumerate()
            .map(|(idx, col)| format!("{col} = ?{}", idx + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {assignments} WHERE {} = ?{}",
            self.name,
            self.id_column,
            values.len() + 1
        );

        let mut bound: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
        bound.push(&id);
        let changed = conn.prepare_cached(&sql)?.execute(bound.as_slice())?;
        if changed != 1 {
            return Err(CoreError::RecordNotFound {
                table: self.name,
                id,
            });
        }
        Ok(())
    }

    /// First non-null token of the first encrypted column, lowest id first
    pub fn first_token(&self, conn: &Connection) -> Result<Option<String>> {
        let col = self.encrypted_columns.first().copied().unwrap_or_default();
        let sql = format!(
            "SELECT {col} FROM {table} WHERE {col} IS NOT NULL ORDER BY {id} LIMIT 1",
            table = self.name,
            id = self.id_column,
        );
        Ok(conn
            .query_row(&sql, [], |r| r.get::<_, String>(0))
            .optional()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clients_table_is_valid() {
        CLIENTS_TABLE.validate().unwrap();
    }

    #[test]
    fn rejects_names_that_are_not_identifiers() {
        let bad = EncryptedTable {
            name: "clients; DROP TABLE clients",
            id_column: "client_id",
            encrypted_columns: &["notes_encr"],
        };
        assert!(matches!(bad.validate(), Err(CoreError::Configuration(_))));

        let empty = EncryptedTable {
            name: "clients",
            id_column: "client_id",
            encrypted_columns: &[],
        };
        assert!(matches!(empty.validate(), Err(CoreError::Configuration(_))));
    }

    #[test]
    fn first_batch_starts_at_the_lowest_possible_id() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT);")
            .unwrap();
        for id in [i64::MIN, -1, 7] {
            conn.execute("INSERT INTO notes (id, body) VALUES (?1, 'x')", [id])
                .unwrap();
        }
        let table = EncryptedTable {
            name: "notes",
            id_column: "id",
            encrypted_columns: &["body"],
        };

        let first = table.fetch_batch(&conn, None, 2).unwrap();
        assert_eq!(first.iter().map(|r| r.id).collect::<Vec<_>>(), [i64::MIN, -1]);
        let rest = table.fetch_batch(&conn, Some(-1), 2).unwrap();
        assert_eq!(rest.iter().map(|r| r.id).collect::<Vec<_>>(), [7]);
    }
}
