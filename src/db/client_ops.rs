// src/db/client_ops.rs
//! Client records: CRUD over the `clients` table
//!
//! Every `*_encr` column is written through [`FieldCodec::encode`] and read
//! back through [`FieldCodec::decode`]; callers only ever see plaintext.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::FieldCodec;
use crate::db::records_db_conn::{ensure_schema, open_records_db};
use crate::db::table::{CLIENTS_TABLE, CLIENT_ENCRYPTED_COLUMNS};
use crate::error::{CoreError, Result};

/// Encrypted attributes of a client, in column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientField {
    FirstName,
    LastName,
    Gender,
    Birthday,
    Street,
    City,
    Parent,
    Telephone1,
    Telephone2,
    Email,
    Notes,
    KeywordTaet,
    LrstDiagnosis,
    LrstLastTestDate,
    LrstLastTestBy,
}

impl ClientField {
    pub const ALL: [ClientField; 15] = [
        ClientField::FirstName,
        ClientField::LastName,
        ClientField::Gender,
        ClientField::Birthday,
        ClientField::Street,
        ClientField::City,
        ClientField::Parent,
        ClientField::Telephone1,
        ClientField::Telephone2,
        ClientField::Email,
        ClientField::Notes,
        ClientField::KeywordTaet,
        ClientField::LrstDiagnosis,
        ClientField::LrstLastTestDate,
        ClientField::LrstLastTestBy,
    ];

    /// Stored column name
    pub fn column(self) -> &'static str {
        CLIENT_ENCRYPTED_COLUMNS[self as usize]
    }

    /// First and last name are NOT NULL in the schema
    pub fn is_required(self) -> bool {
        matches!(self, ClientField::FirstName | ClientField::LastName)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    /// `None` until stored; the database assigns one
    pub client_id: Option<i64>,
    pub school: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: Option<String>,
    pub birthday: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub parent: Option<String>,
    pub telephone1: Option<String>,
    pub telephone2: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub keyword_taet: Option<String>,
    pub lrst_diagnosis: Option<String>,
    pub lrst_last_test_date: Option<String>,
    pub lrst_last_test_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ClientRecord {
    pub fn new(
        school: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            school: school.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Default::default()
        }
    }

    /// Builder-style setter for any encrypted attribute
    pub fn with(mut self, field: ClientField, value: impl Into<String>) -> Self {
        self.set_field(field, Some(value.into()));
        self
    }

    pub fn field(&self, field: ClientField) -> Option<&str> {
        match field {
            ClientField::FirstName => Some(&self.first_name),
            ClientField::LastName => Some(&self.last_name),
            ClientField::Gender => self.gender.as_deref(),
            ClientField::Birthday => self.birthday.as_deref(),
            ClientField::Street => self.street.as_deref(),
            ClientField::City => self.city.as_deref(),
            ClientField::Parent => self.parent.as_deref(),
            ClientField::Telephone1 => self.telephone1.as_deref(),
            ClientField::Telephone2 => self.telephone2.as_deref(),
            ClientField::Email => self.email.as_deref(),
            ClientField::Notes => self.notes.as_deref(),
            ClientField::KeywordTaet => self.keyword_taet.as_deref(),
            ClientField::LrstDiagnosis => self.lrst_diagnosis.as_deref(),
            ClientField::LrstLastTestDate => self.lrst_last_test_date.as_deref(),
            ClientField::LrstLastTestBy => self.lrst_last_test_by.as_deref(),
        }
    }

    /// Required fields treat `None` as the empty string
    pub fn set_field(&mut self, field: ClientField, value: Option<String>) {
        let slot = match field {
            ClientField::FirstName => {
                self.first_name = value.unwrap_or_default();
                return;
            }
            ClientField::LastName => {
                self.last_name = value.unwrap_or_default();
                return;
            }
            ClientField::Gender => &mut self.gender,
            ClientField::Birthday => &mut self.birthday,
            ClientField::Street => &mut self.street,
            ClientField::City => &mut self.city,
            ClientField::Parent => &mut self.parent,
            ClientField::Telephone1 => &mut self.telephone1,
            ClientField::Telephone2 => &mut self.telephone2,
            ClientField::Email => &mut self.email,
            ClientField::Notes => &mut self.notes,
            ClientField::KeywordTaet => &mut self.keyword_taet,
            ClientField::LrstDiagnosis => &mut self.lrst_diagnosis,
            ClientField::LrstLastTestDate => &mut self.lrst_last_test_date,
            ClientField::LrstLastTestBy => &mut self.lrst_last_test_by,
        };
        *slot = value;
    }
}

/// Partial update: only the listed attributes are written
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientPatch {
    school: Option<String>,
    fields: Vec<(ClientField, Option<String>)>,
}

impl ClientPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn school(mut self, school: impl Into<String>) -> Self {
        self.school = Some(school.into());
        self
    }

    pub fn set(mut self, field: ClientField, value: impl Into<String>) -> Self {
        self.push(field, Some(value.into()));
        self
    }

    /// Store NULL for an optional attribute
    pub fn clear(mut self, field: ClientField) -> Self {
        self.push(field, None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.school.is_none() && self.fields.is_empty()
    }

    fn push(&mut self, field: ClientField, value: Option<String>) {
        // Last write for a field wins
        self.fields.retain(|(f, _)| *f != field);
        self.fields.push((field, value));
    }
}

/// A records database connection plus the codec its encrypted columns use
pub struct ClientStore {
    conn: Connection,
    codec: FieldCodec,
}

impl ClientStore {
    pub fn open<P: AsRef<Path>>(path: P, codec: FieldCodec) -> Result<Self> {
        Ok(Self {
            conn: open_records_db(path)?,
            codec,
        })
    }

    /// Wrap an existing connection (e.g. in-memory); the schema is created if missing
    pub fn new(conn: Connection, codec: FieldCodec) -> Result<Self> {
        ensure_schema(&conn)?;
        Ok(Self { conn, codec })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Migrations need `&mut` for their per-batch transactions
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn codec(&self) -> &FieldCodec {
        &self.codec
    }

    pub fn add_client(&mut self, record: &ClientRecord) -> Result<i64> {
        let encoded = ClientField::ALL
            .iter()
            .map(|&field| self.codec.encode(record.field(field)))
            .collect::<Result<Vec<_>>>()?;
        let now = Utc::now();

        let placeholders = (5..5 + encoded.len())
            .map(|idx| format!("?{idx}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO clients (client_id, school, created_at, updated_at, {}) \
             VALUES (?1, ?2, ?3, ?4, {placeholders})",
            CLIENT_ENCRYPTED_COLUMNS.join(", ")
        );

        let mut bound: Vec<&dyn ToSql> = vec![&record.client_id, &record.school, &now, &now];
        bound.extend(encoded.iter().map(|v| v as &dyn ToSql));

        let tx = self.conn.transaction()?;
        tx.execute(&sql, bound.as_slice())?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        debug!("Added client {id}");
        Ok(id)
    }

    pub fn get_client(&self, client_id: i64) -> Result<ClientRecord> {
        let sql = format!(
            "SELECT school, created_at, updated_at, {} FROM clients WHERE client_id = ?1",
            CLIENT_ENCRYPTED_COLUMNS.join(", ")
        );
        let raw = self
            .conn
            .query_row(&sql, params![client_id], |row| {
                let school: String = row.get(0)?;
                let created_at: DateTime<Utc> = row.get(1)?;
                let updated_at: DateTime<Utc> = row.get(2)?;
                let stored = (3..3 + CLIENT_ENCRYPTED_COLUMNS.len())
                    .map(|idx| row.get::<_, Option<String>>(idx))
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok((school, created_at, updated_at, stored))
            })
            .optional()?;

        let (school, created_at, updated_at, stored) = raw.ok_or(CoreError::RecordNotFound {
            table: CLIENTS_TABLE.name,
            id: client_id,
        })?;

        let mut record = ClientRecord {
            client_id: Some(client_id),
            school,
            created_at: Some(created_at),
            updated_at: Some(updated_at),
            ..Default::default()
        };
        for (field, token) in ClientField::ALL.iter().zip(&stored) {
            record.set_field(*field, self.codec.decode(token.as_deref())?);
        }
        Ok(record)
    }

    pub fn edit_client(&mut self, client_id: i64, patch: &ClientPatch) -> Result<()> {
        if let Some((field, _)) = patch
            .fields
            .iter()
            .find(|(field, value)| field.is_required() && value.is_none())
        {
            return Err(CoreError::Configuration(format!(
                "{} cannot be cleared",
                field.column()
            )));
        }

        let encoded = patch
            .fields
            .iter()
            .map(|(field, value)| -> Result<_> {
                Ok((field.column(), self.codec.encode(value.as_deref())?))
            })
            .collect::<Result<Vec<_>>>()?;
        let now = Utc::now();

        let mut assignments = vec!["updated_at = ?1".to_string()];
        let mut bound: Vec<&dyn ToSql> = vec![&now];
        if let Some(school) = &patch.school {
            bound.push(school);
            assignments.push(format!("school = ?{}", bound.len()));
        }
        for (column, value) in &encoded {
            bound.push(value);
            assignments.push(format!("{column} = ?{}", bound.len()));
        }
        bound.push(&client_id);
        let sql = format!(
            "UPDATE clients SET {} WHERE client_id = ?{}",
            assignments.join(", "),
            bound.len()
        );

        let tx = self.conn.transaction()?;
        let changed = tx.execute(&sql, bound.as_slice())?;
        if changed == 0 {
            return Err(CoreError::RecordNotFound {
                table: CLIENTS_TABLE.name,
                id: client_id,
            });
        }
        tx.commit()?;
        debug!("Edited client {client_id} ({} field(s))", encoded.len());
        Ok(())
    }

    pub fn delete_client(&mut self, client_id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM clients WHERE client_id = ?1", params![client_id])?;
        if changed == 0 {
            return Err(CoreError::RecordNotFound {
                table: CLIENTS_TABLE.name,
                id: client_id,
            });
        }
        debug!("Deleted client {client_id}");
        Ok(())
    }

    pub fn list_client_ids(&self) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT client_id FROM clients ORDER BY client_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    pub fn count_clients(&self) -> Result<usize> {
        CLIENTS_TABLE.count_rows(&self.conn)
    }
}
