// src/error.rs
//! Public error types for the entire crate

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Cipher used before keys were set, an empty key list, or bad parameters
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No candidate key opened the token (wrong password, corruption, foreign token)
    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error("no row with id {id} in table `{table}`")]
    RecordNotFound { table: &'static str, id: i64 },

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Where in a migration run a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationPhase {
    /// Nothing was touched yet (bad table description, uninitialised cipher, count failed)
    Preparing,
    Migrating,
    Verifying,
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationPhase::Preparing => f.write_str("preparing"),
            MigrationPhase::Migrating => f.write_str("migrating"),
            MigrationPhase::Verifying => f.write_str("verifying"),
        }
    }
}

/// A failed or interrupted re-encryption run.
///
/// Batches counted in `committed_batches` are fully migrated and readable;
/// the batch named in `failed_batch` was rolled back. Re-running the
/// migration is always the correct recovery action.
#[derive(Debug)]
pub struct MigrationError {
    pub phase: MigrationPhase,
    /// 1-based number of the batch that was rolled back
    pub failed_batch: Option<usize>,
    pub total_batches: usize,
    pub committed_batches: usize,
    /// Row that could not be processed, when known
    pub record_id: Option<i64>,
    /// Stopped at a checkpoint between batches rather than by an error
    pub cancelled: bool,
    source: Option<Box<CoreError>>,
}

impl MigrationError {
    pub(crate) fn preparing(source: CoreError) -> Self {
        Self {
            phase: MigrationPhase::Preparing,
            failed_batch: None,
            total_batches: 0,
            committed_batches: 0,
            record_id: None,
            cancelled: false,
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn batch(
        failed_batch: usize,
        total_batches: usize,
        committed_batches: usize,
        record_id: Option<i64>,
        source: CoreError,
    ) -> Self {
        Self {
            phase: MigrationPhase::Migrating,
            failed_batch: Some(failed_batch),
            total_batches,
            committed_batches,
            record_id,
            cancelled: false,
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn cancelled(total_batches: usize, committed_batches: usize) -> Self {
        Self {
            phase: MigrationPhase::Migrating,
            failed_batch: None,
            total_batches,
            committed_batches,
            record_id: None,
            cancelled: true,
            source: None,
        }
    }

    pub(crate) fn verification(
        total_batches: usize,
        committed_batches: usize,
        record_id: Option<i64>,
        source: CoreError,
    ) -> Self {
        Self {
            phase: MigrationPhase::Verifying,
            failed_batch: None,
            total_batches,
            committed_batches,
            record_id,
            cancelled: false,
            source: Some(Box::new(source)),
        }
    }

    /// The underlying cause, if any
    pub fn cause(&self) -> Option<&CoreError> {
        self.source.as_deref()
    }
}

impl fmt::Display for MigrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cause = self
            .source
            .as_deref()
            .map(|e| e.to_string())
            .unwrap_or_default();
        let record = self
            .record_id
            .map(|id| format!(" at record {id}"))
            .unwrap_or_default();

        if self.cancelled {
            return write!(
                f,
                "migration stopped after batch {} of {}: {} batch(es) committed and migrated; \
                 re-run the migration to finish",
                self.committed_batches, self.total_batches, self.committed_batches
            );
        }

        match self.phase {
            MigrationPhase::Preparing => {
                write!(f, "migration could not start: {cause}; no records were changed")
            }
            MigrationPhase::Migrating => write!(
                f,
                "migration failed in batch {} of {}{record}: {cause}. Batch {} was rolled back; \
                 {} earlier batch(es) remain safely migrated. Re-run the migration to finish",
                self.failed_batch.unwrap_or(0),
                self.total_batches,
                self.failed_batch.unwrap_or(0),
                self.committed_batches
            ),
            MigrationPhase::Verifying => write!(
                f,
                "migration verification failed{record}: {cause}. All {} batch(es) were committed \
                 but not every record opens under the new primary key. Re-run the migration",
                self.committed_batches
            ),
        }
    }
}

impl std::error::Error for MigrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.source {
            Some(err) => Some(err.as_ref()),
            None => None,
        }
    }
}
