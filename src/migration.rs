// src/migration.rs
//! Batched, verifiable re-encryption of every encrypted column of a table
//!
//! Each batch runs in its own transaction and is committed once. A failure
//! rolls back only the batch in flight; batches committed earlier hold
//! values readable under the new primary key, and rows not yet reached are
//! still readable under the old one. Re-running a migration is therefore
//! always safe: already migrated values simply decrypt under the primary and
//! are sealed again.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use crate::cipher::Cipher;
use crate::codec::FieldCodec;
use crate::consts::DEFAULT_BATCH_SIZE;
use crate::db::table::EncryptedTable;
use crate::error::{CoreError, MigrationError, Result};
use crate::key::SymmetricKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationState {
    NotStarted,
    /// 1-based batch currently in flight
    Migrating { batch: usize, of: usize },
    Verifying,
    Completed,
    Failed,
}

/// Answer of a [`MigrationCheckpoint`] between two batches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Continue,
    Stop,
}

/// Snapshot handed to the checkpoint after each committed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub batch: usize,
    pub total_batches: usize,
    pub records_done: usize,
    pub total_records: usize,
}

/// Consulted between batches; returning [`Checkpoint::Stop`] ends the run
/// with a cancelled [`MigrationError`]. Closures work directly.
pub trait MigrationCheckpoint {
    fn after_batch(&mut self, progress: &BatchProgress) -> Checkpoint;
}

impl<F> MigrationCheckpoint for F
where
    F: FnMut(&BatchProgress) -> Checkpoint,
{
    fn after_batch(&mut self, progress: &BatchProgress) -> Checkpoint {
        self(progress)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub records: usize,
    pub batches: usize,
    /// Rows re-read under the primary key alone after the last commit
    pub verified: usize,
    pub primary_fingerprint: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Outcome of trying a single candidate key against stored data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyProbe {
    Verified,
    Rejected,
    /// Nothing encrypted is stored yet, so any key is acceptable
    NoData,
}

/// Row that failed and why
type BatchFailure = (Option<i64>, CoreError);

pub struct MigrationEngine<'c> {
    cipher: Arc<Cipher>,
    codec: FieldCodec,
    table: EncryptedTable,
    batch_size: usize,
    checkpoint: Option<Box<dyn MigrationCheckpoint + 'c>>,
    state: MigrationState,
}

impl<'c> MigrationEngine<'c> {
    pub fn new(cipher: Arc<Cipher>, table: EncryptedTable) -> Self {
        Self {
            codec: FieldCodec::new(Arc::clone(&cipher)),
            cipher,
            table,
            batch_size: DEFAULT_BATCH_SIZE,
            checkpoint: None,
            state: MigrationState::NotStarted,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(CoreError::Configuration(
                "batch size must be at least 1".into(),
            ));
        }
        self.batch_size = batch_size;
        Ok(self)
    }

    pub fn with_checkpoint(mut self, checkpoint: impl MigrationCheckpoint + 'c) -> Self {
        self.checkpoint = Some(Box::new(checkpoint));
        self
    }

    pub fn state(&self) -> MigrationState {
        self.state
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Move every value from `old_key` to `new_key`.
    ///
    /// The shared cipher is switched to `[new, old]` before the first batch
    /// and narrowed to `[new]` only after verification passed. On any error
    /// it holds `[new, old]` followed by every key it held before the call,
    /// so both generations remain readable.
    pub fn reencrypt_with_new_key(
        &mut self,
        conn: &mut Connection,
        old_key: &SymmetricKey,
        new_key: &SymmetricKey,
    ) -> Result<MigrationReport> {
        self.table
            .validate()
            .map_err(|e| self.abort_before_start(e))?;

        let previous = self.cipher.keys();
        let ring = dedup_keys([new_key.clone(), old_key.clone()]);
        self.cipher
            .initialize(ring.clone())
            .map_err(|e| self.abort_before_start(e))?;

        let report = match self.run(conn) {
            Ok(report) => report,
            Err(e) => {
                let fallback = dedup_keys(ring.into_iter().chain(previous));
                if let Err(restore) = self.cipher.initialize(fallback) {
                    error!("Could not restore cipher keys after failed migration: {restore}");
                }
                return Err(e);
            }
        };
        self.cipher.initialize(vec![new_key.clone()])?;
        info!(
            "Migration to key {} complete; old key retired from the cipher",
            new_key.fingerprint()
        );
        Ok(report)
    }

    /// Re-seal every value under the cipher's current primary key.
    ///
    /// The cipher must already hold the primary plus whatever keys the
    /// stored data still needs. Its key list is left unchanged.
    pub fn reencrypt_with_primary(&mut self, conn: &mut Connection) -> Result<MigrationReport> {
        self.table
            .validate()
            .map_err(|e| self.abort_before_start(e))?;
        if !self.cipher.is_initialized() {
            return Err(self.abort_before_start(CoreError::Configuration(
                "encryption keys not set".into(),
            )));
        }
        self.run(conn)
    }

    /// Try `key` alone against the first stored token of the table
    pub fn probe_key(&self, conn: &Connection, key: &SymmetricKey) -> Result<KeyProbe> {
        self.table.validate()?;
        let Some(token) = self.table.first_token(conn)? else {
            return Ok(KeyProbe::NoData);
        };
        let probe = Cipher::with_keys(vec![key.clone()])?;
        match probe.decrypt(&token) {
            Ok(_) => Ok(KeyProbe::Verified),
            Err(CoreError::Decryption(_)) => Ok(KeyProbe::Rejected),
            Err(e) => Err(e),
        }
    }

    fn run(&mut self, conn: &mut Connection) -> Result<MigrationReport> {
        let started_at = Utc::now();
        let primary = self
            .cipher
            .keys()
            .into_iter()
            .next()
            .ok_or_else(|| {
                self.abort_before_start(CoreError::Configuration(
                    "encryption keys not set".into(),
                ))
            })?;
        let total_records = self
            .table
            .count_rows(conn)
            .map_err(|e| self.abort_before_start(e))?;
        let total_batches = total_records.div_ceil(self.batch_size);
        info!(
            "Migrating {total_records} record(s) of `{}` in {total_batches} batch(es), primary key {}",
            self.table.name,
            primary.fingerprint()
        );

        let mut after = None;
        let mut records_done = 0;
        let mut committed = 0;
        loop {
            let batch = committed + 1;
            let of = total_batches.max(batch);
            self.state = MigrationState::Migrating { batch, of };

            let (last_id, count) = match self.migrate_batch(conn, after) {
                Ok(Some(done)) => done,
                Ok(None) => break,
                Err((record_id, source)) => {
                    return Err(self.fail(MigrationError::batch(
                        batch, of, committed, record_id, source,
                    )));
                }
            };
            committed += 1;
            records_done += count;
            after = Some(last_id);
            info!("Progress: {records_done}/{total_records} records migrated");

            if count < self.batch_size {
                break;
            }
            if records_done < total_records {
                let progress = BatchProgress {
                    batch,
                    total_batches: of,
                    records_done,
                    total_records,
                };
                if let Some(checkpoint) = self.checkpoint.as_mut() {
                    if checkpoint.after_batch(&progress) == Checkpoint::Stop {
                        warn!("Migration stopped at checkpoint after batch {batch} of {of}");
                        self.state = MigrationState::Failed;
                        return Err(MigrationError::cancelled(of, committed).into());
                    }
                }
            }
        }

        self.state = MigrationState::Verifying;
        let verified = self.verify(conn, &primary).map_err(|(record_id, source)| {
            self.fail(MigrationError::verification(
                total_batches.max(committed),
                committed,
                record_id,
                source,
            ))
        })?;

        self.state = MigrationState::Completed;
        let report = MigrationReport {
            records: records_done,
            batches: committed,
            verified,
            primary_fingerprint: primary.fingerprint(),
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "Migration of `{}` finished: {} record(s), {} batch(es), {} verified",
            self.table.name, report.records, report.batches, report.verified
        );
        Ok(report)
    }

    /// `Ok(None)` when no rows remain after `after`
    fn migrate_batch(
        &self,
        conn: &mut Connection,
        after: Option<i64>,
    ) -> std::result::Result<Option<(i64, usize)>, BatchFailure> {
        let tx = conn.transaction().map_err(|e| (None, e.into()))?;
        match self.reseal_rows(&tx, after) {
            Ok(Some(done)) => {
                tx.commit().map_err(|e| (None, e.into()))?;
                Ok(Some(done))
            }
            Ok(None) => Ok(None),
            Err(failure) => {
                if let Err(e) = tx.rollback() {
                    error!("Rollback failed: {e}");
                }
                Err(failure)
            }
        }
    }

    fn reseal_rows(
        &self,
        tx: &Transaction<'_>,
        after: Option<i64>,
    ) -> std::result::Result<Option<(i64, usize)>, BatchFailure> {
        let rows = self
            .table
            .fetch_batch(tx, after, self.batch_size)
            .map_err(|e| (None, e))?;
        let Some(last_id) = rows.last().map(|row| row.id) else {
            return Ok(None);
        };

        for row in &rows {
            let resealed = row
                .values
                .iter()
                .map(|stored| {
                    let plain = Zeroizing::new(self.codec.decode(stored.as_deref())?);
                    self.codec.encode(plain.as_deref())
                })
                .collect::<Result<Vec<_>>>()
                .map_err(|e| (Some(row.id), e))?;
            self.table
                .update_row(tx, row.id, &resealed)
                .map_err(|e| (Some(row.id), e))?;
        }
        debug!("Re-sealed {} row(s) up to id {last_id}", rows.len());
        Ok(Some((last_id, rows.len())))
    }

    /// Re-read every stored value with a cipher holding only `primary`
    fn verify(
        &self,
        conn: &Connection,
        primary: &SymmetricKey,
    ) -> std::result::Result<usize, BatchFailure> {
        let verifier = Cipher::with_keys(vec![primary.clone()]).map_err(|e| (None, e))?;
        let mut after = None;
        let mut verified = 0;
        loop {
            let rows = self
                .table
                .fetch_batch(conn, after, self.batch_size)
                .map_err(|e| (None, e))?;
            let Some(last) = rows.last() else {
                break;
            };
            after = Some(last.id);
            for row in &rows {
                for token in row.values.iter().flatten() {
                    verifier.decrypt(token).map_err(|e| (Some(row.id), e))?;
                }
                verified += 1;
            }
        }
        let expected = self.table.count_rows(conn).map_err(|e| (None, e))?;
        if verified < expected {
            return Err((
                None,
                CoreError::Decryption(format!(
                    "only {verified} of {expected} row(s) could be re-read"
                )),
            ));
        }
        debug!("Verified {verified} row(s) under key {}", primary.fingerprint());
        Ok(verified)
    }

    fn abort_before_start(&self, source: CoreError) -> CoreError {
        error!("Migration could not start: {source}");
        MigrationError::preparing(source).into()
    }

    fn fail(&mut self, err: MigrationError) -> CoreError {
        self.state = MigrationState::Failed;
        error!("{err}");
        err.into()
    }
}

/// Keep the first occurrence of each key, in order
fn dedup_keys(keys: impl IntoIterator<Item = SymmetricKey>) -> Vec<SymmetricKey> {
    let mut out: Vec<SymmetricKey> = Vec::new();
    for key in keys {
        if !out.contains(&key) {
            out.push(key);
        }
    }
    out
}
