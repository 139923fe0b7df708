//! The record store: validated, identifier-keyed access to patient records.
//!
//! A [`RecordStore`] owns its [`Database`] behind a mutex. Every operation
//! holds the lock for its own duration only, so mutations are atomic with
//! respect to concurrent readers and writers sharing the same store. Inserts
//! additionally run inside an immediate SQLite transaction, which keeps the
//! uniqueness check correct when several processes share one database file.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::db::{Database, DbError};
use crate::models::{normalize_identifier, NewPatient, PatientRecord, ValidationError};

/// Errors surfaced by record store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid field {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("patient {0} already exists")]
    Conflict(String),

    #[error("patient {0} not found")]
    NotFound(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<ValidationError> for StoreError {
    fn from(e: ValidationError) -> Self {
        StoreError::Validation {
            field: e.field,
            reason: e.reason,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Duplicate(identifier) => StoreError::Conflict(identifier),
            other => StoreError::StorageUnavailable(other.to_string()),
        }
    }
}

/// Result of a storage health probe.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HealthReport {
    pub database_reachable: bool,
    /// Failure detail when the database could not be reached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// RFC 3339 timestamp of the probe.
    pub checked_at: String,
}

/// Thread-safe owner of all patient records.
pub struct RecordStore {
    db: Mutex<Database>,
}

impl RecordStore {
    /// Wrap an already opened database.
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Open (or create) a store backed by the SQLite file at `path`.
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> StoreResult<Self> {
        let db = Database::open_with_busy_timeout(path, busy_timeout)?;
        Ok(Self::new(db))
    }

    /// Open a store backed by a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|e| StoreError::StorageUnavailable(format!("Lock poisoned: {}", e)))
    }

    /// Validate a candidate and persist it, returning the stored record.
    ///
    /// Validation happens before the lock is taken; a rejected candidate
    /// never touches storage.
    pub fn insert(&self, candidate: &NewPatient) -> StoreResult<PatientRecord> {
        let record = candidate.validate()?;

        let mut db = self.lock()?;
        db.insert_patient(&record)
            .map_err(|e| log_failure("insert", record.identifier(), e))?;

        debug!(
            identifier = record.identifier(),
            bucket = record.bucket(),
            "patient inserted"
        );
        Ok(record)
    }

    /// Every stored record, ordered by identifier.
    pub fn get_all(&self) -> StoreResult<Vec<PatientRecord>> {
        let db = self.lock()?;
        db.list_patients().map_err(|e| log_failure("list", "*", e))
    }

    /// Look up one record by identifier.
    pub fn get(&self, identifier: &str) -> StoreResult<PatientRecord> {
        let identifier = normalize_identifier(identifier)?;

        let db = self.lock()?;
        db.get_patient(identifier)
            .map_err(|e| log_failure("get", identifier, e))?
            .ok_or_else(|| StoreError::NotFound(identifier.to_string()))
    }

    /// Delete one record by identifier, returning the number removed.
    ///
    /// Deleting an absent identifier is harmless but reported as
    /// [`StoreError::NotFound`].
    pub fn delete(&self, identifier: &str) -> StoreResult<usize> {
        let identifier = normalize_identifier(identifier)?;

        let db = self.lock()?;
        let removed = db
            .delete_patient(identifier)
            .map_err(|e| log_failure("delete", identifier, e))?;
        if removed == 0 {
            return Err(StoreError::NotFound(identifier.to_string()));
        }

        debug!(identifier, "patient deleted");
        Ok(removed)
    }

    /// Number of stored records.
    pub fn len(&self) -> StoreResult<usize> {
        let db = self.lock()?;
        db.count_patients().map_err(|e| log_failure("count", "*", e))
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Probe the storage connection.
    pub fn health(&self) -> HealthReport {
        let checked_at = chrono::Utc::now().to_rfc3339();
        let outcome = self
            .lock()
            .and_then(|db| db.ping().map_err(StoreError::from));

        match outcome {
            Ok(()) => HealthReport {
                database_reachable: true,
                error: None,
                checked_at,
            },
            Err(e) => {
                warn!(error = %e, "storage health probe failed");
                HealthReport {
                    database_reachable: false,
                    error: Some(e.to_string()),
                    checked_at,
                }
            }
        }
    }
}

fn log_failure(op: &'static str, identifier: &str, err: DbError) -> StoreError {
    let err = StoreError::from(err);
    if let StoreError::StorageUnavailable(detail) = &err {
        warn!(op, identifier, error = %detail, "storage operation failed");
    }
    err
}
