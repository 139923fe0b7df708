//! Patient Records Core Library
//!
//! Identifier-keyed patient record storage on top of SQLite.
//!
//! # Architecture
//!
//! ```text
//!   caller (HTTP / FFI)
//!          │
//!          ▼
//!   NewPatient ──validate──► PatientRecord { .., bucket = bucket_for(pid) }
//!                                   │
//!                     ┌─────────────▼─────────────┐
//!                     │        RecordStore        │
//!                     │  Mutex<Database>          │
//!                     │  insert: check + write in │
//!                     │  one IMMEDIATE txn        │
//!                     └─────────────┬─────────────┘
//!                                   │
//!                                   ▼
//!                     patients (PRIMARY KEY identifier,
//!                               INDEX on bucket)
//! ```
//!
//! # Core Principle
//!
//! **The identifier is the only source of truth.** The bucket is recomputed
//! from it on every insert and checked against it on every read; it is never
//! accepted from a caller.
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer
//! - [`models`]: Domain types (PatientRecord, NewPatient) and validation
//! - [`index`]: Bucket derivation from an identifier
//! - [`store`]: Thread-safe record store with typed errors

pub mod db;
pub mod index;
pub mod models;
pub mod store;

// Re-export commonly used types
pub use db::Database;
pub use index::bucket_for;
pub use models::{AgeField, NewPatient, PatientRecord, ValidationError};
pub use store::{HealthReport, RecordStore, StoreError, StoreResult};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::Arc;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum PatientRecordsError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<StoreError> for PatientRecordsError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation { field, reason } => {
                PatientRecordsError::InvalidInput(format!("{}: {}", field, reason))
            }
            StoreError::Conflict(id) => PatientRecordsError::Conflict(id),
            StoreError::NotFound(id) => PatientRecordsError::NotFound(id),
            StoreError::StorageUnavailable(detail) => {
                PatientRecordsError::StorageUnavailable(detail)
            }
        }
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a store at the given path.
#[uniffi::export]
pub fn open_store(path: String) -> Result<Arc<PatientRecordsCore>, PatientRecordsError> {
    let store = RecordStore::open(&path, db::DEFAULT_BUSY_TIMEOUT)?;
    Ok(Arc::new(PatientRecordsCore {
        store: Arc::new(store),
    }))
}

/// Create an in-memory store (for testing).
#[uniffi::export]
pub fn open_store_in_memory() -> Result<Arc<PatientRecordsCore>, PatientRecordsError> {
    let store = RecordStore::open_in_memory()?;
    Ok(Arc::new(PatientRecordsCore {
        store: Arc::new(store),
    }))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe store handle for FFI.
#[derive(uniffi::Object)]
pub struct PatientRecordsCore {
    store: Arc<RecordStore>,
}

#[uniffi::export]
impl PatientRecordsCore {
    /// Validate and add a new patient.
    pub fn add_patient(
        &self,
        patient: FfiNewPatient,
    ) -> Result<FfiPatientRecord, PatientRecordsError> {
        let record = self.store.insert(&patient.into())?;
        Ok(record.into())
    }

    /// List all patients ordered by identifier.
    pub fn list_patients(&self) -> Result<Vec<FfiPatientRecord>, PatientRecordsError> {
        let records = self.store.get_all()?;
        Ok(records.into_iter().map(|r| r.into()).collect())
    }

    /// Get a patient by identifier.
    pub fn get_patient(
        &self,
        identifier: String,
    ) -> Result<FfiPatientRecord, PatientRecordsError> {
        let record = self.store.get(&identifier)?;
        Ok(record.into())
    }

    /// Delete a patient by identifier.
    pub fn delete_patient(&self, identifier: String) -> Result<u32, PatientRecordsError> {
        let removed = self.store.delete(&identifier)?;
        Ok(removed as u32)
    }

    /// Probe the storage connection.
    pub fn health(&self) -> FfiHealthReport {
        self.store.health().into()
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe insert candidate.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewPatient {
    pub identifier: String,
    pub name: String,
    pub age: i64,
    pub gender: String,
    pub condition: String,
    pub attending: String,
}

impl From<FfiNewPatient> for NewPatient {
    fn from(p: FfiNewPatient) -> Self {
        NewPatient::new(p.identifier, p.name, p.age, p.gender, p.condition, p.attending)
    }
}

/// FFI-safe patient record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientRecord {
    pub identifier: String,
    pub name: String,
    pub age: u8,
    pub gender: String,
    pub condition: String,
    pub attending: String,
    pub bucket: u8,
}

impl From<PatientRecord> for FfiPatientRecord {
    fn from(record: PatientRecord) -> Self {
        Self {
            identifier: record.identifier().to_string(),
            name: record.name().to_string(),
            age: record.age(),
            gender: record.gender().to_string(),
            condition: record.condition().to_string(),
            attending: record.attending().to_string(),
            bucket: record.bucket(),
        }
    }
}

/// FFI-safe health report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiHealthReport {
    pub database_reachable: bool,
    pub error: Option<String>,
    pub checked_at: String,
}

impl From<HealthReport> for FfiHealthReport {
    fn from(report: HealthReport) -> Self {
        Self {
            database_reachable: report.database_reachable,
            error: report.error,
            checked_at: report.checked_at,
        }
    }
}
