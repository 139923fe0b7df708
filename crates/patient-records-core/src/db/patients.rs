//! Patient database operations.

use rusqlite::{ffi, params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::index::bucket_for;
use crate::models::PatientRecord;

impl Database {
    /// Insert a new patient.
    ///
    /// The existence check and the insert share one immediate transaction, so
    /// two writers racing on the same identifier cannot both succeed. A
    /// primary-key violation from SQLite is reported the same way.
    pub fn insert_patient(&mut self, patient: &PatientRecord) -> DbResult<()> {
        let tx = self.transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM patients WHERE identifier = ?)",
            [patient.identifier()],
            |row| row.get(0),
        )?;
        if exists {
            return Err(DbError::Duplicate(patient.identifier().to_string()));
        }

        tx.execute(
            r#"
            INSERT INTO patients (
                identifier, name, age, gender, condition, attending, bucket
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                patient.identifier(),
                patient.name(),
                patient.age(),
                patient.gender(),
                patient.condition(),
                patient.attending(),
                patient.bucket(),
            ],
        )
        .map_err(|e| duplicate_or(e, patient.identifier()))?;

        tx.commit()?;
        Ok(())
    }

    /// Get a patient by identifier.
    pub fn get_patient(&self, identifier: &str) -> DbResult<Option<PatientRecord>> {
        self.conn
            .query_row(
                r#"
                SELECT identifier, name, age, gender, condition, attending, bucket
                FROM patients
                WHERE identifier = ?
                "#,
                [identifier],
                PatientRow::from_row,
            )
            .optional()?
            .map(PatientRecord::try_from)
            .transpose()
    }

    /// List all patients, ordered by identifier.
    pub fn list_patients(&self) -> DbResult<Vec<PatientRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT identifier, name, age, gender, condition, attending, bucket
            FROM patients
            ORDER BY identifier
            "#,
        )?;

        let rows = stmt.query_map([], PatientRow::from_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// Count stored patients.
    pub fn count_patients(&self) -> DbResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Delete a patient, returning the number of rows removed.
    pub fn delete_patient(&self, identifier: &str) -> DbResult<usize> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM patients WHERE identifier = ?", [identifier])?;
        Ok(rows_affected)
    }
}

fn duplicate_or(err: rusqlite::Error, identifier: &str) -> DbError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            DbError::Duplicate(identifier.to_string())
        }
        _ => err.into(),
    }
}

/// Intermediate row struct for database mapping.
struct PatientRow {
    identifier: String,
    name: String,
    age: i64,
    gender: String,
    condition: String,
    attending: String,
    bucket: i64,
}

impl PatientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(PatientRow {
            identifier: row.get(0)?,
            name: row.get(1)?,
            age: row.get(2)?,
            gender: row.get(3)?,
            condition: row.get(4)?,
            attending: row.get(5)?,
            bucket: row.get(6)?,
        })
    }
}

impl TryFrom<PatientRow> for PatientRecord {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        let age = u8::try_from(row.age)
            .map_err(|_| DbError::Constraint(format!("age {} out of range", row.age)))?;
        let expected = bucket_for(&row.identifier);
        if row.bucket != i64::from(expected) {
            return Err(DbError::Constraint(format!(
                "bucket {} does not match identifier {} (expected {})",
                row.bucket, row.identifier, expected
            )));
        }

        Ok(PatientRecord::from_stored(
            row.identifier,
            row.name,
            age,
            row.gender,
            row.condition,
            row.attending,
            expected,
        ))
    }
}
