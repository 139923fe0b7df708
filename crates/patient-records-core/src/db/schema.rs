//! SQLite schema definition.

/// Complete database schema for patient records.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    identifier TEXT PRIMARY KEY NOT NULL CHECK (length(identifier) > 0),
    name TEXT NOT NULL CHECK (length(name) > 0),
    age INTEGER NOT NULL CHECK (age BETWEEN 1 AND 150),
    gender TEXT NOT NULL CHECK (length(gender) > 0),
    condition TEXT NOT NULL CHECK (length(condition) > 0),
    attending TEXT NOT NULL CHECK (length(attending) > 0),
    bucket INTEGER NOT NULL CHECK (bucket BETWEEN 0 AND 9),  -- derived from identifier
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Secondary index on the derived bucket; never authoritative
CREATE INDEX IF NOT EXISTS idx_patients_bucket ON patients(bucket);
"#;
