//! Patient models.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::index::bucket_for;

/// Youngest admissible age, inclusive.
pub const MIN_AGE: i64 = 1;
/// Oldest admissible age, inclusive.
pub const MAX_AGE: i64 = 150;

/// Field labels used in validation errors; these match the wire keys.
pub const FIELD_IDENTIFIER: &str = "pid";
pub const FIELD_NAME: &str = "name";
pub const FIELD_AGE: &str = "age";
pub const FIELD_GENDER: &str = "gender";
pub const FIELD_CONDITION: &str = "disease";
pub const FIELD_ATTENDING: &str = "doctor";

/// A stored patient record.
///
/// Records are only produced by [`NewPatient::validate`] or read back from
/// storage, so the bucket always matches the identifier it was derived from.
/// There are no setters: a record is replaced by delete + insert, never edited.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PatientRecord {
    #[serde(rename = "pid")]
    identifier: String,
    name: String,
    age: u8,
    gender: String,
    #[serde(rename = "disease")]
    condition: String,
    #[serde(rename = "doctor")]
    attending: String,
    #[serde(rename = "hash_index")]
    bucket: u8,
}

impl PatientRecord {
    /// Rebuild a record from a stored row.
    pub(crate) fn from_stored(
        identifier: String,
        name: String,
        age: u8,
        gender: String,
        condition: String,
        attending: String,
        bucket: u8,
    ) -> Self {
        Self {
            identifier,
            name,
            age,
            gender,
            condition,
            attending,
            bucket,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn age(&self) -> u8 {
        self.age
    }

    pub fn gender(&self) -> &str {
        &self.gender
    }

    pub fn condition(&self) -> &str {
        &self.condition
    }

    pub fn attending(&self) -> &str {
        &self.attending
    }

    /// Derived bucket, always `bucket_for(identifier)`.
    pub fn bucket(&self) -> u8 {
        self.bucket
    }
}

/// Age as received from a caller, before it is trusted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AgeField {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl AgeField {
    fn is_blank(&self) -> bool {
        matches!(self, AgeField::Text(s) if s.trim().is_empty())
    }

    /// Parse into a whole number of years; fractional values are rejected.
    fn to_years(&self) -> Option<i64> {
        match self {
            AgeField::Integer(n) => Some(*n),
            AgeField::Float(f) if f.is_finite() && f.fract() == 0.0 => {
                if *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    Some(*f as i64)
                } else {
                    None
                }
            }
            AgeField::Float(_) => None,
            AgeField::Text(s) => s.trim().parse::<i64>().ok(),
        }
    }
}

impl From<i64> for AgeField {
    fn from(n: i64) -> Self {
        AgeField::Integer(n)
    }
}

impl From<&str> for AgeField {
    fn from(s: &str) -> Self {
        AgeField::Text(s.to_string())
    }
}

/// Inbound shape of an insert request. Every field is optional here so that
/// a missing field is reported as a validation failure rather than a decode
/// failure.
///
/// Text fields also accept JSON numbers (`"pid": 100` reads as `"100"`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewPatient {
    #[serde(rename = "pid", default, deserialize_with = "scalar_text")]
    pub identifier: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub name: Option<String>,
    pub age: Option<AgeField>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub gender: Option<String>,
    #[serde(rename = "disease", default, deserialize_with = "scalar_text")]
    pub condition: Option<String>,
    #[serde(rename = "doctor", default, deserialize_with = "scalar_text")]
    pub attending: Option<String>,
}

/// A text field as received: a string or a bare number.
#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarText {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl ScalarText {
    fn into_text(self) -> String {
        match self {
            ScalarText::Text(s) => s,
            ScalarText::Integer(n) => n.to_string(),
            ScalarText::Float(f) => format!("{:?}", f),
        }
    }
}

fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<ScalarText>::deserialize(deserializer)?.map(ScalarText::into_text))
}

impl NewPatient {
    /// Create a candidate with every field set.
    pub fn new(
        identifier: impl Into<String>,
        name: impl Into<String>,
        age: i64,
        gender: impl Into<String>,
        condition: impl Into<String>,
        attending: impl Into<String>,
    ) -> Self {
        Self {
            identifier: Some(identifier.into()),
            name: Some(name.into()),
            age: Some(AgeField::Integer(age)),
            gender: Some(gender.into()),
            condition: Some(condition.into()),
            attending: Some(attending.into()),
        }
    }

    /// Validate and normalize into a record ready for storage.
    ///
    /// Required fields are checked for presence in declaration order before
    /// the age is parsed, so the first reported field is deterministic.
    pub fn validate(&self) -> Result<PatientRecord, ValidationError> {
        let identifier = required(FIELD_IDENTIFIER, self.identifier.as_deref())?;
        let name = required(FIELD_NAME, self.name.as_deref())?;
        let age = match &self.age {
            Some(age) if !age.is_blank() => age,
            _ => return Err(ValidationError::missing(FIELD_AGE)),
        };
        let gender = required(FIELD_GENDER, self.gender.as_deref())?;
        let condition = required(FIELD_CONDITION, self.condition.as_deref())?;
        let attending = required(FIELD_ATTENDING, self.attending.as_deref())?;

        let years = age.to_years().ok_or_else(|| ValidationError {
            field: FIELD_AGE,
            reason: "age must be a whole number".into(),
        })?;
        if !(MIN_AGE..=MAX_AGE).contains(&years) {
            return Err(ValidationError {
                field: FIELD_AGE,
                reason: format!("age must be between {} and {}", MIN_AGE, MAX_AGE),
            });
        }

        Ok(PatientRecord {
            bucket: bucket_for(identifier),
            identifier: identifier.to_string(),
            name: name.to_string(),
            age: years as u8,
            gender: gender.to_string(),
            condition: condition.to_string(),
            attending: attending.to_string(),
        })
    }
}

/// Trim a lookup identifier, rejecting one that is empty after trimming.
pub fn normalize_identifier(raw: &str) -> Result<&str, ValidationError> {
    required(FIELD_IDENTIFIER, Some(raw))
}

fn required<'a>(field: &'static str, value: Option<&'a str>) -> Result<&'a str, ValidationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::missing(field)),
    }
}

/// A field failed validation; nothing was written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid field {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn missing(field: &'static str) -> Self {
        Self {
            field,
            reason: "missing or empty required field".into(),
        }
    }
}
