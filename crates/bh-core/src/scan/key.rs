//! Grouping key derivation.
//!
//! The scanner is agnostic to what a key means; it only needs a function
//! from a record to an optional key string. `Ok(None)` marks the record as
//! not interesting, so it is neither counted nor stored.

use super::reader::EventRecord;
use serde_json::Value;
use thiserror::Error;

/// Errors while deriving a grouping key.
#[derive(Debug, Error)]
pub enum KeyError {
    /// A key field held a value that cannot join a key string.
    #[error("field {field:?} is not a scalar value")]
    NonScalarField { field: String },
}

/// Derives the grouping key for a record.
pub trait KeyFn {
    /// Return the key for `record`, or `Ok(None)` to skip it.
    fn key_for(&self, record: &EventRecord) -> Result<Option<String>, KeyError>;
}

impl<F> KeyFn for F
where
    F: Fn(&EventRecord) -> Result<Option<String>, KeyError>,
{
    fn key_for(&self, record: &EventRecord) -> Result<Option<String>, KeyError> {
        self(record)
    }
}

/// Field-driven key derivation.
///
/// Every `require` filter must match for a record to be interesting; the
/// key is then the values of the key fields joined with `-`. A record
/// missing a key field is skipped rather than failed: captures routinely
/// interleave records of different shapes.
#[derive(Debug, Clone)]
pub struct FieldKey {
    fields: Vec<String>,
    require: Vec<(String, String)>,
}

impl FieldKey {
    /// Build a key over the named fields.
    pub fn new(fields: Vec<String>) -> Self {
        FieldKey {
            fields,
            require: Vec::new(),
        }
    }

    /// Add a `field=value` filter; records not matching every filter are
    /// skipped.
    pub fn require(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.require.push((field.into(), value.into()));
        self
    }

    /// Number of key fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    fn scalar(value: &Value) -> Option<String> {
        match value {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        }
    }
}

impl KeyFn for FieldKey {
    fn key_for(&self, record: &EventRecord) -> Result<Option<String>, KeyError> {
        for (field, want) in &self.require {
            match record.fields.get(field).and_then(Self::scalar) {
                Some(got) if got == *want => {}
                _ => return Ok(None),
            }
        }
        let mut parts = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let Some(value) = record.fields.get(field) else {
                return Ok(None);
            };
            let Some(text) = Self::scalar(value) else {
                return Err(KeyError::NonScalarField {
                    field: field.clone(),
                });
            };
            parts.push(text);
        }
        Ok(Some(parts.join("-")))
    }
}
