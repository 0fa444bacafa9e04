//! Raw input records and field validation

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

pub const GR_LIV_AREA: &str = "Gr Liv Area";
pub const TOTAL_BSMT_SF: &str = "Total Bsmt SF";
pub const GARAGE_CARS: &str = "Garage Cars";
pub const OVERALL_QUAL: &str = "Overall Qual";
pub const YEAR_BUILT: &str = "Year Built";
pub const YR_SOLD: &str = "Yr Sold";

/// Fields every record must carry, whatever the schema asks for.
pub const BASE_FIELDS: [&str; 6] = [
    GR_LIV_AREA,
    TOTAL_BSMT_SF,
    GARAGE_CARS,
    OVERALL_QUAL,
    YEAR_BUILT,
    YR_SOLD,
];

/// Why a single record could not be turned into a feature vector
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("missing required field(s): {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("field '{field}' is not numeric: {value}")]
    NotNumeric { field: String, value: String },

    #[error("field '{field}' out of range: {reason}")]
    OutOfRange { field: String, reason: String },
}

impl RecordError {
    /// Names of the fields at fault
    pub fn fields(&self) -> Vec<String> {
        match self {
            RecordError::Missing(fields) => fields.clone(),
            RecordError::NotNumeric { field, .. } | RecordError::OutOfRange { field, .. } => {
                vec![field.clone()]
            }
        }
    }
}

/// A caller-supplied mapping of housing attributes for one prediction.
///
/// Values stay as loose JSON until a transformer validates them; keys the
/// schema does not need are carried along and ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: BTreeMap<String, Value>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// A field counts as present only when it is set to something other than null.
    pub fn has(&self, name: &str) -> bool {
        matches!(self.fields.get(name), Some(v) if !v.is_null())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Every name in `required` that is absent or null, in the order given
    pub fn missing<'a, I>(&self, required: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        required
            .into_iter()
            .filter(|name| !self.has(name))
            .map(str::to_string)
            .collect()
    }

    /// Read a field as a finite number, accepting numeric strings.
    pub fn number(&self, name: &str) -> Result<f64, RecordError> {
        let value = self
            .fields
            .get(name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| RecordError::Missing(vec![name.to_string()]))?;

        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        };

        match parsed {
            Some(v) if v.is_finite() => Ok(v),
            Some(_) => Err(RecordError::OutOfRange {
                field: name.to_string(),
                reason: "must be finite".to_string(),
            }),
            None => Err(RecordError::NotNumeric {
                field: name.to_string(),
                value: value.to_string(),
            }),
        }
    }

    /// Read a field as a category label. Numbers are rendered without a
    /// trailing `.0` so `2` and `"2"` name the same category.
    pub fn category(&self, name: &str) -> Result<String, RecordError> {
        match self.fields.get(name) {
            None | Some(Value::Null) => Err(RecordError::Missing(vec![name.to_string()])),
            Some(Value::String(s)) => Ok(s.trim().to_string()),
            Some(Value::Number(n)) => Ok(match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
                _ => n.to_string(),
            }),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            Some(other) => Err(RecordError::NotNumeric {
                field: name.to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl FromIterator<(String, Value)> for RawRecord {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Domain checks on the base fields, applied after numeric coercion.
pub fn check_range(field: &str, value: f64) -> Result<(), RecordError> {
    let out_of_range = |reason: &str| RecordError::OutOfRange {
        field: field.to_string(),
        reason: reason.to_string(),
    };

    match field {
        GARAGE_CARS if value < 0.0 => Err(out_of_range("Garage Cars must be >= 0")),
        OVERALL_QUAL if !(1.0..=10.0).contains(&value) => {
            Err(out_of_range("Overall Qual must be between 1 and 10"))
        }
        YEAR_BUILT | YR_SOLD if value.fract() != 0.0 => {
            Err(out_of_range("year must be a whole number"))
        }
        _ => Ok(()),
    }
}
