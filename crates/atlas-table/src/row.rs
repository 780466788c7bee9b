//! Attribute rows of the dataset a table is bound to.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Stable identifier of a row (the layer's object id).
pub type RowId = i64;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Missing value.
    Null,
    /// Whole number.
    Integer(i64),
    /// Floating point number.
    Number(f64),
    /// Calendar date.
    Date(NaiveDate),
    /// Free text.
    Text(String),
}

impl FieldValue {
    /// Numeric view of the value, if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Date view of the value, if it is a date.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Whether the value is missing.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

/// One attribute record of the bound dataset.
///
/// Records are immutable once the table is open; the identifier lives in
/// whichever attribute the dataset names as its id field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowRecord {
    attributes: BTreeMap<String, FieldValue>,
}

impl RowRecord {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attribute insertion.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.attributes.insert(field.into(), value.into());
        self
    }

    /// Returns the value of `field`, if present.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.attributes.get(field)
    }

    /// Returns the row id stored under `id_field`.
    ///
    /// Integral floats are accepted since some services report object ids
    /// as doubles.
    pub fn id(&self, id_field: &str) -> Option<RowId> {
        match self.attributes.get(id_field)? {
            FieldValue::Integer(i) => Some(*i),
            FieldValue::Number(n) if n.fract() == 0.0 => Some(*n as RowId),
            _ => None,
        }
    }

    /// Iterates over `(field, value)` pairs in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, FieldValue)> for RowRecord {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            attributes: iter.into_iter().collect(),
        }
    }
}
