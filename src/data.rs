use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{LexstoreError, Result};

/// A metadata record: field name to value.
pub type Metadata = BTreeMap<String, DataValue>;

/// The value type for metadata fields.
///
/// Values are untagged on the wire, so a JSON record such as
/// `{"year": 2020, "tags": ["a", "b"], "draft": false}` maps directly onto it.
/// Integers and floats compare numerically with each other; every other
/// cross-variant comparison is unequal and unordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),

    /// List of scalar values (e.g. tags). Nested lists are rejected on insert.
    List(Vec<DataValue>),
}

impl DataValue {
    /// Returns the string value if this is a String variant.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer value if this is an Int64 variant.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            DataValue::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as f64 if this is a numeric variant.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            DataValue::Int64(i) => Some(*i as f64),
            DataValue::Float64(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the boolean value if this is a Bool variant.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            DataValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the elements if this is a List variant.
    pub fn as_list(&self) -> Option<&[DataValue]> {
        match self {
            DataValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataValue::Int64(_) | DataValue::Float64(_))
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, DataValue::List(_))
    }

    /// Short variant name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::Null => "null",
            DataValue::Bool(_) => "boolean",
            DataValue::Int64(_) => "integer",
            DataValue::Float64(_) => "float",
            DataValue::String(_) => "string",
            DataValue::List(_) => "list",
        }
    }

    /// Type-aware equality.
    ///
    /// Numbers compare numerically (`2020 == 2020.0`), strings exactly, and
    /// values of different variants are never equal.
    pub fn matches(&self, other: &DataValue) -> bool {
        match (self, other) {
            (DataValue::Int64(a), DataValue::Int64(b)) => a == b,
            (a, b) if a.is_numeric() && b.is_numeric() => {
                a.compare_numeric(b) == Some(Ordering::Equal)
            }
            (DataValue::String(a), DataValue::String(b)) => a == b,
            (DataValue::Bool(a), DataValue::Bool(b)) => a == b,
            (DataValue::Null, DataValue::Null) => true,
            (DataValue::List(a), DataValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.matches(y))
            }
            _ => false,
        }
    }

    /// Numeric ordering; `None` when either side is not a number.
    pub fn compare_numeric(&self, other: &DataValue) -> Option<Ordering> {
        match (self, other) {
            (DataValue::Int64(a), DataValue::Int64(b)) => Some(a.cmp(b)),
            _ => self.as_number()?.partial_cmp(&other.as_number()?),
        }
    }

    /// Converts a JSON value into a metadata value.
    ///
    /// Returns `None` for JSON objects, which have no metadata representation.
    pub fn from_json(value: &serde_json::Value) -> Option<DataValue> {
        use serde_json::Value;

        match value {
            Value::Null => Some(DataValue::Null),
            Value::Bool(b) => Some(DataValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(DataValue::Int64(i)),
                None => n.as_f64().map(DataValue::Float64),
            },
            Value::String(s) => Some(DataValue::String(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(DataValue::from_json)
                .collect::<Option<Vec<_>>>()
                .map(DataValue::List),
            Value::Object(_) => None,
        }
    }

    /// Checks that this value can be stored under `field`.
    pub(crate) fn validate(&self, field: &str) -> Result<()> {
        match self {
            DataValue::Float64(f) if !f.is_finite() => Err(LexstoreError::invalid_document(
                format!("field '{field}' holds a non-finite number"),
            )),
            DataValue::List(items) => {
                for item in items {
                    if !item.is_scalar() {
                        return Err(LexstoreError::invalid_document(format!(
                            "field '{field}' holds a nested list"
                        )));
                    }
                    item.validate(field)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

// --- Conversions ---

impl From<String> for DataValue {
    fn from(v: String) -> Self {
        DataValue::String(v)
    }
}

impl From<&str> for DataValue {
    fn from(v: &str) -> Self {
        DataValue::String(v.to_string())
    }
}

impl From<i64> for DataValue {
    fn from(v: i64) -> Self {
        DataValue::Int64(v)
    }
}

impl From<i32> for DataValue {
    fn from(v: i32) -> Self {
        DataValue::Int64(v as i64)
    }
}

impl From<f64> for DataValue {
    fn from(v: f64) -> Self {
        DataValue::Float64(v)
    }
}

impl From<f32> for DataValue {
    fn from(v: f32) -> Self {
        DataValue::Float64(v as f64)
    }
}

impl From<bool> for DataValue {
    fn from(v: bool) -> Self {
        DataValue::Bool(v)
    }
}

impl<T: Into<DataValue>> From<Vec<T>> for DataValue {
    fn from(v: Vec<T>) -> Self {
        DataValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// Checks every field of a metadata record.
pub(crate) fn validate_metadata(metadata: &Metadata) -> Result<()> {
    for (field, value) in metadata {
        if field.is_empty() {
            return Err(LexstoreError::invalid_document("empty metadata field name"));
        }
        value.validate(field)?;
    }
    Ok(())
}

/// A document as supplied by the ingestion pipeline and returned by `get`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Optional unique identifier for the document.
    ///
    /// If `None`, a UUID (v4) is generated by the engine when the document is added.
    #[serde(default)]
    pub id: Option<String>,

    /// Text content to be tokenized and indexed.
    #[serde(default)]
    pub text: String,

    /// Metadata record used by filters.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Create a new document without an id.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// Create a new document with a specific id.
    pub fn new_with_id(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// Set the document id.
    pub fn set_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add a metadata field to the document.
    pub fn add_field(mut self, name: impl Into<String>, value: impl Into<DataValue>) -> Self {
        self.metadata.insert(name.into(), value.into());
        self
    }

    /// Replace the whole metadata record.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Get a reference to a metadata field's value.
    pub fn get(&self, name: &str) -> Option<&DataValue> {
        self.metadata.get(name)
    }

    /// Check if the document has a metadata field.
    pub fn has_field(&self, name: &str) -> bool {
        self.metadata.contains_key(name)
    }

    /// Get all metadata field names.
    pub fn field_names(&self) -> Vec<&str> {
        self.metadata.keys().map(|s| s.as_str()).collect()
    }
}
