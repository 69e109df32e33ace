//! Records: one row of named field values

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tensor::DenseTensor;

/// The value of one record field
///
/// The set of variants is closed so that batch assembly can match on it
/// exhaustively and reject fields whose values cannot be stacked together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// A single number
    Scalar(f32),
    /// A fixed-shape numeric array
    Array(DenseTensor),
    /// Any non-numeric value, carried through batching untouched
    Opaque(serde_json::Value),
}

impl Value {
    /// Name of the variant, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Array(_) => "array",
            Self::Opaque(_) => "opaque",
        }
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Scalar(value)
    }
}

impl From<f64> for Value {
    #[allow(clippy::cast_possible_truncation)]
    fn from(value: f64) -> Self {
        Self::Scalar(value as f32)
    }
}

impl From<DenseTensor> for Value {
    fn from(value: DenseTensor) -> Self {
        Self::Array(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Self::Opaque(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Opaque(serde_json::Value::String(value.to_string()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Opaque(serde_json::Value::String(value))
    }
}

/// A mapping from field name to value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, replacing any previous value with the same name
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert a field, returning the previous value if any
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    /// Get a field value by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Iterate over field names in sorted order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over `(name, value)` pairs in sorted name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_and_lookup() {
        let record = Record::new()
            .with("label", 3.0)
            .with("pixels", DenseTensor::vector(vec![0.0, 1.0]))
            .with("id", "img-7");

        assert_eq!(record.len(), 3);
        assert_eq!(record.get("label"), Some(&Value::Scalar(3.0)));
        assert_eq!(record.get("id"), Some(&Value::Opaque(json!("img-7"))));
        assert_eq!(record.field_names().collect::<Vec<_>>(), vec!["id", "label", "pixels"]);
    }

    #[test]
    fn test_insert_replaces() {
        let mut record = Record::new();
        assert!(record.insert("x", 1.0).is_none());
        assert_eq!(record.insert("x", 2.0), Some(Value::Scalar(1.0)));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(Value::from(1.0).kind(), "scalar");
        assert_eq!(Value::from(DenseTensor::scalar(1.0)).kind(), "array");
        assert_eq!(Value::from(json!({"a": 1})).kind(), "opaque");
    }

    #[test]
    fn test_record_serde() {
        let record = Record::new().with("n", 1.5).with("tag", "x");
        let json = serde_json::to_string(&record).unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
