//! Record types flowing through the pipeline.
//!
//! A `RawRecord` is whatever the caller handed us. The normalizer turns it into
//! a `NormalizedRecord` of typed values, and the deriver layers the computed
//! features on top to form a `DerivedRecord`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Untyped input: field name to JSON value (string, number, bool, null) or absent.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// A typed, cleaned field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            FieldValue::Number(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Output of the input normalizer.
///
/// Every field in the registry's defaults table is present. `defaulted` lists
/// the fields whose value came from the defaults table rather than the input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub values: BTreeMap<String, FieldValue>,
    pub defaulted: BTreeSet<String>,
}

impl NormalizedRecord {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    pub fn number(&self, field: &str) -> Option<f64> {
        self.values.get(field).and_then(FieldValue::as_number)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(FieldValue::as_text)
    }

    pub fn was_defaulted(&self, field: &str) -> bool {
        self.defaulted.contains(field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Normalized record plus the deterministic secondary features.
///
/// Derived values shadow normalized values of the same name, so a caller-supplied
/// `has_complaint` never disagrees with the complaint type it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedRecord {
    pub base: NormalizedRecord,
    pub derived: BTreeMap<String, FieldValue>,
}

impl DerivedRecord {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.derived.get(field).or_else(|| self.base.get(field))
    }

    pub fn number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(FieldValue::as_number)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    /// All visible fields, derived values taking precedence.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.base
            .values
            .iter()
            .filter(|(name, _)| !self.derived.contains_key(*name))
            .chain(self.derived.iter())
    }
}
