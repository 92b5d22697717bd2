//! Encoder / Aligner
//!
//! Projects a derived record onto the frozen model's column space. The output
//! always has exactly one value per registry column, in registry order:
//! numeric fields are copied by name, categorical fields activate their
//! `<field>_<level>` column, and everything else stays 0.

use crate::fields;
use crate::record::{DerivedRecord, FieldValue};
use crate::registry::SchemaRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Fixed-length vector aligned to the registry's column list.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedVector {
    columns: Arc<[String]>,
    values: Vec<f64>,
}

impl EncodedVector {
    /// All-zero vector over `columns`.
    pub fn zeros(columns: Arc<[String]>) -> Self {
        let values = vec![0.0; columns.len()];
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.position(column).map(|idx| self.values[idx])
    }

    pub(crate) fn set(&mut self, idx: usize, value: f64) {
        self.values[idx] = value;
    }

    pub(crate) fn shared_columns(&self) -> Arc<[String]> {
        Arc::clone(&self.columns)
    }

    /// Column/value pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter().copied())
    }
}

/// Where a categorical value ended up after encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelEncoding {
    /// Its one-hot column was set.
    Activated,
    /// It is the field's declared baseline (all-zero group).
    Baseline,
    /// No column and not the baseline; also encoded as an all-zero group.
    Unseen,
}

/// A categorical field whose one-hot group was left all-zero, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZeroGroup {
    pub field: String,
    pub level: String,
    pub encoding: LevelEncoding,
}

pub struct Encoder<'a> {
    registry: &'a SchemaRegistry,
    columns: Arc<[String]>,
}

impl<'a> Encoder<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self {
            registry,
            columns: registry.columns().into(),
        }
    }

    /// Build an encoder that shares an existing column list, avoiding a copy per record.
    pub fn with_columns(registry: &'a SchemaRegistry, columns: Arc<[String]>) -> Self {
        Self { registry, columns }
    }

    pub fn encode(&self, record: &DerivedRecord) -> EncodedVector {
        let mut vector = EncodedVector::zeros(Arc::clone(&self.columns));
        let mut activated = 0usize;

        for (name, value) in record.iter() {
            match self.registry.field(name).map(|spec| spec.is_categorical()) {
                Some(true) => {
                    if let FieldValue::Text(level) = value {
                        if self.activate(&mut vector, name, level) == LevelEncoding::Activated {
                            activated += 1;
                        }
                    }
                }
                Some(false) => self.copy_number(&mut vector, name, value),
                // Undeclared names only reach the model when the deriver produced them;
                // carried-through input must not write into one-hot groups.
                None if record.derived.contains_key(name) => self.copy_number(&mut vector, name, value),
                None => {
                    if self.registry.has_column(name) {
                        debug!("Ignoring undeclared input '{}' that names a model column", name);
                    }
                }
            }
        }

        debug!(
            "Encoded record into {} columns ({} one-hot activations)",
            vector.len(),
            activated
        );
        vector
    }

    /// How `field` at `level` is represented in the column space.
    pub fn level_encoding(&self, field: &str, level: &str) -> LevelEncoding {
        if self.registry.has_column(&fields::one_hot(field, level)) {
            LevelEncoding::Activated
        } else if self.registry.baseline(field) == Some(level) {
            LevelEncoding::Baseline
        } else {
            LevelEncoding::Unseen
        }
    }

    /// Categorical fields of `record` whose group encodes as all zeros.
    pub fn zero_groups(&self, record: &DerivedRecord) -> Vec<ZeroGroup> {
        record
            .iter()
            .filter(|(name, _)| self.registry.field(name).map_or(false, |spec| spec.is_categorical()))
            .filter_map(|(name, value)| {
                let level = value.as_text()?;
                let encoding = self.level_encoding(name, level);
                (encoding != LevelEncoding::Activated).then(|| ZeroGroup {
                    field: name.clone(),
                    level: level.to_string(),
                    encoding,
                })
            })
            .collect()
    }

    fn copy_number(&self, vector: &mut EncodedVector, name: &str, value: &FieldValue) {
        if let (FieldValue::Number(number), Some(idx)) = (value, self.registry.column_index(name)) {
            vector.set(idx, *number);
        }
    }

    fn activate(&self, vector: &mut EncodedVector, field: &str, level: &str) -> LevelEncoding {
        let encoding = self.level_encoding(field, level);
        match encoding {
            LevelEncoding::Activated => {
                if let Some(idx) = self.registry.column_index(&fields::one_hot(field, level)) {
                    vector.set(idx, 1.0);
                }
            }
            LevelEncoding::Baseline => {
                debug!("Field '{}' at baseline level '{}', group left at zero", field, level)
            }
            LevelEncoding::Unseen => {
                debug!("Field '{}' level '{}' has no column, group left at zero", field, level)
            }
        }
        encoding
    }
}
