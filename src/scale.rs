//! Scaler
//!
//! Applies the training-time standardization `(x - mean) / scale` to the
//! registry's scaled columns only. Indicator columns pass through untouched.

use crate::encode::EncodedVector;
use crate::error::{ChurnError, Result};
use crate::registry::SchemaRegistry;
use std::sync::Arc;

/// Encoded vector with the scaled subset standardized.
///
/// Keeps the pre-scaling values alongside so attribution and explanations can
/// report the customer's actual figures.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledVector {
    columns: Arc<[String]>,
    values: Vec<f64>,
    original: Vec<f64>,
}

impl ScaledVector {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Values before scaling, aligned to `columns()`.
    pub fn original(&self) -> &[f64] {
        &self.original
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| self.values[idx])
    }
}

pub struct Scaler<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> Scaler<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    pub fn scale(&self, encoded: &EncodedVector) -> Result<ScaledVector> {
        let mut values = encoded.values().to_vec();

        for column in self.registry.scaled_columns() {
            let idx = encoded.position(column).ok_or_else(|| {
                ChurnError::SchemaMismatch(format!(
                    "Scaled column '{}' is missing from the encoded vector",
                    column
                ))
            })?;
            let params = self.registry.scaler_params(column).ok_or_else(|| {
                ChurnError::SchemaMismatch(format!("No scaler parameters for column '{}'", column))
            })?;
            values[idx] = (values[idx] - params.mean) / params.scale;
        }

        Ok(ScaledVector {
            columns: encoded.shared_columns(),
            values,
            original: encoded.values().to_vec(),
        })
    }

    /// Undo the standardization: `scaled * scale + mean` on the scaled subset.
    pub fn inverse(&self, scaled: &ScaledVector) -> Result<Vec<f64>> {
        let mut values = scaled.values.clone();
        for column in self.registry.scaled_columns() {
            let idx = scaled
                .columns
                .iter()
                .position(|c| c == column)
                .ok_or_else(|| {
                    ChurnError::SchemaMismatch(format!(
                        "Scaled column '{}' is missing from the scaled vector",
                        column
                    ))
                })?;
            if let Some(params) = self.registry.scaler_params(column) {
                values[idx] = values[idx] * params.scale + params.mean;
            }
        }
        Ok(values)
    }
}
