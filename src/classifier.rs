//! Churn classifier capability.
//!
//! The pipeline only needs three things from a trained model: class
//! probabilities, a hard prediction, and one global importance weight per
//! column. `LogisticModel` provides them from a JSON coefficient file.

use crate::error::{ChurnError, Result};
use crate::registry::SchemaRegistry;
use crate::scale::ScaledVector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

pub trait ChurnClassifier: Send + Sync {
    /// `[p_no_churn, p_churn]` for one scaled record.
    fn predict_proba(&self, vector: &ScaledVector) -> Result<[f64; 2]>;

    /// Hard class: 1 when churn is the more likely outcome.
    fn predict(&self, vector: &ScaledVector) -> Result<u8> {
        let [_, p_churn] = self.predict_proba(vector)?;
        Ok(if p_churn >= 0.5 { 1 } else { 0 })
    }

    /// Global importance weights aligned 1:1 with the registry columns.
    fn feature_importances(&self) -> &[f64];
}

/// `classifier.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticArtifact {
    pub intercept: f64,
    pub coefficients: BTreeMap<String, f64>,
}

/// Linear model over the scaled vector, `p = sigmoid(w·x + b)`.
#[derive(Debug, Clone)]
pub struct LogisticModel {
    columns: Vec<String>,
    coefficients: Vec<f64>,
    intercept: f64,
    importances: Vec<f64>,
}

impl LogisticModel {
    pub fn load(path: impl AsRef<Path>, registry: &SchemaRegistry) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ChurnError::Registry(format!("Failed to read {}: {}", path.display(), e)))?;
        let artifact: LogisticArtifact = serde_json::from_str(&content)
            .map_err(|e| ChurnError::Registry(format!("Failed to parse {}: {}", path.display(), e)))?;

        let model = Self::from_artifact(artifact, registry)?;
        info!(
            "Loaded logistic classifier from {} ({} coefficients)",
            path.display(),
            model.coefficients.len()
        );
        Ok(model)
    }

    /// Align a coefficient map to the registry's column order.
    pub fn from_artifact(artifact: LogisticArtifact, registry: &SchemaRegistry) -> Result<Self> {
        if let Some(unknown) = artifact.coefficients.keys().find(|c| !registry.has_column(c)) {
            return Err(ChurnError::SchemaMismatch(format!(
                "Classifier has a coefficient for unknown column '{}'",
                unknown
            )));
        }

        let mut coefficients = Vec::with_capacity(registry.columns().len());
        for column in registry.columns() {
            let weight = artifact.coefficients.get(column).ok_or_else(|| {
                ChurnError::SchemaMismatch(format!("Classifier has no coefficient for column '{}'", column))
            })?;
            coefficients.push(*weight);
        }

        // Linear models expose no native importance; |coef| on standardized inputs stands in.
        let importances = coefficients.iter().map(|w| w.abs()).collect();

        Ok(Self {
            columns: registry.columns().to_vec(),
            coefficients,
            intercept: artifact.intercept,
            importances,
        })
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl ChurnClassifier for LogisticModel {
    fn predict_proba(&self, vector: &ScaledVector) -> Result<[f64; 2]> {
        if vector.columns() != self.columns.as_slice() {
            return Err(ChurnError::SchemaMismatch(format!(
                "Classifier expects {} columns, vector has {}",
                self.columns.len(),
                vector.len()
            )));
        }

        let logit = self.intercept
            + self
                .coefficients
                .iter()
                .zip(vector.values())
                .map(|(w, x)| w * x)
                .sum::<f64>();
        if !logit.is_finite() {
            return Err(ChurnError::Inference(format!("Non-finite logit {}", logit)));
        }

        let p_churn = sigmoid(logit);
        Ok([1.0 - p_churn, p_churn])
    }

    fn feature_importances(&self) -> &[f64] {
        &self.importances
    }
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}
