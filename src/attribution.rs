//! Attribution Engine
//!
//! Per-record feature contributions: the classifier's global importance
//! weight scaled by how far this record sits from the training population on
//! that column. The resulting order is specific to the record, not the
//! model's static ranking.

use crate::error::{ChurnError, Result};
use crate::scale::ScaledVector;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default minimum contribution for a feature to be reported.
pub const SIGNIFICANCE_FLOOR: f64 = 0.001;

/// One feature's share in explaining a single prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    /// Column name in the registry
    pub feature: String,

    /// importance × |scaled value|
    pub contribution: f64,

    /// Value after scaling (equal to `original` for unscaled columns)
    pub scaled: f64,

    /// Encoded value before scaling
    pub original: f64,

    /// Global importance weight from the classifier
    pub importance: f64,
}

/// Attribution engine
pub struct AttributionEngine {
    floor: f64,
}

impl AttributionEngine {
    pub fn new() -> Self {
        Self {
            floor: SIGNIFICANCE_FLOOR,
        }
    }

    pub fn with_floor(mut self, floor: f64) -> Self {
        self.floor = floor;
        self
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    /// Contributions above the floor, largest first.
    pub fn attribute(
        &self,
        vector: &ScaledVector,
        importances: &[f64],
    ) -> Result<Vec<FeatureContribution>> {
        if importances.len() != vector.len() {
            return Err(ChurnError::SchemaMismatch(format!(
                "Got {} importance weights for {} columns",
                importances.len(),
                vector.len()
            )));
        }

        let mut contributions: Vec<FeatureContribution> = vector
            .columns()
            .iter()
            .zip(vector.values())
            .zip(vector.original())
            .zip(importances)
            .filter_map(|(((feature, &scaled), &original), &importance)| {
                let contribution = importance * scaled.abs();
                (contribution > self.floor).then(|| FeatureContribution {
                    feature: feature.clone(),
                    contribution,
                    scaled,
                    original,
                    importance,
                })
            })
            .collect();

        sort_descending(&mut contributions, |c| c.contribution);

        for c in contributions.iter().take(3) {
            debug!(
                "Contribution {}: {:.4} (scaled {:.3}, original {})",
                c.feature, c.contribution, c.scaled, c.original
            );
        }

        Ok(contributions)
    }
}

impl Default for AttributionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable descending sort by a float key; NaN sorts last.
pub(crate) fn sort_descending<T>(items: &mut [T], key: impl Fn(&T) -> f64) {
    items.sort_by(|a, b| {
        key(b)
            .partial_cmp(&key(a))
            .unwrap_or_else(|| key(a).is_nan().cmp(&key(b).is_nan()))
    });
}
