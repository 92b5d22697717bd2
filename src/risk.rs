//! Risk bands over the churn probability.

use crate::error::{ChurnError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskBand {
    pub label: String,
    /// Inclusive lower bound on `p_churn`
    pub min_probability: f64,
}

/// Ordered bands, highest first. The first band whose lower bound the
/// probability reaches gives the label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskBands(Vec<RiskBand>);

impl RiskBands {
    pub fn new(bands: Vec<RiskBand>) -> Result<Self> {
        let bands = RiskBands(bands);
        bands.validate()?;
        Ok(bands)
    }

    pub fn validate(&self) -> Result<()> {
        let last = self
            .0
            .last()
            .ok_or_else(|| ChurnError::Config("At least one risk band is required".to_string()))?;

        for band in &self.0 {
            if !(0.0..=1.0).contains(&band.min_probability) {
                return Err(ChurnError::Config(format!(
                    "Risk band '{}' starts at {}, outside [0, 1]",
                    band.label, band.min_probability
                )));
            }
        }
        for pair in self.0.windows(2) {
            if pair[1].min_probability >= pair[0].min_probability {
                return Err(ChurnError::Config(format!(
                    "Risk bands must be strictly descending: '{}' ({}) follows '{}' ({})",
                    pair[1].label, pair[1].min_probability, pair[0].label, pair[0].min_probability
                )));
            }
        }
        if last.min_probability != 0.0 {
            return Err(ChurnError::Config(format!(
                "Lowest risk band '{}' must start at 0",
                last.label
            )));
        }
        Ok(())
    }

    pub fn label(&self, p_churn: f64) -> &str {
        self.0
            .iter()
            .find(|band| p_churn >= band.min_probability)
            .or_else(|| self.0.last())
            .map_or("Unknown", |band| band.label.as_str())
    }

    pub fn bands(&self) -> &[RiskBand] {
        &self.0
    }
}

impl Default for RiskBands {
    fn default() -> Self {
        let band = |label: &str, min_probability: f64| RiskBand {
            label: label.to_string(),
            min_probability,
        };
        RiskBands(vec![
            band("Very High", 0.90),
            band("High", 0.70),
            band("Medium", 0.30),
            band("Low", 0.0),
        ])
    }
}
