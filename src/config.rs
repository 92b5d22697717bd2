//! Engine configuration.
//!
//! Read from an optional JSON file, then overridden from the environment
//! (`CHURN_MODEL_DIR`, `CHURN_BATCH_WORKERS`, `CHURN_SIGNIFICANCE_FLOOR`).

use crate::attribution::SIGNIFICANCE_FLOOR;
use crate::error::{ChurnError, Result};
use crate::risk::RiskBands;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const ENV_MODEL_DIR: &str = "CHURN_MODEL_DIR";
pub const ENV_BATCH_WORKERS: &str = "CHURN_BATCH_WORKERS";
pub const ENV_SIGNIFICANCE_FLOOR: &str = "CHURN_SIGNIFICANCE_FLOOR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding schema.json, scaler.json, fields.json and classifier.json
    pub model_dir: PathBuf,

    /// Minimum contribution for a feature to be reported or selected
    pub significance_floor: f64,

    pub risk_bands: RiskBands,

    pub batch: BatchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Records processed concurrently
    pub workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models/churn_v2"),
            significance_floor: SIGNIFICANCE_FLOOR,
            risk_bands: RiskBands::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

impl EngineConfig {
    /// Defaults, then `path` if given, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    ChurnError::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                let config: EngineConfig = serde_json::from_str(&content).map_err(|e| {
                    ChurnError::Config(format!("Failed to parse {}: {}", path.display(), e))
                })?;
                info!("Loaded engine config from {}", path.display());
                config
            }
            None => EngineConfig::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in `load`).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = lookup(ENV_MODEL_DIR) {
            debug!("{} overrides model_dir: {}", ENV_MODEL_DIR, dir);
            self.model_dir = PathBuf::from(dir);
        }
        if let Some(workers) = lookup(ENV_BATCH_WORKERS) {
            self.batch.workers = workers.trim().parse().map_err(|_| {
                ChurnError::Config(format!("{} must be a positive integer, got '{}'", ENV_BATCH_WORKERS, workers))
            })?;
        }
        if let Some(floor) = lookup(ENV_SIGNIFICANCE_FLOOR) {
            self.significance_floor = floor.trim().parse().map_err(|_| {
                ChurnError::Config(format!("{} must be a number, got '{}'", ENV_SIGNIFICANCE_FLOOR, floor))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.risk_bands.validate()?;
        if self.batch.workers == 0 {
            return Err(ChurnError::Config("batch.workers must be at least 1".to_string()));
        }
        if !self.significance_floor.is_finite() || self.significance_floor < 0.0 {
            return Err(ChurnError::Config(format!(
                "significance_floor must be a non-negative number, got {}",
                self.significance_floor
            )));
        }
        Ok(())
    }
}
