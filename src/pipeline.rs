//! Assessment pipeline.
//!
//! raw record → normalize → derive → encode → scale → classifier →
//! attribution → factor selection → explanation → action.
//!
//! The registry, classifier and configuration are injected once and shared
//! read-only, so a single `ChurnPipeline` can serve any number of threads.

use crate::action::ActionRecommender;
use crate::attribution::{AttributionEngine, FeatureContribution};
use crate::classifier::{ChurnClassifier, LogisticModel};
use crate::config::EngineConfig;
use crate::derive::FeatureDeriver;
use crate::encode::{Encoder, ZeroGroup};
use crate::error::{ChurnError, Result};
use crate::explain::{Category, Explanation, ExplanationGenerator};
use crate::fields;
use crate::normalize::{Diagnostic, InputNormalizer};
use crate::record::RawRecord;
use crate::registry::SchemaRegistry;
use crate::scale::Scaler;
use crate::selector::FactorSelector;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Number of contributions reported alongside the selected factor.
pub const TOP_FACTORS: usize = 3;

/// Result of assessing one customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,

    /// Risk band label for `probability`
    pub risk_label: String,

    /// Churn probability from the classifier
    pub probability: f64,

    pub explanation: String,

    pub action: String,

    /// Column behind the explanation; absent when nothing stood out
    pub main_feature: Option<String>,

    pub category: Category,

    /// Largest per-record contributions, before boosting
    pub top_factors: Vec<FeatureContribution>,

    /// Input substitutions made by the normalizer
    pub diagnostics: Vec<Diagnostic>,

    /// Categorical fields encoded as an all-zero group (baseline or unseen level)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zero_groups: Vec<ZeroGroup>,

    pub schema_version: String,
}

pub struct ChurnPipeline {
    registry: Arc<SchemaRegistry>,
    classifier: Arc<dyn ChurnClassifier>,
    config: Arc<EngineConfig>,
    columns: Arc<[String]>,
}

impl ChurnPipeline {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        classifier: Arc<dyn ChurnClassifier>,
        config: Arc<EngineConfig>,
    ) -> Result<Self> {
        let weights = classifier.feature_importances().len();
        if weights != registry.columns().len() {
            return Err(ChurnError::SchemaMismatch(format!(
                "Classifier reports {} importance weights, registry {} has {} columns",
                weights,
                registry.version(),
                registry.columns().len()
            )));
        }

        let columns: Arc<[String]> = registry.columns().into();
        Ok(Self {
            registry,
            classifier,
            config,
            columns,
        })
    }

    /// Load the registry and logistic classifier from `config.model_dir`.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let registry = SchemaRegistry::load(&config.model_dir)?;
        let classifier = LogisticModel::load(config.model_dir.join("classifier.json"), &registry)?;
        info!(
            "Churn pipeline ready: schema {}, {} risk bands, significance floor {}",
            registry.version(),
            config.risk_bands.bands().len(),
            config.significance_floor
        );
        Self::new(Arc::new(registry), Arc::new(classifier), Arc::new(config))
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn assess(&self, raw: &RawRecord) -> Result<Assessment> {
        let registry = self.registry.as_ref();

        let normalization = InputNormalizer::new(registry).normalize(raw);
        let derived = FeatureDeriver::new(registry).derive(&normalization.record);
        let encoder = Encoder::with_columns(registry, Arc::clone(&self.columns));
        let encoded = encoder.encode(&derived);
        let scaled = Scaler::new(registry).scale(&encoded)?;

        let probability = checked_probability(self.classifier.predict_proba(&scaled)?)?;
        let risk_label = self.config.risk_bands.label(probability).to_string();

        let contributions = AttributionEngine::new()
            .with_floor(self.config.significance_floor)
            .attribute(&scaled, self.classifier.feature_importances())?;
        let selected = FactorSelector::new()
            .with_floor(self.config.significance_floor)
            .select(&contributions, &derived);

        let explanation = match &selected {
            Some(factor) => ExplanationGenerator::new(registry).explain(
                &factor.contribution.feature,
                factor.contribution.scaled,
                factor.contribution.original,
                &derived,
            ),
            None => Explanation {
                text: "No dominant risk factor identified".to_string(),
                category: Category::Unclassified,
                feature: String::new(),
                intensity: None,
                level: None,
                indicator: None,
            },
        };
        let action = ActionRecommender::new().recommend(&explanation, &derived);

        let customer_id = customer_id(raw);
        debug!(
            "Assessed {}: {} ({:.3}), factor {:?}",
            customer_id.as_deref().unwrap_or("<anonymous>"),
            risk_label,
            probability,
            selected.as_ref().map(|s| s.contribution.feature.as_str())
        );

        Ok(Assessment {
            customer_id,
            risk_label,
            probability,
            explanation: explanation.text,
            action,
            main_feature: selected.map(|s| s.contribution.feature),
            category: explanation.category,
            top_factors: contributions.into_iter().take(TOP_FACTORS).collect(),
            diagnostics: normalization.diagnostics,
            zero_groups: encoder.zero_groups(&derived),
            schema_version: registry.version().to_string(),
        })
    }
}

/// `p_churn` from classifier output, rejecting anything that is not a probability.
fn checked_probability(proba: [f64; 2]) -> Result<f64> {
    if proba.iter().all(|p| p.is_finite() && (0.0..=1.0).contains(p)) {
        Ok(proba[1])
    } else {
        Err(ChurnError::Inference(format!(
            "Classifier returned invalid probabilities {:?}",
            proba
        )))
    }
}

/// `customer_id` from a raw record, when it is a non-empty string or a number.
pub fn customer_id(raw: &RawRecord) -> Option<String> {
    match raw.get(fields::CUSTOMER_ID)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
