//! Schema Registry
//!
//! Frozen description of what the trained model expects: the ordered column
//! list, which columns were standardized at training time (and with which
//! mean/scale), and the per-field defaults / valid values used to clean input.
//! Loaded once from a model directory and never mutated afterwards, so it is
//! shared across threads behind an `Arc` without locking.

use crate::error::{ChurnError, Result};
use crate::fields;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// `schema.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Feature-contract version, e.g. "churn-v2".
    pub version: String,
    pub columns: Vec<String>,
    pub scaled_columns: Vec<String>,
}

/// Standardization parameters for one column (`scaler.json` entry).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: f64,
    pub scale: f64,
}

/// What to do with a numeric value outside `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRange {
    #[default]
    Clamp,
    Default,
}

/// Field type plus its cleaning rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Numeric {
        default: f64,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
        #[serde(default)]
        out_of_range: OutOfRange,
    },
    Binary {
        default: u8,
    },
    Categorical {
        default: String,
        values: Vec<String>,
        /// Level the model represents as an all-zero one-hot group.
        #[serde(default)]
        baseline: Option<String>,
    },
    Text {
        default: String,
    },
}

/// One entry of `fields.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    /// Computed by the deriver rather than read from input.
    #[serde(default)]
    pub derived: bool,
}

impl FieldSpec {
    pub fn is_categorical(&self) -> bool {
        matches!(self.kind, FieldKind::Categorical { .. })
    }
}

#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    version: String,
    columns: Vec<String>,
    scaled_columns: BTreeSet<String>,
    scaler_params: HashMap<String, ScalerParams>,
    fields: Vec<FieldSpec>,

    // Indexes for fast lookup
    column_index: HashMap<String, usize>,
    fields_by_name: HashMap<String, usize>,
}

impl SchemaRegistry {
    /// Load `schema.json`, `scaler.json` and `fields.json` from a model directory.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();

        let schema: ColumnSchema = Self::load_json(dir.join("schema.json"))?;
        let scaler: HashMap<String, ScalerParams> = Self::load_json(dir.join("scaler.json"))?;
        let fields: Vec<FieldSpec> = Self::load_json(dir.join("fields.json"))?;

        let registry = Self::from_parts(schema, scaler, fields)?;
        info!(
            "Loaded schema registry {} from {}: {} columns, {} scaled, {} fields",
            registry.version,
            dir.display(),
            registry.columns.len(),
            registry.scaled_columns.len(),
            registry.fields.len()
        );
        Ok(registry)
    }

    /// Build and validate a registry from already-parsed artifacts.
    pub fn from_parts(
        schema: ColumnSchema,
        scaler: HashMap<String, ScalerParams>,
        fields: Vec<FieldSpec>,
    ) -> Result<Self> {
        let mut column_index = HashMap::with_capacity(schema.columns.len());
        for (idx, column) in schema.columns.iter().enumerate() {
            if column_index.insert(column.clone(), idx).is_some() {
                return Err(ChurnError::Registry(format!("Duplicate column '{}'", column)));
            }
        }

        let mut scaled_columns = BTreeSet::new();
        let mut scaler_params = HashMap::new();
        for column in &schema.scaled_columns {
            if !column_index.contains_key(column) {
                return Err(ChurnError::Registry(format!(
                    "Scaled column '{}' is not in the column list",
                    column
                )));
            }
            let mut params = *scaler.get(column).ok_or_else(|| {
                ChurnError::Registry(format!("No scaler parameters for column '{}'", column))
            })?;
            if !params.mean.is_finite() || !params.scale.is_finite() {
                return Err(ChurnError::Registry(format!(
                    "Non-finite scaler parameters for column '{}'",
                    column
                )));
            }
            // A constant training column has zero variance; standard scalers use 1.0 there.
            if params.scale == 0.0 {
                warn!("Column '{}' has zero scale, using 1.0", column);
                params.scale = 1.0;
            }
            scaled_columns.insert(column.clone());
            scaler_params.insert(column.clone(), params);
        }

        let mut fields_by_name = HashMap::with_capacity(fields.len());
        for (idx, field) in fields.iter().enumerate() {
            if fields_by_name.insert(field.name.clone(), idx).is_some() {
                return Err(ChurnError::Registry(format!("Duplicate field '{}'", field.name)));
            }
            Self::validate_field(field, &column_index)?;
        }

        Ok(SchemaRegistry {
            version: schema.version,
            columns: schema.columns,
            scaled_columns,
            scaler_params,
            fields,
            column_index,
            fields_by_name,
        })
    }

    fn validate_field(field: &FieldSpec, column_index: &HashMap<String, usize>) -> Result<()> {
        match &field.kind {
            FieldKind::Numeric { default, min, max, .. } => {
                if let (Some(lo), Some(hi)) = (min, max) {
                    if lo > hi {
                        return Err(ChurnError::Registry(format!(
                            "Field '{}' has min {} above max {}",
                            field.name, lo, hi
                        )));
                    }
                }
                if min.map_or(false, |lo| *default < lo) || max.map_or(false, |hi| *default > hi) {
                    return Err(ChurnError::Registry(format!(
                        "Default {} for field '{}' is outside its range",
                        default, field.name
                    )));
                }
            }
            FieldKind::Binary { default } => {
                if *default > 1 {
                    return Err(ChurnError::Registry(format!(
                        "Binary field '{}' has default {}",
                        field.name, default
                    )));
                }
            }
            FieldKind::Categorical { default, values, baseline } => {
                if !values.iter().any(|v| v == default) {
                    return Err(ChurnError::Registry(format!(
                        "Default '{}' for field '{}' is not one of its values",
                        default, field.name
                    )));
                }
                if let Some(base) = baseline {
                    if column_index.contains_key(&fields::one_hot(&field.name, base)) {
                        return Err(ChurnError::Registry(format!(
                            "Baseline level '{}' of field '{}' must not have a column",
                            base, field.name
                        )));
                    }
                }
                for level in values {
                    let is_baseline = baseline.as_deref() == Some(level.as_str());
                    if !is_baseline && !column_index.contains_key(&fields::one_hot(&field.name, level)) {
                        warn!(
                            "Level '{}' of field '{}' has no column and is not the declared baseline",
                            level, field.name
                        );
                    }
                }
            }
            FieldKind::Text { .. } => {}
        }
        Ok(())
    }

    fn load_json<T: for<'de> Deserialize<'de>>(path: PathBuf) -> Result<T> {
        debug!("Reading registry artifact {}", path.display());
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ChurnError::Registry(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| ChurnError::Registry(format!("Failed to parse {}: {}", path.display(), e)))
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.column_index.get(column).copied()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index.contains_key(column)
    }

    pub fn scaled_columns(&self) -> &BTreeSet<String> {
        &self.scaled_columns
    }

    pub fn is_scaled(&self, column: &str) -> bool {
        self.scaled_columns.contains(column)
    }

    pub fn scaler_params(&self, column: &str) -> Option<ScalerParams> {
        self.scaler_params.get(column).copied()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields_by_name.get(name).map(|&idx| &self.fields[idx])
    }

    /// Fields read from input (everything not computed by the deriver).
    pub fn input_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| !f.derived)
    }

    pub fn categorical_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.is_categorical())
    }

    /// Numeric default for `field`, if the field is numeric or binary.
    pub fn numeric_default(&self, field: &str) -> Option<f64> {
        match self.field(field).map(|f| &f.kind) {
            Some(FieldKind::Numeric { default, .. }) => Some(*default),
            Some(FieldKind::Binary { default }) => Some(f64::from(*default)),
            _ => None,
        }
    }

    /// Text default for `field`, if the field is categorical or free text.
    pub fn text_default(&self, field: &str) -> Option<&str> {
        match self.field(field).map(|f| &f.kind) {
            Some(FieldKind::Categorical { default, .. }) | Some(FieldKind::Text { default }) => {
                Some(default.as_str())
            }
            _ => None,
        }
    }

    pub fn valid_enum_values(&self, field: &str) -> Option<&[String]> {
        match self.field(field).map(|f| &f.kind) {
            Some(FieldKind::Categorical { values, .. }) => Some(values.as_slice()),
            _ => None,
        }
    }

    pub fn baseline(&self, field: &str) -> Option<&str> {
        match self.field(field).map(|f| &f.kind) {
            Some(FieldKind::Categorical { baseline, .. }) => baseline.as_deref(),
            _ => None,
        }
    }
}
