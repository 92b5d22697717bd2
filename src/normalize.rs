//! Input Normalizer
//!
//! Turns an untyped customer record into a `NormalizedRecord`. This stage never
//! fails: missing or malformed values are replaced by the registry defaults and
//! every substitution is reported as a `Diagnostic` (and logged).

use crate::record::{FieldValue, NormalizedRecord, RawRecord};
use crate::registry::{FieldKind, FieldSpec, OutOfRange, SchemaRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Why a raw value was replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// Absent, null or blank.
    Missing,
    /// Could not be read as a number.
    Unparsable,
    /// Numeric value outside the field's legal range.
    OutOfRange,
    /// Not one of the field's enumerated values.
    InvalidCategory,
    /// Not a recognised yes/no value for a binary field.
    InvalidBinary,
}

/// A non-fatal note about one field substitution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub field: String,
    pub kind: DiagnosticKind,
    /// Raw input rendered as text, when there was any.
    pub raw: Option<String>,
    pub substituted: FieldValue,
}

/// Normalizer output.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalization {
    pub record: NormalizedRecord,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct InputNormalizer<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> InputNormalizer<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    pub fn normalize(&self, raw: &RawRecord) -> Normalization {
        let mut record = NormalizedRecord::default();
        let mut diagnostics = Vec::new();

        for spec in self.registry.input_fields() {
            let (value, defaulted) = self.normalize_field(spec, raw.get(&spec.name), &mut diagnostics);
            if defaulted {
                record.defaulted.insert(spec.name.clone());
            }
            record.values.insert(spec.name.clone(), value);
        }

        // Fields the registry does not know are carried along; they never reach
        // the model unless a column carries their name.
        for (name, value) in raw {
            if self.registry.field(name).is_some() {
                continue;
            }
            if let Some(carried) = passthrough(value) {
                record.values.insert(name.clone(), carried);
            }
        }

        debug!(
            "Normalized record: {} fields, {} substitutions",
            record.len(),
            diagnostics.len()
        );

        Normalization { record, diagnostics }
    }

    fn normalize_field(
        &self,
        spec: &FieldSpec,
        raw: Option<&Value>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> (FieldValue, bool) {
        let default = default_of(&spec.kind);

        let raw = match raw {
            Some(value) if !is_blank(value) => value,
            _ => {
                warn!("Field '{}' missing, using default {}", spec.name, default);
                diagnostics.push(Diagnostic {
                    field: spec.name.clone(),
                    kind: DiagnosticKind::Missing,
                    raw: None,
                    substituted: default.clone(),
                });
                return (default, true);
            }
        };

        match &spec.kind {
            FieldKind::Numeric { default: fallback, min, max, out_of_range } => {
                let Some(number) = coerce_number(raw) else {
                    warn!("Could not read '{}' as a number for {}, using default {}", render(raw), spec.name, fallback);
                    diagnostics.push(Diagnostic {
                        field: spec.name.clone(),
                        kind: DiagnosticKind::Unparsable,
                        raw: Some(render(raw)),
                        substituted: default.clone(),
                    });
                    return (default, true);
                };

                let below = min.map_or(false, |lo| number < lo);
                let above = max.map_or(false, |hi| number > hi);
                if !below && !above {
                    return (FieldValue::Number(number), false);
                }

                let substituted = match out_of_range {
                    OutOfRange::Clamp => {
                        let lo = min.unwrap_or(f64::NEG_INFINITY);
                        let hi = max.unwrap_or(f64::INFINITY);
                        number.clamp(lo, hi)
                    }
                    OutOfRange::Default => *fallback,
                };
                warn!("{} out of range: {}, using {}", spec.name, number, substituted);
                diagnostics.push(Diagnostic {
                    field: spec.name.clone(),
                    kind: DiagnosticKind::OutOfRange,
                    raw: Some(render(raw)),
                    substituted: FieldValue::Number(substituted),
                });
                (FieldValue::Number(substituted), *out_of_range == OutOfRange::Default)
            }
            FieldKind::Binary { .. } => match coerce_binary(raw) {
                Some(bit) => (FieldValue::Number(bit), false),
                None => {
                    warn!("Invalid yes/no value '{}' for {}, using default {}", render(raw), spec.name, default);
                    diagnostics.push(Diagnostic {
                        field: spec.name.clone(),
                        kind: DiagnosticKind::InvalidBinary,
                        raw: Some(render(raw)),
                        substituted: default.clone(),
                    });
                    (default, true)
                }
            },
            FieldKind::Categorical { values, .. } => {
                let cleaned = clean_string(&render(raw));
                let wanted = cleaned.to_lowercase();
                match values.iter().find(|v| v.to_lowercase() == wanted) {
                    Some(canonical) => (FieldValue::Text(canonical.clone()), false),
                    None => {
                        warn!("Invalid value '{}' for {}, using default {}", cleaned, spec.name, default);
                        diagnostics.push(Diagnostic {
                            field: spec.name.clone(),
                            kind: DiagnosticKind::InvalidCategory,
                            raw: Some(cleaned),
                            substituted: default.clone(),
                        });
                        (default, true)
                    }
                }
            }
            FieldKind::Text { .. } => (FieldValue::Text(clean_string(&render(raw))), false),
        }
    }
}

fn default_of(kind: &FieldKind) -> FieldValue {
    match kind {
        FieldKind::Numeric { default, .. } => FieldValue::Number(*default),
        FieldKind::Binary { default } => FieldValue::Number(f64::from(*default)),
        FieldKind::Categorical { default, .. } | FieldKind::Text { default } => {
            FieldValue::Text(default.clone())
        }
    }
}

/// Trim and collapse internal whitespace runs to a single space.
pub fn clean_string(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// 1.0 / 0.0 for recognised yes/no spellings, `None` otherwise.
fn coerce_binary(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => match n.as_f64() {
            Some(x) if x == 1.0 => Some(1.0),
            Some(x) if x == 0.0 => Some(0.0),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "1" | "yes" | "si" | "sí" | "true" => Some(1.0),
            "0" | "no" | "false" => Some(0.0),
            _ => None,
        },
        _ => None,
    }
}

fn passthrough(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(FieldValue::Number),
        Value::Bool(b) => Some(FieldValue::Number(if *b { 1.0 } else { 0.0 })),
        Value::String(s) => {
            let cleaned = clean_string(s);
            (!cleaned.is_empty()).then_some(FieldValue::Text(cleaned))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::sample_registry;
    use serde_json::json;

    fn raw(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let registry = sample_registry();
        let out = InputNormalizer::new(&registry).normalize(&RawRecord::new());

        for spec in registry.input_fields() {
            assert!(out.record.get(&spec.name).is_some(), "missing {}", spec.name);
            assert!(out.record.was_defaulted(&spec.name));
        }
        assert_eq!(out.record.number("csat_score"), Some(3.0));
        assert_eq!(out.record.text("contract"), Some("Monthly"));
        assert!(out.diagnostics.iter().all(|d| d.kind == DiagnosticKind::Missing));
    }

    #[test]
    fn test_unparsable_number_uses_default() {
        let registry = sample_registry();
        let out = InputNormalizer::new(&registry).normalize(&raw(json!({"csat_score": "abc"})));

        assert_eq!(out.record.number("csat_score"), Some(3.0));
        let diag = out.diagnostics.iter().find(|d| d.field == "csat_score").unwrap();
        assert_eq!(diag.kind, DiagnosticKind::Unparsable);
        assert_eq!(diag.raw.as_deref(), Some("abc"));
    }

    #[test]
    fn test_numeric_strings_are_trimmed_and_parsed() {
        let registry = sample_registry();
        let out = InputNormalizer::new(&registry).normalize(&raw(json!({"tenure": "  12  "})));
        assert_eq!(out.record.number("tenure"), Some(12.0));
        assert!(!out.record.was_defaulted("tenure"));
    }

    #[test]
    fn test_out_of_range_clamps() {
        let registry = sample_registry();
        let out = InputNormalizer::new(&registry).normalize(&raw(json!({"csat_score": 9.5, "tenure": -3})));
        assert_eq!(out.record.number("csat_score"), Some(5.0));
        assert_eq!(out.record.number("tenure"), Some(0.0));
        assert!(!out.record.was_defaulted("csat_score"));
        assert_eq!(
            out.diagnostics.iter().filter(|d| d.kind == DiagnosticKind::OutOfRange).count(),
            2
        );
    }

    #[test]
    fn test_out_of_range_default_policy() {
        let registry = sample_registry();
        let out = InputNormalizer::new(&registry).normalize(&raw(json!({"nps_score": 140})));
        assert_eq!(out.record.number("nps_score"), Some(50.0));
        assert!(out.record.was_defaulted("nps_score"));
    }

    #[test]
    fn test_categorical_case_insensitive() {
        let registry = sample_registry();
        let out = InputNormalizer::new(&registry).normalize(&raw(json!({"contract": "  one   YEAR "})));
        assert_eq!(out.record.text("contract"), Some("One year"));
    }

    #[test]
    fn test_invalid_category_falls_back() {
        let registry = sample_registry();
        let out = InputNormalizer::new(&registry).normalize(&raw(json!({"contract": "Weekly"})));
        assert_eq!(out.record.text("contract"), Some("Monthly"));
        let diag = out.diagnostics.iter().find(|d| d.field == "contract").unwrap();
        assert_eq!(diag.kind, DiagnosticKind::InvalidCategory);
    }

    #[test]
    fn test_binary_coercion() {
        let registry = sample_registry();
        let normalizer = InputNormalizer::new(&registry);
        for (input, expected) in [
            (json!("Yes"), 1.0),
            (json!("si"), 1.0),
            (json!(1), 1.0),
            (json!(true), 1.0),
            (json!("no"), 0.0),
            (json!(" FALSE "), 0.0),
            (json!(0), 0.0),
        ] {
            let out = normalizer.normalize(&raw(json!({ "senior_citizen": input })));
            assert_eq!(out.record.number("senior_citizen"), Some(expected));
            assert!(out.diagnostics.iter().all(|d| d.field != "senior_citizen"));
        }
    }

    #[test]
    fn test_unrecognised_binary_falls_back_with_diagnostic() {
        let registry = sample_registry();
        let normalizer = InputNormalizer::new(&registry);
        for input in [json!("maybe"), json!(7), json!("2")] {
            let out = normalizer.normalize(&raw(json!({ "senior_citizen": input })));
            assert_eq!(out.record.number("senior_citizen"), Some(0.0));
            assert!(out.record.was_defaulted("senior_citizen"));

            let diag = out.diagnostics.iter().find(|d| d.field == "senior_citizen").unwrap();
            assert_eq!(diag.kind, DiagnosticKind::InvalidBinary);
            assert_eq!(diag.substituted, FieldValue::Number(0.0));
        }
        let out = normalizer.normalize(&raw(json!({"senior_citizen": "maybe"})));
        let diag = out.diagnostics.iter().find(|d| d.field == "senior_citizen").unwrap();
        assert_eq!(diag.raw.as_deref(), Some("maybe"));
    }

    #[test]
    fn test_text_whitespace_collapsed_and_unknown_carried() {
        let registry = sample_registry();
        let out = InputNormalizer::new(&registry).normalize(&raw(json!({
            "city": "  New    York ",
            "favourite_colour": " dark   blue",
            "loyalty_points": 12,
            "note": null
        })));
        assert_eq!(out.record.text("city"), Some("New York"));
        assert_eq!(out.record.text("favourite_colour"), Some("dark blue"));
        assert_eq!(out.record.number("loyalty_points"), Some(12.0));
        assert!(out.record.get("note").is_none());
    }

    #[test]
    fn test_blank_string_counts_as_missing() {
        let registry = sample_registry();
        let out = InputNormalizer::new(&registry).normalize(&raw(json!({"monthly_charge": "   "})));
        assert_eq!(out.record.number("monthly_charge"), Some(0.0));
        let diag = out.diagnostics.iter().find(|d| d.field == "monthly_charge").unwrap();
        assert_eq!(diag.kind, DiagnosticKind::Missing);
    }

    #[test]
    fn test_clean_string() {
        assert_eq!(clean_string("  a \t b\n\nc  "), "a b c");
        assert_eq!(clean_string(""), "");
    }
}
