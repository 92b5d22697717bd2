use churn_xai::explain::Category;
use churn_xai::normalize::DiagnosticKind;
use churn_xai::{ChurnError, ChurnPipeline, EngineConfig, RawRecord, SchemaRegistry};
use serde_json::json;
use std::path::PathBuf;

fn model_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("models/churn_v2")
}

fn pipeline() -> ChurnPipeline {
    let config = EngineConfig {
        model_dir: model_dir(),
        ..EngineConfig::default()
    };
    ChurnPipeline::from_config(config).unwrap()
}

fn raw(value: serde_json::Value) -> RawRecord {
    value.as_object().cloned().unwrap()
}

#[test]
fn test_shipped_registry_loads() {
    let registry = SchemaRegistry::load(model_dir()).unwrap();
    assert_eq!(registry.version(), "churn-v2");
    assert_eq!(registry.columns().len(), 60);
    assert_eq!(registry.scaled_columns().len(), 14);
    assert_eq!(registry.baseline("contract"), Some("Two years"));
    assert_eq!(registry.baseline("nps_category"), Some("Detractor"));
    assert_eq!(registry.baseline("csat_category"), Some("Dissatisfied"));
    assert_eq!(registry.baseline("complaint_type"), Some("None"));
}

/// New, expensive customer without commitment.
#[test]
fn test_scenario_new_monthly_customer() {
    let assessment = pipeline()
        .assess(&raw(json!({
            "customer_id": "A-1",
            "tenure": 4,
            "monthly_charge": 73.9,
            "contract": "Monthly",
            "internet_service": "Fiber optic",
            "payment_method": "Electronic check",
            "online_security": "No",
            "online_backup": "No",
            "device_protection": "No",
            "tech_support": "No",
            "streaming_tv": "No",
            "streaming_movies": "No"
        })))
        .unwrap();

    assert_eq!(assessment.risk_label, "High");
    assert!(matches!(
        assessment.category,
        Category::Tenure | Category::ContractType | Category::Price
    ));
    assert_eq!(assessment.main_feature.as_deref(), Some("tenure"));
    assert_eq!(assessment.explanation, "Tenure low: 4 months");
    assert!(
        assessment.action.starts_with("Intensive onboarding program")
            || assessment.action.starts_with("Loyalty proposal with annual contract upgrade")
    );
    assert_eq!(assessment.top_factors[1].feature, "contract_Monthly");
}

/// Loyal, well-served customer on a long contract.
#[test]
fn test_scenario_loyal_customer() {
    let assessment = pipeline()
        .assess(&raw(json!({
            "customer_id": "B-1",
            "tenure": 72,
            "monthly_charge": 89.5,
            "total_charges": 6444.0,
            "contract": "Two years",
            "internet_service": "DSL",
            "payment_method": "Credit card",
            "online_security": "Yes",
            "online_backup": "Yes",
            "device_protection": "Yes",
            "tech_support": "Yes",
            "streaming_tv": "No",
            "streaming_movies": "No",
            "nps_score": 85,
            "csat_score": 4.6,
            "email_open_rate": 0.55,
            "median_income": 72000,
            "partner": "Yes",
            "dependents": "Yes",
            "customer_segment": "Residential"
        })))
        .unwrap();

    assert_eq!(assessment.risk_label, "Low");
    assert!(assessment.probability < 0.30);
    assert!(matches!(assessment.category, Category::Tenure | Category::Engagement));
    assert_eq!(assessment.explanation, "Tenure high: 72 months");
    assert!(assessment.action.starts_with("Proactive retention contact"));
}

/// Malformed satisfaction score is replaced, never rejected.
#[test]
fn test_scenario_malformed_input() {
    let assessment = pipeline()
        .assess(&raw(json!({
            "customer_id": "C-1",
            "tenure": 30,
            "csat_score": "abc",
            "contract": "One year"
        })))
        .unwrap();

    let csat = assessment
        .diagnostics
        .iter()
        .find(|d| d.field == "csat_score")
        .unwrap();
    assert_eq!(csat.kind, DiagnosticKind::Unparsable);
    assert_eq!(csat.raw.as_deref(), Some("abc"));
    assert_eq!(csat.substituted.as_number(), Some(3.0));
}

/// A live complaint outranks a slightly larger ticket contribution.
#[test]
fn test_scenario_complaint_beats_tickets() {
    let assessment = pipeline()
        .assess(&raw(json!({
            "customer_id": "D-1",
            "tenure": 20,
            "monthly_charge": 70,
            "contract": "One year",
            "complaint_type": "billing",
            "support_tickets": 5,
            "nps_score": 55,
            "csat_score": 3.5
        })))
        .unwrap();

    // raw ranking puts tickets first
    assert_eq!(assessment.top_factors[0].feature, "support_tickets");
    assert_eq!(assessment.top_factors[1].feature, "has_complaint");
    assert!(assessment.top_factors[0].contribution > assessment.top_factors[1].contribution);

    assert_eq!(assessment.main_feature.as_deref(), Some("has_complaint"));
    assert_eq!(assessment.category, Category::Complaint);
    assert_eq!(assessment.explanation, "Active complaint: Billing");
    assert_eq!(
        assessment.action,
        "Immediate attention to complaint (Billing): Active complaint: Billing"
    );
}

#[test]
fn test_unseen_categories_still_assess() {
    let assessment = pipeline()
        .assess(&raw(json!({
            "contract": "Quarterly",
            "internet_service": "Satellite",
            "customer_segment": "Government",
            "tenure": 15
        })))
        .unwrap();

    let invalid: Vec<&str> = assessment
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::InvalidCategory)
        .map(|d| d.field.as_str())
        .collect();
    assert_eq!(invalid, vec!["internet_service", "contract", "customer_segment"]);
}

#[test]
fn test_assessment_serializes_for_callers() {
    let assessment = pipeline().assess(&raw(json!({"customer_id": 77, "tenure": 2}))).unwrap();
    let value = serde_json::to_value(&assessment).unwrap();
    assert_eq!(value["customer_id"], json!("77"));
    assert_eq!(value["schema_version"], json!("churn-v2"));
    assert!(value["top_factors"].as_array().unwrap().len() <= 3);
}

#[test]
fn test_missing_model_dir_is_configuration_error() {
    let config = EngineConfig {
        model_dir: PathBuf::from("/nonexistent/churn"),
        ..EngineConfig::default()
    };
    let err = ChurnPipeline::from_config(config).err().unwrap();
    assert!(err.is_configuration());
    assert!(matches!(err, ChurnError::Registry(_)));
}
