//! Feature Deriver
//!
//! Computes the secondary features the model was trained on (buckets,
//! categories, flags, ratios) as a pure function of the normalized record.

use crate::fields;
use crate::record::{DerivedRecord, FieldValue, NormalizedRecord};
use crate::registry::SchemaRegistry;
use std::collections::BTreeMap;

/// Ticket count at which `high_tickets` is set.
pub const HIGH_TICKETS_THRESHOLD: f64 = 5.0;
/// Ticket count at which `critical_tickets` is set. Not the same cut-off as
/// `HIGH_TICKETS_THRESHOLD`; do not merge the two.
pub const CRITICAL_TICKETS_THRESHOLD: f64 = 6.0;
/// Population density (people/km²) above which an area counts as high density.
pub const HIGH_DENSITY_THRESHOLD: f64 = 30_000.0;
/// Ratio reported when median income is zero or negative.
pub const FALLBACK_PRICE_INCOME_RATIO: f64 = 0.01;

pub struct FeatureDeriver<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> FeatureDeriver<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    pub fn derive(&self, record: &NormalizedRecord) -> DerivedRecord {
        let mut derived = BTreeMap::new();

        let tenure = self.number(record, fields::TENURE, 0.0);
        let income = self.number(record, fields::MEDIAN_INCOME, 50_000.0);
        let nps = self.number(record, fields::NPS_SCORE, 50.0);
        let csat = self.number(record, fields::CSAT_SCORE, 3.0);
        let tickets = self.number(record, fields::SUPPORT_TICKETS, 0.0);
        let density = self.number(record, fields::POPULATION_DENSITY, 10_000.0);
        let monthly = self.number(record, fields::MONTHLY_CHARGE, 0.0);
        let complaint = self.text(record, fields::COMPLAINT_TYPE, fields::NO_COMPLAINT);

        text(&mut derived, fields::TENURE_GROUP, tenure_group(tenure));
        text(&mut derived, fields::INCOME_BRACKET, income_bracket(income));
        text(&mut derived, fields::NPS_CATEGORY, nps_category(nps));
        text(&mut derived, fields::CSAT_CATEGORY, csat_category(csat));

        flag(&mut derived, fields::HAS_COMPLAINT, complaint != fields::NO_COMPLAINT);
        flag(&mut derived, fields::HIGH_TICKETS, tickets >= HIGH_TICKETS_THRESHOLD);
        flag(&mut derived, fields::CRITICAL_TICKETS, tickets >= CRITICAL_TICKETS_THRESHOLD);
        flag(&mut derived, fields::HIGH_DENSITY_AREA, density > HIGH_DENSITY_THRESHOLD);

        derived.insert(
            fields::PRICE_INCOME_RATIO.to_string(),
            FieldValue::Number(price_income_ratio(monthly, income)),
        );

        let premium = fields::PREMIUM_SERVICES
            .iter()
            .filter(|service| record.text(service) == Some(fields::YES))
            .count();
        derived.insert(
            fields::PREMIUM_SERVICE_COUNT.to_string(),
            FieldValue::Number(premium as f64),
        );

        // Absent lifetime total: approximate from the monthly charge.
        if record.was_defaulted(fields::TOTAL_CHARGES) {
            derived.insert(
                fields::TOTAL_CHARGES.to_string(),
                FieldValue::Number(monthly * tenure),
            );
        }

        DerivedRecord {
            base: record.clone(),
            derived,
        }
    }

    fn number(&self, record: &NormalizedRecord, field: &str, fallback: f64) -> f64 {
        record
            .number(field)
            .or_else(|| self.registry.numeric_default(field))
            .unwrap_or(fallback)
    }

    fn text<'r>(&'r self, record: &'r NormalizedRecord, field: &str, fallback: &'r str) -> &'r str {
        record
            .text(field)
            .or_else(|| self.registry.text_default(field))
            .unwrap_or(fallback)
    }
}

fn text(derived: &mut BTreeMap<String, FieldValue>, field: &str, value: &str) {
    derived.insert(field.to_string(), FieldValue::Text(value.to_string()));
}

fn flag(derived: &mut BTreeMap<String, FieldValue>, field: &str, on: bool) {
    derived.insert(field.to_string(), FieldValue::Number(if on { 1.0 } else { 0.0 }));
}

pub fn tenure_group(months: f64) -> &'static str {
    if months <= 12.0 {
        "0-12 months"
    } else if months <= 24.0 {
        "13-24 months"
    } else if months <= 48.0 {
        "25-48 months"
    } else {
        "49+ months"
    }
}

pub fn income_bracket(income: f64) -> &'static str {
    if income < 50_000.0 {
        "Low"
    } else if income < 80_000.0 {
        "Medium"
    } else {
        "High"
    }
}

pub fn nps_category(nps: f64) -> &'static str {
    if nps < 50.0 {
        "Detractor"
    } else if nps < 70.0 {
        "Passive"
    } else {
        "Promoter"
    }
}

pub fn csat_category(csat: f64) -> &'static str {
    if csat < 3.0 {
        "Dissatisfied"
    } else if csat < 4.0 {
        "Neutral"
    } else {
        "Satisfied"
    }
}

/// Yearly charge as a share of the area's median income.
pub fn price_income_ratio(monthly_charge: f64, median_income: f64) -> f64 {
    if median_income > 0.0 {
        (monthly_charge * 12.0) / median_income
    } else {
        FALLBACK_PRICE_INCOME_RATIO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::InputNormalizer;
    use crate::record::RawRecord;
    use crate::registry::tests::sample_registry;
    use serde_json::json;

    fn derive(value: serde_json::Value) -> DerivedRecord {
        let registry = sample_registry();
        let raw: RawRecord = value.as_object().cloned().unwrap();
        let normalized = InputNormalizer::new(&registry).normalize(&raw).record;
        FeatureDeriver::new(&registry).derive(&normalized)
    }

    #[test]
    fn test_tenure_buckets_inclusive_upper_bounds() {
        assert_eq!(tenure_group(0.0), "0-12 months");
        assert_eq!(tenure_group(12.0), "0-12 months");
        assert_eq!(tenure_group(13.0), "13-24 months");
        assert_eq!(tenure_group(24.0), "13-24 months");
        assert_eq!(tenure_group(48.0), "25-48 months");
        assert_eq!(tenure_group(49.0), "49+ months");
    }

    #[test]
    fn test_category_thresholds() {
        assert_eq!(income_bracket(49_999.0), "Low");
        assert_eq!(income_bracket(50_000.0), "Medium");
        assert_eq!(income_bracket(80_000.0), "High");
        assert_eq!(nps_category(49.9), "Detractor");
        assert_eq!(nps_category(50.0), "Passive");
        assert_eq!(nps_category(70.0), "Promoter");
        assert_eq!(csat_category(2.9), "Dissatisfied");
        assert_eq!(csat_category(3.0), "Neutral");
        assert_eq!(csat_category(4.0), "Satisfied");
    }

    #[test]
    fn test_ticket_flags_use_distinct_thresholds() {
        let five = derive(json!({"support_tickets": 5}));
        assert_eq!(five.number(fields::HIGH_TICKETS), Some(1.0));
        assert_eq!(five.number(fields::CRITICAL_TICKETS), Some(0.0));

        let six = derive(json!({"support_tickets": 6}));
        assert_eq!(six.number(fields::HIGH_TICKETS), Some(1.0));
        assert_eq!(six.number(fields::CRITICAL_TICKETS), Some(1.0));

        let four = derive(json!({"support_tickets": 4}));
        assert_eq!(four.number(fields::HIGH_TICKETS), Some(0.0));
    }

    #[test]
    fn test_complaint_flag() {
        assert_eq!(derive(json!({})).number(fields::HAS_COMPLAINT), Some(0.0));
        assert_eq!(
            derive(json!({"complaint_type": "billing"})).number(fields::HAS_COMPLAINT),
            Some(1.0)
        );
    }

    #[test]
    fn test_caller_supplied_flag_is_overridden() {
        let record = derive(json!({"has_complaint": 1, "complaint_type": "None"}));
        assert_eq!(record.number(fields::HAS_COMPLAINT), Some(0.0));
    }

    #[test]
    fn test_price_income_ratio() {
        assert!((price_income_ratio(50.0, 60_000.0) - 0.01).abs() < 1e-12);
        assert_eq!(price_income_ratio(80.0, 0.0), FALLBACK_PRICE_INCOME_RATIO);
        assert_eq!(price_income_ratio(80.0, -10.0), FALLBACK_PRICE_INCOME_RATIO);
    }

    #[test]
    fn test_premium_service_count() {
        let record = derive(json!({
            "online_security": "Yes",
            "online_backup": "Yes",
            "streaming_tv": "No",
            "tech_support": "Yes"
        }));
        assert_eq!(record.number(fields::PREMIUM_SERVICE_COUNT), Some(3.0));
    }

    #[test]
    fn test_missing_income_uses_default_for_bracket() {
        let record = derive(json!({}));
        // sample registry has no median_income field, so the built-in fallback applies
        assert_eq!(record.text(fields::INCOME_BRACKET), Some("Medium"));
        assert_eq!(record.number(fields::HIGH_DENSITY_AREA), Some(0.0));
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let input = json!({"tenure": 30, "monthly_charge": 80.5, "csat_score": "2.5"});
        assert_eq!(derive(input.clone()), derive(input));
    }
}
