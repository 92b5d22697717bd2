//! Action Recommender
//!
//! Maps an explanation to a retention action. The explanation already carries
//! the diagnosis (category, direction, active level), so no raw thresholds are
//! re-checked here. Unmatched explanations get a segment-aware generic action.

use crate::explain::{Category, Explanation, Intensity};
use crate::fields;
use crate::record::DerivedRecord;

pub struct ActionRule {
    pub name: &'static str,
    pub applies: fn(&Explanation) -> bool,
    pub render: fn(&Explanation, &DerivedRecord) -> String,
}

fn low(e: &Explanation) -> bool {
    e.intensity.map_or(false, Intensity::is_low)
}

fn high(e: &Explanation) -> bool {
    e.intensity.map_or(false, Intensity::is_high)
}

fn level_is(e: &Explanation, levels: &[&str]) -> bool {
    e.level.as_deref().map_or(false, |l| levels.contains(&l))
}

fn is_nps(e: &Explanation) -> bool {
    e.feature.starts_with("nps")
}

/// Ordered; first match wins.
pub const ACTION_RULES: &[ActionRule] = &[
    ActionRule {
        name: "nps_outreach",
        applies: |e| {
            e.category == Category::Satisfaction && is_nps(e) && (low(e) || level_is(e, &["Detractor"]))
        },
        render: |e, _| format!("Priority outreach for low satisfaction: {}", e.text),
    },
    ActionRule {
        name: "csat_escalation",
        applies: |e| {
            e.category == Category::Satisfaction && (low(e) || level_is(e, &["Dissatisfied", "Detractor"]))
        },
        render: |e, _| format!("Escalation for negative experience: {}", e.text),
    },
    ActionRule {
        name: "support_review",
        applies: |e| e.category == Category::SupportLoad && (high(e) || e.indicator == Some(true)),
        render: |e, _| format!("Urgent support review: {}", e.text),
    },
    ActionRule {
        name: "complaint_resolution",
        applies: |e| {
            e.category == Category::Complaint
                && (e.indicator == Some(true)
                    || e.level.as_deref().map_or(false, |l| l != fields::NO_COMPLAINT))
        },
        render: |e, record| {
            let kind = e
                .level
                .as_deref()
                .or_else(|| record.text(fields::COMPLAINT_TYPE))
                .unwrap_or("unspecified");
            format!("Immediate attention to complaint ({}): {}", kind, e.text)
        },
    },
    ActionRule {
        name: "pricing_review",
        applies: |e| e.category == Category::Price && high(e),
        render: |e, _| format!("Commercial pricing review: {}", e.text),
    },
    ActionRule {
        name: "contract_upgrade",
        applies: |e| e.category == Category::ContractType && level_is(e, &["Monthly"]),
        render: |e, _| format!("Loyalty proposal with annual contract upgrade: {}", e.text),
    },
    ActionRule {
        name: "onboarding",
        applies: |e| e.category == Category::Tenure && (low(e) || level_is(e, &["0-12 months"])),
        render: |e, _| format!("Intensive onboarding program: {}", e.text),
    },
    ActionRule {
        name: "reactivation",
        applies: |e| e.category == Category::Engagement && low(e),
        render: |e, _| format!("Reactivation campaign: {}", e.text),
    },
];

pub struct ActionRecommender;

impl ActionRecommender {
    pub fn new() -> Self {
        Self
    }

    pub fn recommend(&self, explanation: &Explanation, record: &DerivedRecord) -> String {
        match ACTION_RULES.iter().find(|rule| (rule.applies)(explanation)) {
            Some(rule) => (rule.render)(explanation, record),
            None => segment_fallback(explanation, record),
        }
    }

    /// Recommend from explanation text alone, inferring category and direction
    /// from its wording.
    pub fn recommend_for_text(&self, text: &str, record: &DerivedRecord) -> String {
        let lower = text.to_lowercase();
        let intensity = if lower.contains("very low") {
            Some(Intensity::VeryLow)
        } else if lower.contains("very high") {
            Some(Intensity::VeryHigh)
        } else if lower.contains(" low") {
            Some(Intensity::Low)
        } else if lower.contains(" high") {
            Some(Intensity::High)
        } else {
            None
        };
        let category = Category::infer(text);
        let level = ["Monthly", "Detractor", "Dissatisfied", "0-12 months"]
            .iter()
            .find(|l| text.contains(*l))
            .map(|l| l.to_string());
        let indicator = match category {
            Category::Complaint => Some(!lower.contains("no complaint")),
            _ => None,
        };

        let explanation = Explanation {
            text: text.to_string(),
            category,
            feature: if lower.contains("nps") { fields::NPS_SCORE } else { "" }.to_string(),
            intensity,
            level,
            indicator,
        };
        self.recommend(&explanation, record)
    }
}

impl Default for ActionRecommender {
    fn default() -> Self {
        Self::new()
    }
}

fn segment_fallback(explanation: &Explanation, record: &DerivedRecord) -> String {
    match record.text(fields::CUSTOMER_SEGMENT) {
        Some("Corporate") => format!("Priority executive account management: {}", explanation.text),
        Some("SMB") => format!("Personalized commercial follow-up: {}", explanation.text),
        _ => format!("Proactive retention contact: {}", explanation.text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FieldValue, NormalizedRecord};

    fn explanation(
        text: &str,
        category: Category,
        feature: &str,
        intensity: Option<Intensity>,
        level: Option<&str>,
        indicator: Option<bool>,
    ) -> Explanation {
        Explanation {
            text: text.to_string(),
            category,
            feature: feature.to_string(),
            intensity,
            level: level.map(str::to_string),
            indicator,
        }
    }

    fn record(segment: &str, complaint: &str) -> DerivedRecord {
        let mut base = NormalizedRecord::default();
        base.values.insert("customer_segment".to_string(), FieldValue::Text(segment.to_string()));
        base.values.insert("complaint_type".to_string(), FieldValue::Text(complaint.to_string()));
        DerivedRecord {
            base,
            derived: Default::default(),
        }
    }

    #[test]
    fn test_satisfaction_actions() {
        let rec = record("Residential", "None");
        let nps = explanation("NPS very low: 12/100", Category::Satisfaction, "nps_score", Some(Intensity::VeryLow), None, None);
        assert_eq!(
            ActionRecommender::new().recommend(&nps, &rec),
            "Priority outreach for low satisfaction: NPS very low: 12/100"
        );
        let csat = explanation("CSAT low: 2.4/5.0", Category::Satisfaction, "csat_score", Some(Intensity::Low), None, None);
        assert!(ActionRecommender::new()
            .recommend(&csat, &rec)
            .starts_with("Escalation for negative experience"));
    }

    #[test]
    fn test_complaint_action_names_type() {
        let rec = record("Residential", "Billing");
        let e = explanation("Active complaint: Billing", Category::Complaint, "has_complaint", None, None, Some(true));
        assert_eq!(
            ActionRecommender::new().recommend(&e, &rec),
            "Immediate attention to complaint (Billing): Active complaint: Billing"
        );
    }

    #[test]
    fn test_monthly_contract_upgrade() {
        let rec = record("Residential", "None");
        let e = explanation("Contract: Monthly", Category::ContractType, "contract_Monthly", None, Some("Monthly"), None);
        assert!(ActionRecommender::new()
            .recommend(&e, &rec)
            .starts_with("Loyalty proposal with annual contract upgrade"));
    }

    #[test]
    fn test_low_tenure_onboarding_but_long_tenure_falls_back() {
        let rec = record("SMB", "None");
        let new = explanation("Tenure low: 4 months", Category::Tenure, "tenure", Some(Intensity::Low), None, None);
        assert!(ActionRecommender::new().recommend(&new, &rec).starts_with("Intensive onboarding program"));

        let loyal = explanation("Tenure high: 72 months", Category::Tenure, "tenure", Some(Intensity::High), None, None);
        assert_eq!(
            ActionRecommender::new().recommend(&loyal, &rec),
            "Personalized commercial follow-up: Tenure high: 72 months"
        );
    }

    #[test]
    fn test_segment_fallbacks() {
        let e = explanation("Gender: Female", Category::Unclassified, "gender_Female", None, Some("Female"), None);
        let recommender = ActionRecommender::new();
        assert!(recommender.recommend(&e, &record("Corporate", "None")).starts_with("Priority executive"));
        assert!(recommender.recommend(&e, &record("SMB", "None")).starts_with("Personalized commercial"));
        assert!(recommender.recommend(&e, &record("Residential", "None")).starts_with("Proactive retention"));
    }

    #[test]
    fn test_recommend_from_text() {
        let recommender = ActionRecommender::new();
        let rec = record("Residential", "Service");
        assert!(recommender
            .recommend_for_text("Tickets very high: 9 reported", &rec)
            .starts_with("Urgent support review"));
        assert!(recommender
            .recommend_for_text("NPS low: 30/100", &rec)
            .starts_with("Priority outreach"));
        assert_eq!(
            recommender.recommend_for_text("Active complaint: Service", &rec),
            "Immediate attention to complaint (Service): Active complaint: Service"
        );
        assert!(recommender
            .recommend_for_text("Engagement very low: 3% email open rate", &rec)
            .starts_with("Reactivation campaign"));
    }
}
