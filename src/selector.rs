//! Factor Selector
//!
//! Picks the single most actionable factor out of a record's contributions.
//! Raw contribution favours whichever column deviates most, which is often
//! not something a retention team can act on. Each candidate's score is
//! therefore multiplied by the first boost rule it satisfies.

use crate::attribution::{sort_descending, FeatureContribution, SIGNIFICANCE_FLOOR};
use crate::fields;
use crate::record::DerivedRecord;
use serde::Serialize;
use tracing::debug;

/// A priority multiplier and the condition that earns it.
pub struct BoostRule {
    pub name: &'static str,
    pub multiplier: f64,
    pub applies: fn(&FeatureContribution, &DerivedRecord) -> bool,
}

/// Evaluated top to bottom; the first matching rule is the only one applied.
pub const BOOST_RULES: &[BoostRule] = &[
    BoostRule {
        name: "complaint",
        multiplier: 1.5,
        applies: complaint_active,
    },
    BoostRule {
        name: "support_load",
        multiplier: 1.4,
        applies: support_load_high,
    },
    BoostRule {
        name: "escalations",
        multiplier: 1.35,
        applies: escalated,
    },
    BoostRule {
        name: "satisfaction",
        multiplier: 1.3,
        applies: low_satisfaction,
    },
    BoostRule {
        name: "engagement",
        multiplier: 1.25,
        applies: low_engagement,
    },
    BoostRule {
        name: "nps",
        multiplier: 1.2,
        applies: detractor,
    },
];

fn complaint_active(c: &FeatureContribution, _: &DerivedRecord) -> bool {
    let complaint_column = c.feature == fields::HAS_COMPLAINT
        || c.feature.starts_with(&format!("{}_", fields::COMPLAINT_TYPE));
    complaint_column && c.original > 0.0
}

fn support_load_high(c: &FeatureContribution, _: &DerivedRecord) -> bool {
    match c.feature.as_str() {
        fields::HIGH_TICKETS | fields::CRITICAL_TICKETS => c.original > 0.0,
        fields::SUPPORT_TICKETS => c.scaled > 1.0,
        _ => false,
    }
}

fn escalated(c: &FeatureContribution, _: &DerivedRecord) -> bool {
    c.feature == fields::ESCALATIONS && c.original > 0.0
}

fn low_satisfaction(c: &FeatureContribution, record: &DerivedRecord) -> bool {
    if c.feature == fields::CSAT_SCORE {
        return c.scaled < -1.0 || record.text(fields::CSAT_CATEGORY) == Some("Dissatisfied");
    }
    c.feature == fields::one_hot(fields::CSAT_CATEGORY, "Dissatisfied") && c.original > 0.0
}

fn low_engagement(c: &FeatureContribution, _: &DerivedRecord) -> bool {
    c.feature == fields::EMAIL_OPEN_RATE && c.scaled < -1.0
}

fn detractor(c: &FeatureContribution, record: &DerivedRecord) -> bool {
    if c.feature == fields::NPS_SCORE {
        return c.scaled < -1.0 || record.text(fields::NPS_CATEGORY) == Some("Detractor");
    }
    c.feature == fields::one_hot(fields::NPS_CATEGORY, "Detractor") && c.original > 0.0
}

/// The selector's choice and how it got there.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedFactor {
    pub contribution: FeatureContribution,
    /// Contribution after the boost multiplier
    pub score: f64,
    /// Name of the boost rule that applied, if any
    pub boost: Option<&'static str>,
}

pub struct FactorSelector {
    floor: f64,
}

impl FactorSelector {
    pub fn new() -> Self {
        Self {
            floor: SIGNIFICANCE_FLOOR,
        }
    }

    pub fn with_floor(mut self, floor: f64) -> Self {
        self.floor = floor;
        self
    }

    /// Highest boosted candidate, or `None` when there are no contributions.
    pub fn select(
        &self,
        contributions: &[FeatureContribution],
        record: &DerivedRecord,
    ) -> Option<SelectedFactor> {
        let significant: Vec<&FeatureContribution> = contributions
            .iter()
            .filter(|c| c.contribution > self.floor)
            .collect();
        let pool: Vec<&FeatureContribution> = if significant.is_empty() {
            contributions.iter().collect()
        } else {
            significant
        };

        let mut scored: Vec<SelectedFactor> = pool
            .into_iter()
            .map(|c| {
                let rule = BOOST_RULES.iter().find(|rule| (rule.applies)(c, record));
                SelectedFactor {
                    contribution: c.clone(),
                    score: c.contribution * rule.map_or(1.0, |r| r.multiplier),
                    boost: rule.map(|r| r.name),
                }
            })
            .collect();
        sort_descending(&mut scored, |s| s.score);

        let selected = scored.into_iter().next()?;
        debug!(
            "Selected factor {} (contribution {:.4}, score {:.4}, boost {:?})",
            selected.contribution.feature,
            selected.contribution.contribution,
            selected.score,
            selected.boost
        );
        Some(selected)
    }
}

impl Default for FactorSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FieldValue, NormalizedRecord};
    use std::collections::BTreeMap;

    fn contribution(feature: &str, contribution: f64, scaled: f64, original: f64) -> FeatureContribution {
        FeatureContribution {
            feature: feature.to_string(),
            contribution,
            scaled,
            original,
            importance: contribution / scaled.abs().max(1e-9),
        }
    }

    fn record(derived: &[(&str, &str)]) -> DerivedRecord {
        let derived: BTreeMap<String, FieldValue> = derived
            .iter()
            .map(|(k, v)| (k.to_string(), FieldValue::Text(v.to_string())))
            .collect();
        DerivedRecord {
            base: NormalizedRecord::default(),
            derived,
        }
    }

    #[test]
    fn test_tickets_win_when_boosted_score_stays_higher() {
        // 0.70 * 1.5 = 1.05 stays below 0.80 * 1.4 = 1.12
        let contributions = vec![
            contribution("support_tickets", 0.80, 2.5, 7.0),
            contribution("has_complaint", 0.70, 1.0, 1.0),
        ];
        let selected = FactorSelector::new().select(&contributions, &record(&[])).unwrap();
        assert_eq!(selected.contribution.feature, "support_tickets");
        assert_eq!(selected.boost, Some("support_load"));
    }

    #[test]
    fn test_complaint_beats_higher_raw_ticket_contribution() {
        // 0.76 * 1.5 = 1.14 overtakes 0.80 * 1.4 = 1.12
        let contributions = vec![
            contribution("support_tickets", 0.80, 2.5, 7.0),
            contribution("has_complaint", 0.76, 1.0, 1.0),
        ];
        let selected = FactorSelector::new().select(&contributions, &record(&[])).unwrap();
        assert_eq!(selected.contribution.feature, "has_complaint");
        assert_eq!(selected.boost, Some("complaint"));
    }

    #[test]
    fn test_boost_overrides_unactionable_geography() {
        let contributions = vec![
            contribution("population_density", 0.9, 2.4, 41_000.0),
            contribution("complaint_type_Billing", 0.65, 1.0, 1.0),
        ];
        let selected = FactorSelector::new().select(&contributions, &record(&[])).unwrap();
        assert_eq!(selected.contribution.feature, "complaint_type_Billing");
        assert!((selected.score - 0.975).abs() < 1e-12);
    }

    #[test]
    fn test_first_matching_rule_only() {
        let c = contribution("csat_score", 0.5, -1.8, 2.1);
        let rec = record(&[("csat_category", "Dissatisfied")]);
        let matched: Vec<&str> = BOOST_RULES
            .iter()
            .filter(|r| (r.applies)(&c, &rec))
            .map(|r| r.name)
            .collect();
        assert_eq!(matched, vec!["satisfaction"]);
        let selected = FactorSelector::new().select(&[c], &rec).unwrap();
        assert!((selected.score - 0.65).abs() < 1e-12);
    }

    #[test]
    fn test_inactive_indicator_is_not_boosted() {
        let c = contribution("has_complaint", 0.4, 0.0, 0.0);
        assert!(!complaint_active(&c, &record(&[])));
        let c = contribution("high_tickets", 0.4, 0.0, 0.0);
        assert!(!support_load_high(&c, &record(&[])));
    }

    #[test]
    fn test_ticket_count_boost_needs_scaled_above_one() {
        assert!(support_load_high(&contribution("support_tickets", 0.3, 1.2, 5.0), &record(&[])));
        assert!(!support_load_high(&contribution("support_tickets", 0.3, 0.8, 3.0), &record(&[])));
    }

    #[test]
    fn test_nps_detractor_from_category() {
        let c = contribution("nps_score", 0.3, -0.6, 40.0);
        assert!(detractor(&c, &record(&[("nps_category", "Detractor")])));
        assert!(!detractor(&c, &record(&[("nps_category", "Passive")])));
    }

    #[test]
    fn test_below_floor_never_chosen_when_significant_exists() {
        let contributions = vec![
            contribution("has_complaint", 0.0009, 1.0, 1.0),
            contribution("tenure", 0.002, -1.1, 6.0),
        ];
        let selected = FactorSelector::new().select(&contributions, &record(&[])).unwrap();
        assert_eq!(selected.contribution.feature, "tenure");
    }

    #[test]
    fn test_empty_contributions() {
        assert!(FactorSelector::new().select(&[], &record(&[])).is_none());
    }
}
