//! Explanation Generator
//!
//! Turns the selected factor into a short sentence. Rules are tried top to
//! bottom and the first whose predicate matches renders the text; anything
//! unmatched gets a generic "<name>: <value>" line.

use crate::fields;
use crate::record::DerivedRecord;
use crate::registry::{FieldKind, SchemaRegistry};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How far a value sits from the training population, from its scaled value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    VeryLow,
    Low,
    Normal,
    High,
    VeryHigh,
}

impl Intensity {
    pub fn from_scaled(scaled: f64) -> Self {
        let magnitude = scaled.abs();
        if magnitude > 2.0 {
            if scaled > 0.0 {
                Intensity::VeryHigh
            } else {
                Intensity::VeryLow
            }
        } else if magnitude > 1.0 {
            if scaled > 0.0 {
                Intensity::High
            } else {
                Intensity::Low
            }
        } else {
            Intensity::Normal
        }
    }

    pub fn is_low(self) -> bool {
        matches!(self, Intensity::Low | Intensity::VeryLow)
    }

    pub fn is_high(self) -> bool {
        matches!(self, Intensity::High | Intensity::VeryHigh)
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Intensity::VeryLow => "very low",
            Intensity::Low => "low",
            Intensity::Normal => "normal",
            Intensity::High => "high",
            Intensity::VeryHigh => "very high",
        };
        f.write_str(label)
    }
}

/// Semantic bucket of an explanation, used to pick a retention action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Satisfaction,
    SupportLoad,
    Complaint,
    Price,
    ContractType,
    Tenure,
    Engagement,
    Geography,
    Unclassified,
}

impl Category {
    /// Best-effort category for free text, checked in priority order.
    pub fn infer(text: &str) -> Self {
        let text = text.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

        if has(&["nps", "csat", "satisfaction"]) {
            Category::Satisfaction
        } else if has(&["ticket", "escalation", "resolution"]) {
            Category::SupportLoad
        } else if has(&["complaint"]) {
            Category::Complaint
        } else if has(&["price", "charge"]) {
            Category::Price
        } else if has(&["contract"]) {
            Category::ContractType
        } else if has(&["tenure"]) {
            Category::Tenure
        } else if has(&["engagement", "premium"]) {
            Category::Engagement
        } else if has(&["density", "income", "borough", "segment"]) {
            Category::Geography
        } else {
            Category::Unclassified
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Category::Satisfaction => "satisfaction",
            Category::SupportLoad => "support load",
            Category::Complaint => "complaint",
            Category::Price => "price",
            Category::ContractType => "contract type",
            Category::Tenure => "tenure",
            Category::Engagement => "engagement",
            Category::Geography => "geography",
            Category::Unclassified => "unclassified",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub text: String,
    pub category: Category,
    /// Column the explanation is about
    pub feature: String,
    /// Magnitude label; absent for one-hot and on/off columns
    pub intensity: Option<Intensity>,
    /// Active category for one-hot columns
    pub level: Option<String>,
    /// State of an on/off column
    pub indicator: Option<bool>,
}

/// What a rule sees about the selected factor.
pub struct Subject<'r> {
    pub feature: &'r str,
    /// Owning field for one-hot columns, otherwise the column itself
    pub field: &'r str,
    pub level: Option<&'r str>,
    pub scaled: f64,
    pub original: f64,
    pub intensity: Option<Intensity>,
    pub indicator: Option<bool>,
    pub record: &'r DerivedRecord,
}

impl Subject<'_> {
    /// The record's value for `field`, or the encoded value when it is this column.
    fn num(&self, field: &str) -> f64 {
        self.record
            .number(field)
            .unwrap_or(if field == self.feature { self.original } else { 0.0 })
    }

    fn label(&self) -> Intensity {
        self.intensity.unwrap_or(Intensity::Normal)
    }

    fn on(&self) -> bool {
        self.indicator.unwrap_or(self.original > 0.0)
    }

    fn level(&self) -> &str {
        self.level.unwrap_or("")
    }
}

pub struct ExplanationRule {
    pub category: Category,
    pub matches: fn(&Subject) -> bool,
    pub render: fn(&Subject) -> String,
}

/// Ordered rule table; first match wins.
pub const EXPLANATION_RULES: &[ExplanationRule] = &[
    // Satisfaction
    ExplanationRule {
        category: Category::Satisfaction,
        matches: |s| s.feature == fields::NPS_SCORE,
        render: |s| format!("NPS {}: {:.0}/100", s.label(), s.num(fields::NPS_SCORE)),
    },
    ExplanationRule {
        category: Category::Satisfaction,
        matches: |s| s.feature == fields::CSAT_SCORE,
        render: |s| format!("CSAT {}: {:.1}/5.0", s.label(), s.num(fields::CSAT_SCORE)),
    },
    ExplanationRule {
        category: Category::Satisfaction,
        matches: |s| s.level.is_some() && s.field == fields::NPS_CATEGORY,
        render: |s| format!("NPS: {} ({:.0}/100)", s.level(), s.num(fields::NPS_SCORE)),
    },
    ExplanationRule {
        category: Category::Satisfaction,
        matches: |s| s.level.is_some() && s.field == fields::CSAT_CATEGORY,
        render: |s| format!("CSAT: {} ({:.1}/5.0)", s.level(), s.num(fields::CSAT_SCORE)),
    },
    // Support load
    ExplanationRule {
        category: Category::SupportLoad,
        matches: |s| s.feature == fields::SUPPORT_TICKETS,
        render: |s| format!("Tickets {}: {:.0} reported", s.label(), s.num(fields::SUPPORT_TICKETS)),
    },
    ExplanationRule {
        category: Category::SupportLoad,
        matches: |s| s.feature == fields::HIGH_TICKETS || s.feature == fields::CRITICAL_TICKETS,
        render: |s| {
            let tickets = s.num(fields::SUPPORT_TICKETS);
            match (s.on(), s.feature == fields::CRITICAL_TICKETS) {
                (true, true) => format!("Critical ticket volume: {:.0} tickets", tickets),
                (true, false) => format!("High ticket volume: {:.0} tickets", tickets),
                (false, _) => format!("Normal ticket volume: {:.0} tickets", tickets),
            }
        },
    },
    ExplanationRule {
        category: Category::SupportLoad,
        matches: |s| s.feature == fields::ESCALATIONS,
        render: |s| format!("Escalations {}: {:.0}", s.label(), s.num(fields::ESCALATIONS)),
    },
    ExplanationRule {
        category: Category::SupportLoad,
        matches: |s| s.feature == fields::RESOLUTION_TIME,
        render: |s| format!("Resolution time {}: {:.1}h", s.label(), s.num(fields::RESOLUTION_TIME)),
    },
    // Complaints
    ExplanationRule {
        category: Category::Complaint,
        matches: |s| s.feature == fields::HAS_COMPLAINT,
        render: |s| {
            if s.on() {
                let kind = s.record.text(fields::COMPLAINT_TYPE).unwrap_or("unspecified");
                format!("Active complaint: {}", kind)
            } else {
                "No complaints".to_string()
            }
        },
    },
    ExplanationRule {
        category: Category::Complaint,
        matches: |s| s.level.is_some() && s.field == fields::COMPLAINT_TYPE,
        render: |s| format!("Complaint: {}", s.level()),
    },
    // Price
    ExplanationRule {
        category: Category::Price,
        matches: |s| s.feature == fields::MONTHLY_CHARGE,
        render: |s| format!("Price {}: ${:.2}/month", s.label(), s.num(fields::MONTHLY_CHARGE)),
    },
    ExplanationRule {
        category: Category::Price,
        matches: |s| s.feature == fields::TOTAL_CHARGES,
        render: |s| format!("Total charges {}: ${:.2}", s.label(), s.num(fields::TOTAL_CHARGES)),
    },
    ExplanationRule {
        category: Category::Price,
        matches: |s| s.feature == fields::PRICE_INCOME_RATIO,
        render: |s| {
            format!(
                "Price impact {}: {:.1}% of income (${:.0}/month against ${:.0}/year)",
                s.label(),
                s.num(fields::PRICE_INCOME_RATIO) * 100.0,
                s.num(fields::MONTHLY_CHARGE),
                s.num(fields::MEDIAN_INCOME)
            )
        },
    },
    // Contract
    ExplanationRule {
        category: Category::ContractType,
        matches: |s| s.level.is_some() && s.field == fields::CONTRACT,
        render: |s| format!("Contract: {}", s.level()),
    },
    // Tenure
    ExplanationRule {
        category: Category::Tenure,
        matches: |s| s.feature == fields::TENURE,
        render: |s| format!("Tenure {}: {:.0} months", s.label(), s.num(fields::TENURE)),
    },
    ExplanationRule {
        category: Category::Tenure,
        matches: |s| s.level.is_some() && s.field == fields::TENURE_GROUP,
        render: |s| format!("Tenure group: {}", s.level()),
    },
    // Engagement
    ExplanationRule {
        category: Category::Engagement,
        matches: |s| s.feature == fields::EMAIL_OPEN_RATE,
        render: |s| {
            format!(
                "Engagement {}: {:.0}% email open rate",
                s.label(),
                s.num(fields::EMAIL_OPEN_RATE) * 100.0
            )
        },
    },
    ExplanationRule {
        category: Category::Engagement,
        matches: |s| s.feature == fields::PREMIUM_SERVICE_COUNT,
        render: |s| {
            format!(
                "Premium service engagement {}: {:.0} of {} services",
                s.label(),
                s.num(fields::PREMIUM_SERVICE_COUNT),
                fields::PREMIUM_SERVICES.len()
            )
        },
    },
    // Geography and segment
    ExplanationRule {
        category: Category::Geography,
        matches: |s| s.feature == fields::POPULATION_DENSITY,
        render: |s| format!("Population density {}: {:.0}/km²", s.label(), s.num(fields::POPULATION_DENSITY)),
    },
    ExplanationRule {
        category: Category::Geography,
        matches: |s| s.feature == fields::HIGH_DENSITY_AREA,
        render: |s| {
            if s.on() {
                "High-density area".to_string()
            } else {
                "Low-density area".to_string()
            }
        },
    },
    ExplanationRule {
        category: Category::Geography,
        matches: |s| s.feature == fields::MEDIAN_INCOME,
        render: |s| format!("Area median income {}: ${:.0}", s.label(), s.num(fields::MEDIAN_INCOME)),
    },
    ExplanationRule {
        category: Category::Geography,
        matches: |s| s.feature == fields::BOROUGH_RISK,
        render: |s| format!("Borough risk {}: {:.2}", s.label(), s.num(fields::BOROUGH_RISK)),
    },
    ExplanationRule {
        category: Category::Geography,
        matches: |s| {
            s.level.is_some() && (s.field == fields::INCOME_BRACKET || s.field == fields::CUSTOMER_SEGMENT)
        },
        render: |s| format!("{}: {}", humanize(s.field), s.level()),
    },
];

pub struct ExplanationGenerator<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> ExplanationGenerator<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    pub fn explain(&self, feature: &str, scaled: f64, original: f64, record: &DerivedRecord) -> Explanation {
        let one_hot = self.split_one_hot(feature);
        let indicator = self.is_indicator(feature).then(|| original > 0.0);
        let intensity = match (one_hot, indicator) {
            (None, None) => Some(Intensity::from_scaled(scaled)),
            _ => None,
        };

        let subject = Subject {
            feature,
            field: one_hot.map_or(feature, |(field, _)| field),
            level: one_hot.map(|(_, level)| level),
            scaled,
            original,
            intensity,
            indicator,
            record,
        };

        let (text, category) = match EXPLANATION_RULES.iter().find(|rule| (rule.matches)(&subject)) {
            Some(rule) => ((rule.render)(&subject), rule.category),
            None => (generic(&subject), Category::Unclassified),
        };

        Explanation {
            text,
            category,
            feature: feature.to_string(),
            intensity,
            level: subject.level.map(str::to_string),
            indicator,
        }
    }

    /// `contract_One year` -> `("contract", "One year")`, using the longest
    /// categorical field name that prefixes the column.
    fn split_one_hot<'f>(&self, feature: &'f str) -> Option<(&'f str, &'f str)> {
        self.registry
            .categorical_fields()
            .filter_map(|spec| {
                let rest = feature.strip_prefix(spec.name.as_str())?.strip_prefix('_')?;
                Some((&feature[..spec.name.len()], rest))
            })
            .max_by_key(|(field, _)| field.len())
    }

    fn is_indicator(&self, feature: &str) -> bool {
        match self.registry.field(feature).map(|f| &f.kind) {
            Some(FieldKind::Binary { .. }) => true,
            _ => fields::INDICATOR_FLAGS.contains(&feature),
        }
    }
}

fn generic(s: &Subject) -> String {
    match s.level {
        Some(level) => format!("{}: {}", humanize(s.field), level),
        None => format!("{}: {:.2}", humanize(s.feature), s.original),
    }
}

/// `monthly_charge` -> `Monthly charge`
pub fn humanize(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
