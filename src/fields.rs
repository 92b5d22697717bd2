//! Canonical field names.
//!
//! Raw records, the registry's `fields.json` and the model's column list all
//! refer to customer attributes by these names. One-hot columns follow the
//! `<field>_<level>` convention, e.g. `contract_Monthly`.

pub const CUSTOMER_ID: &str = "customer_id";

// Numeric
pub const TENURE: &str = "tenure";
pub const MONTHLY_CHARGE: &str = "monthly_charge";
pub const TOTAL_CHARGES: &str = "total_charges";
pub const MEDIAN_INCOME: &str = "median_income";
pub const POPULATION_DENSITY: &str = "population_density";
pub const SUPPORT_TICKETS: &str = "support_tickets";
pub const ESCALATIONS: &str = "escalations";
pub const RESOLUTION_TIME: &str = "resolution_time";
pub const NPS_SCORE: &str = "nps_score";
pub const CSAT_SCORE: &str = "csat_score";
pub const EMAIL_OPEN_RATE: &str = "email_open_rate";
pub const BOROUGH_RISK: &str = "borough_risk";

// Binary
pub const SENIOR_CITIZEN: &str = "senior_citizen";

// Categorical
pub const GENDER: &str = "gender";
pub const PARTNER: &str = "partner";
pub const DEPENDENTS: &str = "dependents";
pub const PHONE_SERVICE: &str = "phone_service";
pub const MULTIPLE_LINES: &str = "multiple_lines";
pub const INTERNET_SERVICE: &str = "internet_service";
pub const ONLINE_SECURITY: &str = "online_security";
pub const ONLINE_BACKUP: &str = "online_backup";
pub const DEVICE_PROTECTION: &str = "device_protection";
pub const TECH_SUPPORT: &str = "tech_support";
pub const STREAMING_TV: &str = "streaming_tv";
pub const STREAMING_MOVIES: &str = "streaming_movies";
pub const CONTRACT: &str = "contract";
pub const PAPERLESS_BILLING: &str = "paperless_billing";
pub const PAYMENT_METHOD: &str = "payment_method";
pub const CUSTOMER_SEGMENT: &str = "customer_segment";
pub const COMPLAINT_TYPE: &str = "complaint_type";

// Derived
pub const TENURE_GROUP: &str = "tenure_group";
pub const INCOME_BRACKET: &str = "income_bracket";
pub const NPS_CATEGORY: &str = "nps_category";
pub const CSAT_CATEGORY: &str = "csat_category";
pub const HAS_COMPLAINT: &str = "has_complaint";
pub const HIGH_TICKETS: &str = "high_tickets";
pub const CRITICAL_TICKETS: &str = "critical_tickets";
pub const HIGH_DENSITY_AREA: &str = "high_density_area";
pub const PRICE_INCOME_RATIO: &str = "price_income_ratio";
pub const PREMIUM_SERVICE_COUNT: &str = "premium_service_count";

/// The six add-on services counted by `premium_service_count`.
pub const PREMIUM_SERVICES: [&str; 6] = [
    ONLINE_SECURITY,
    ONLINE_BACKUP,
    DEVICE_PROTECTION,
    TECH_SUPPORT,
    STREAMING_TV,
    STREAMING_MOVIES,
];

/// Derived 0/1 columns. Explained as on/off rather than by magnitude.
pub const INDICATOR_FLAGS: [&str; 4] = [HAS_COMPLAINT, HIGH_TICKETS, CRITICAL_TICKETS, HIGH_DENSITY_AREA];

pub const YES: &str = "Yes";
pub const NO_COMPLAINT: &str = "None";

/// Name of the one-hot column for `field` at `level`.
pub fn one_hot(field: &str, level: &str) -> String {
    format!("{}_{}", field, level)
}
