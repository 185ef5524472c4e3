use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::engine::MatchOperator;

/// The condition families a rule can declare. The declared set is
/// authoritative: a family absent from `rule_types` is never evaluated,
/// even if a condition value happens to be present for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionFamily {
    Geo,
    Device,
    Time,
    Language,
    Referrer,
    QueryParam,
}

impl ConditionFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Geo => "geo",
            Self::Device => "device",
            Self::Time => "time",
            Self::Language => "language",
            Self::Referrer => "referrer",
            Self::QueryParam => "query_param",
        }
    }
}

impl fmt::Display for ConditionFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geographic targeting. Empty lists impose no constraint; exclusions
/// take precedence over inclusions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeoCondition {
    pub countries: Vec<String>,
    pub regions: Vec<String>,
    pub cities: Vec<String>,
    pub continents: Vec<String>,
    pub exclude_countries: Vec<String>,
    pub exclude_regions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceCondition {
    pub device_types: Vec<String>,
    pub operating_systems: Vec<String>,
    pub browsers: Vec<String>,
    /// Dotted numeric version strings, e.g. "9.0". Bounds only constrain
    /// visitors whose OS version is known and parsable.
    pub min_os_version: Option<String>,
    pub max_os_version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeCondition {
    /// Calendar dates as YYYY-MM-DD, inclusive on both ends.
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Daily window as HH:mm. start > end means the window wraps past
    /// midnight (e.g. 22:00-06:00).
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// 0=Sunday .. 6=Saturday. Empty imposes no constraint.
    pub days_of_week: Vec<u8>,
    /// IANA timezone name; UTC when absent or unrecognized.
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LanguageCondition {
    pub languages: Vec<String>,
    pub exclude_languages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReferrerCondition {
    /// Domain substrings; the visitor's referrer domain must contain one.
    pub domains: Vec<String>,
    pub exclude_domains: Vec<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryParamCondition {
    pub param: String,
    #[serde(rename = "operator")]
    pub op: MatchOperator,
    pub value: String,
}

/// At most one condition value per family. `None` means the family is
/// unconstrained if the rule declares it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleConditions {
    pub geo: Option<GeoCondition>,
    pub device: Option<DeviceCondition>,
    pub time: Option<TimeCondition>,
    pub language: Option<LanguageCondition>,
    pub referrer: Option<ReferrerCondition>,
    pub query_params: Option<Vec<QueryParamCondition>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectRule {
    pub id: Uuid,
    pub link_id: String,
    pub name: String,
    pub description: Option<String>,
    pub target_url: String,
    pub rule_types: Vec<ConditionFamily>,
    pub conditions: RuleConditions,
    /// Higher priority evaluates first; ties break by earliest creation.
    pub priority: i64,
    pub enabled: bool,
    pub match_count: i64,
    pub last_matched_at: Option<i64>,
    pub created_at: i64,
}

/// Fields needed to persist a new rule; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct RuleDraft {
    pub link_id: String,
    pub name: String,
    pub description: Option<String>,
    pub target_url: String,
    pub rule_types: Vec<ConditionFamily>,
    pub conditions: RuleConditions,
    pub priority: i64,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RuleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub target_url: Option<String>,
    pub rule_types: Option<Vec<ConditionFamily>>,
    pub conditions: Option<RuleConditions>,
    pub priority: Option<i64>,
    pub enabled: Option<bool>,
}

/// One entry of a bulk reorder: an explicit priority per rule id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulePriority {
    pub id: Uuid,
    pub priority: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuleRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub target_url: String,
    pub rule_types: Vec<ConditionFamily>,
    #[serde(default)]
    pub conditions: RuleConditions,
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateRuleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub target_url: Option<String>,
    pub rule_types: Option<Vec<ConditionFamily>>,
    pub conditions: Option<RuleConditions>,
    pub priority: Option<i64>,
    pub enabled: Option<bool>,
}
