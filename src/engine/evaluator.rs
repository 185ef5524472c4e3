//! Ordered rule-list evaluation.
//!
//! Pure and synchronous: callers fetch an enabled, ordered rule snapshot
//! first; evaluation itself performs no I/O and never mutates the rules.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::context::VisitorContext;
use super::matchers;
use crate::models::{ConditionFamily, RedirectRule};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
    /// The condition families the winning rule declared; informational,
    /// not part of the decision.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_families: Vec<String>,
}

/// Sorts rules into evaluation order: priority descending, ties broken by
/// earliest creation so equal priorities stay reproducible.
pub fn order_rules(rules: &mut [RedirectRule]) {
    rules.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.created_at.cmp(&b.created_at))
    });
}

/// Walks the ordered rule list and returns the first rule whose declared
/// condition families all pass. Rules must already be filtered to
/// `enabled` and sorted (see [`order_rules`]).
pub fn evaluate(rules: &[RedirectRule], ctx: &VisitorContext) -> EvaluationResult {
    for rule in rules {
        if rule_matches(rule, ctx) {
            return EvaluationResult {
                matched: true,
                target_url: Some(rule.target_url.clone()),
                rule_id: Some(rule.id),
                rule_name: Some(rule.name.clone()),
                matched_families: rule
                    .rule_types
                    .iter()
                    .map(|family| family.as_str().to_string())
                    .collect(),
            };
        }
    }
    EvaluationResult::default()
}

/// AND across declared families. A declared family without a condition
/// value is vacuously true.
fn rule_matches(rule: &RedirectRule, ctx: &VisitorContext) -> bool {
    rule.rule_types.iter().all(|family| match family {
        ConditionFamily::Geo => matchers::match_geo(rule.conditions.geo.as_ref(), ctx),
        ConditionFamily::Device => matchers::match_device(rule.conditions.device.as_ref(), ctx),
        ConditionFamily::Time => matchers::match_time(rule.conditions.time.as_ref(), ctx),
        ConditionFamily::Language => {
            matchers::match_language(rule.conditions.language.as_ref(), ctx)
        }
        ConditionFamily::Referrer => {
            matchers::match_referrer(rule.conditions.referrer.as_ref(), ctx)
        }
        ConditionFamily::QueryParam => {
            matchers::match_query_params(rule.conditions.query_params.as_deref(), ctx)
        }
    })
}
