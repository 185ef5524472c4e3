mod link;
mod rule;

pub use link::{CreateLinkRequest, ShortLink};
pub use rule::{
    ConditionFamily, CreateRuleRequest, DeviceCondition, GeoCondition, LanguageCondition,
    QueryParamCondition, RedirectRule, ReferrerCondition, RuleConditions, RuleDraft, RulePriority,
    RuleUpdate, TimeCondition, UpdateRuleRequest,
};
