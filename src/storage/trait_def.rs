use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{RedirectRule, RuleDraft, RulePriority, RuleUpdate, ShortLink};

#[derive(Debug, Error)]
pub enum RuleStoreError {
    #[error("short code already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type RuleStoreResult<T> = Result<T, RuleStoreError>;

/// Persistence boundary for links and their conditional redirect rules.
///
/// Rule listings come back in evaluation order (priority descending,
/// creation time ascending) so callers can hand them straight to the
/// evaluator.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Initialize the storage (create tables, etc.)
    async fn init(&self) -> Result<()>;

    async fn create_link(&self, short_code: &str, original_url: &str)
        -> RuleStoreResult<ShortLink>;

    async fn get_link(&self, short_code: &str) -> Result<Option<ShortLink>>;

    async fn get_link_by_id(&self, link_id: &str) -> Result<Option<ShortLink>>;

    /// Soft-delete: the short code keeps resolving but answers 410.
    async fn deactivate_link(&self, short_code: &str) -> Result<bool>;

    async fn increment_clicks(&self, short_code: &str) -> Result<()>;

    async fn create_rule(&self, draft: RuleDraft) -> Result<RedirectRule>;

    async fn get_rule(&self, id: Uuid) -> Result<Option<RedirectRule>>;

    /// All rules of a link, enabled or not, in evaluation order.
    async fn list_rules(&self, link_id: &str) -> Result<Vec<RedirectRule>>;

    /// The snapshot the evaluator consumes: enabled rules only, ordered.
    async fn list_enabled_rules(&self, link_id: &str) -> Result<Vec<RedirectRule>>;

    /// Returns the updated rule, or `None` when the id is unknown.
    async fn update_rule(&self, id: Uuid, update: RuleUpdate) -> Result<Option<RedirectRule>>;

    async fn delete_rule(&self, id: Uuid) -> Result<bool>;

    async fn set_rule_enabled(&self, id: Uuid, enabled: bool) -> Result<bool>;

    /// Applies an explicit priority to each listed rule of the link, in
    /// one transaction.
    async fn reorder_rules(&self, link_id: &str, ordering: &[RulePriority]) -> Result<()>;

    /// Copies every rule from one link to another with fresh ids and
    /// zeroed match counters. Returns the number of rules copied.
    async fn duplicate_rules(&self, source_link_id: &str, target_link_id: &str) -> Result<u64>;

    /// Atomic counter bump (`match_count = match_count + 1`), so two
    /// concurrent matches on the same rule are never lost to a race.
    async fn record_match(&self, id: Uuid) -> Result<()>;
}
