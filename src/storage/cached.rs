use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::models::{RedirectRule, RuleDraft, RulePriority, RuleUpdate, ShortLink};
use crate::storage::{RuleStore, RuleStoreResult};

/// Read-caching wrapper for the redirect hot path.
///
/// Caches link lookups by short code and enabled-rule snapshots by link
/// id with a short TTL; rule writes invalidate the affected snapshot. A
/// rule edited concurrently with an in-flight evaluation may not be
/// visible to it, which is acceptable for a routing decision.
pub struct CachedStore {
    inner: Arc<dyn RuleStore>,
    link_cache: Cache<String, Option<ShortLink>>,
    rule_cache: Cache<String, Arc<Vec<RedirectRule>>>,
}

impl CachedStore {
    pub fn new(inner: Arc<dyn RuleStore>, max_entries: u64, ttl_secs: u64) -> Self {
        let link_cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();
        let rule_cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self {
            inner,
            link_cache,
            rule_cache,
        }
    }

    async fn invalidate_rules(&self, link_id: &str) {
        self.rule_cache.invalidate(link_id).await;
    }

    /// Rule writes addressed by id need the owning link to know which
    /// snapshot to drop.
    async fn invalidate_rules_by_rule_id(&self, id: Uuid) -> Result<()> {
        if let Some(rule) = self.inner.get_rule(id).await? {
            self.invalidate_rules(&rule.link_id).await;
        }
        Ok(())
    }
}

#[async_trait]
impl RuleStore for CachedStore {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    async fn create_link(
        &self,
        short_code: &str,
        original_url: &str,
    ) -> RuleStoreResult<ShortLink> {
        let link = self.inner.create_link(short_code, original_url).await?;
        self.link_cache
            .insert(short_code.to_string(), Some(link.clone()))
            .await;
        Ok(link)
    }

    async fn get_link(&self, short_code: &str) -> Result<Option<ShortLink>> {
        if let Some(cached) = self.link_cache.get(short_code).await {
            return Ok(cached);
        }

        let link = self.inner.get_link(short_code).await?;
        self.link_cache
            .insert(short_code.to_string(), link.clone())
            .await;
        Ok(link)
    }

    async fn get_link_by_id(&self, link_id: &str) -> Result<Option<ShortLink>> {
        self.inner.get_link_by_id(link_id).await
    }

    async fn deactivate_link(&self, short_code: &str) -> Result<bool> {
        let changed = self.inner.deactivate_link(short_code).await?;
        if changed {
            self.link_cache.invalidate(short_code).await;
        }
        Ok(changed)
    }

    async fn increment_clicks(&self, short_code: &str) -> Result<()> {
        self.inner.increment_clicks(short_code).await
    }

    async fn create_rule(&self, draft: RuleDraft) -> Result<RedirectRule> {
        let link_id = draft.link_id.clone();
        let rule = self.inner.create_rule(draft).await?;
        self.invalidate_rules(&link_id).await;
        Ok(rule)
    }

    async fn get_rule(&self, id: Uuid) -> Result<Option<RedirectRule>> {
        self.inner.get_rule(id).await
    }

    async fn list_rules(&self, link_id: &str) -> Result<Vec<RedirectRule>> {
        self.inner.list_rules(link_id).await
    }

    async fn list_enabled_rules(&self, link_id: &str) -> Result<Vec<RedirectRule>> {
        if let Some(cached) = self.rule_cache.get(link_id).await {
            return Ok(cached.as_ref().clone());
        }

        let rules = self.inner.list_enabled_rules(link_id).await?;
        self.rule_cache
            .insert(link_id.to_string(), Arc::new(rules.clone()))
            .await;
        Ok(rules)
    }

    async fn update_rule(&self, id: Uuid, update: RuleUpdate) -> Result<Option<RedirectRule>> {
        let updated = self.inner.update_rule(id, update).await?;
        if let Some(rule) = &updated {
            self.invalidate_rules(&rule.link_id).await;
        }
        Ok(updated)
    }

    async fn delete_rule(&self, id: Uuid) -> Result<bool> {
        // Look the rule up first; after deletion the owning link is gone.
        self.invalidate_rules_by_rule_id(id).await?;
        self.inner.delete_rule(id).await
    }

    async fn set_rule_enabled(&self, id: Uuid, enabled: bool) -> Result<bool> {
        let changed = self.inner.set_rule_enabled(id, enabled).await?;
        if changed {
            self.invalidate_rules_by_rule_id(id).await?;
        }
        Ok(changed)
    }

    async fn reorder_rules(&self, link_id: &str, ordering: &[RulePriority]) -> Result<()> {
        self.inner.reorder_rules(link_id, ordering).await?;
        self.invalidate_rules(link_id).await;
        Ok(())
    }

    async fn duplicate_rules(&self, source_link_id: &str, target_link_id: &str) -> Result<u64> {
        let copied = self
            .inner
            .duplicate_rules(source_link_id, target_link_id)
            .await?;
        self.invalidate_rules(target_link_id).await;
        Ok(copied)
    }

    async fn record_match(&self, id: Uuid) -> Result<()> {
        // Counters never influence matching, so the snapshot stays cached.
        self.inner.record_match(id).await
    }
}
