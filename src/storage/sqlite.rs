use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

use crate::engine::order_rules;
use crate::models::{RedirectRule, RuleDraft, RulePriority, RuleUpdate, ShortLink};
use crate::storage::{RuleStore, RuleStoreError, RuleStoreResult};

pub struct SqliteStore {
    pool: Arc<SqlitePool>,
}

impl SqliteStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

fn now_secs() -> Result<i64> {
    Ok(std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_secs() as i64)
}

/// Flat row shape; the tag set and condition bundle live in JSON text
/// columns and are decoded on the way out.
#[derive(FromRow)]
struct RuleRow {
    id: String,
    link_id: String,
    name: String,
    description: Option<String>,
    target_url: String,
    rule_types: String,
    conditions: String,
    priority: i64,
    enabled: bool,
    match_count: i64,
    last_matched_at: Option<i64>,
    created_at: i64,
}

impl RuleRow {
    fn into_rule(self) -> Result<RedirectRule> {
        Ok(RedirectRule {
            id: Uuid::parse_str(&self.id).context("invalid rule id in database")?,
            link_id: self.link_id,
            name: self.name,
            description: self.description,
            target_url: self.target_url,
            rule_types: serde_json::from_str(&self.rule_types)
                .context("invalid rule_types column")?,
            conditions: serde_json::from_str(&self.conditions)
                .context("invalid conditions column")?,
            priority: self.priority,
            enabled: self.enabled,
            match_count: self.match_count,
            last_matched_at: self.last_matched_at,
            created_at: self.created_at,
        })
    }
}

const RULE_COLUMNS: &str = "id, link_id, name, description, target_url, rule_types, conditions, \
     priority, enabled, match_count, last_matched_at, created_at";

#[async_trait]
impl RuleStore for SqliteStore {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id TEXT PRIMARY KEY,
                short_code TEXT NOT NULL UNIQUE,
                original_url TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                clicks INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_short_code ON links(short_code)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS redirect_rules (
                id TEXT PRIMARY KEY,
                link_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                target_url TEXT NOT NULL,
                rule_types TEXT NOT NULL,
                conditions TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 0,
                enabled INTEGER NOT NULL DEFAULT 1,
                match_count INTEGER NOT NULL DEFAULT 0,
                last_matched_at INTEGER,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_rules_link_id ON redirect_rules(link_id)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn create_link(
        &self,
        short_code: &str,
        original_url: &str,
    ) -> RuleStoreResult<ShortLink> {
        let id = Uuid::new_v4().to_string();
        let created_at = now_secs().map_err(RuleStoreError::Other)?;

        let result = sqlx::query(
            r#"
            INSERT INTO links (id, short_code, original_url, created_at, is_active)
            VALUES (?, ?, ?, ?, 1)
            ON CONFLICT(short_code) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(short_code)
        .bind(original_url)
        .bind(created_at)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| RuleStoreError::Other(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(RuleStoreError::Conflict);
        }

        Ok(ShortLink {
            id,
            short_code: short_code.to_string(),
            original_url: original_url.to_string(),
            created_at,
            clicks: 0,
            is_active: true,
        })
    }

    async fn get_link(&self, short_code: &str) -> Result<Option<ShortLink>> {
        let link = sqlx::query_as::<_, ShortLink>(
            "SELECT id, short_code, original_url, created_at, clicks, is_active \
             FROM links WHERE short_code = ?",
        )
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn get_link_by_id(&self, link_id: &str) -> Result<Option<ShortLink>> {
        let link = sqlx::query_as::<_, ShortLink>(
            "SELECT id, short_code, original_url, created_at, clicks, is_active \
             FROM links WHERE id = ?",
        )
        .bind(link_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn deactivate_link(&self, short_code: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE links SET is_active = 0 WHERE short_code = ?")
            .bind(short_code)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_clicks(&self, short_code: &str) -> Result<()> {
        sqlx::query("UPDATE links SET clicks = clicks + 1 WHERE short_code = ?")
            .bind(short_code)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn create_rule(&self, draft: RuleDraft) -> Result<RedirectRule> {
        let rule = RedirectRule {
            id: Uuid::new_v4(),
            link_id: draft.link_id,
            name: draft.name,
            description: draft.description,
            target_url: draft.target_url,
            rule_types: draft.rule_types,
            conditions: draft.conditions,
            priority: draft.priority,
            enabled: draft.enabled,
            match_count: 0,
            last_matched_at: None,
            created_at: now_secs()?,
        };

        sqlx::query(
            r#"
            INSERT INTO redirect_rules
                (id, link_id, name, description, target_url, rule_types, conditions,
                 priority, enabled, match_count, last_matched_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, NULL, ?)
            "#,
        )
        .bind(rule.id.to_string())
        .bind(&rule.link_id)
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(&rule.target_url)
        .bind(serde_json::to_string(&rule.rule_types)?)
        .bind(serde_json::to_string(&rule.conditions)?)
        .bind(rule.priority)
        .bind(rule.enabled)
        .bind(rule.created_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(rule)
    }

    async fn get_rule(&self, id: Uuid) -> Result<Option<RedirectRule>> {
        let row = sqlx::query_as::<_, RuleRow>(&format!(
            "SELECT {RULE_COLUMNS} FROM redirect_rules WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(RuleRow::into_rule).transpose()
    }

    async fn list_rules(&self, link_id: &str) -> Result<Vec<RedirectRule>> {
        let rows = sqlx::query_as::<_, RuleRow>(&format!(
            "SELECT {RULE_COLUMNS} FROM redirect_rules WHERE link_id = ? \
             ORDER BY priority DESC, created_at ASC, rowid ASC"
        ))
        .bind(link_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(RuleRow::into_rule).collect()
    }

    async fn list_enabled_rules(&self, link_id: &str) -> Result<Vec<RedirectRule>> {
        let rows = sqlx::query_as::<_, RuleRow>(&format!(
            "SELECT {RULE_COLUMNS} FROM redirect_rules WHERE link_id = ? AND enabled = 1 \
             ORDER BY priority DESC, created_at ASC, rowid ASC"
        ))
        .bind(link_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(RuleRow::into_rule).collect()
    }

    async fn update_rule(&self, id: Uuid, update: RuleUpdate) -> Result<Option<RedirectRule>> {
        let Some(mut rule) = self.get_rule(id).await? else {
            return Ok(None);
        };

        if let Some(name) = update.name {
            rule.name = name;
        }
        if let Some(description) = update.description {
            rule.description = Some(description);
        }
        if let Some(target_url) = update.target_url {
            rule.target_url = target_url;
        }
        if let Some(rule_types) = update.rule_types {
            rule.rule_types = rule_types;
        }
        if let Some(conditions) = update.conditions {
            rule.conditions = conditions;
        }
        if let Some(priority) = update.priority {
            rule.priority = priority;
        }
        if let Some(enabled) = update.enabled {
            rule.enabled = enabled;
        }

        sqlx::query(
            r#"
            UPDATE redirect_rules
            SET name = ?, description = ?, target_url = ?, rule_types = ?,
                conditions = ?, priority = ?, enabled = ?
            WHERE id = ?
            "#,
        )
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(&rule.target_url)
        .bind(serde_json::to_string(&rule.rule_types)?)
        .bind(serde_json::to_string(&rule.conditions)?)
        .bind(rule.priority)
        .bind(rule.enabled)
        .bind(id.to_string())
        .execute(self.pool.as_ref())
        .await?;

        Ok(Some(rule))
    }

    async fn delete_rule(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM redirect_rules WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_rule_enabled(&self, id: Uuid, enabled: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE redirect_rules SET enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(id.to_string())
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn reorder_rules(&self, link_id: &str, ordering: &[RulePriority]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for entry in ordering {
            sqlx::query("UPDATE redirect_rules SET priority = ? WHERE id = ? AND link_id = ?")
                .bind(entry.priority)
                .bind(entry.id.to_string())
                .bind(link_id)
                .execute(tx.as_mut())
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn duplicate_rules(&self, source_link_id: &str, target_link_id: &str) -> Result<u64> {
        let mut rules = self.list_rules(source_link_id).await?;
        // Copies keep their relative order even across equal priorities.
        order_rules(&mut rules);

        let created_at = now_secs()?;
        let mut tx = self.pool.begin().await?;
        let mut copied = 0u64;

        for (index, rule) in rules.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO redirect_rules
                    (id, link_id, name, description, target_url, rule_types, conditions,
                     priority, enabled, match_count, last_matched_at, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, NULL, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(target_link_id)
            .bind(&rule.name)
            .bind(&rule.description)
            .bind(&rule.target_url)
            .bind(serde_json::to_string(&rule.rule_types)?)
            .bind(serde_json::to_string(&rule.conditions)?)
            .bind(rule.priority)
            .bind(rule.enabled)
            .bind(created_at + index as i64)
            .execute(tx.as_mut())
            .await?;
            copied += 1;
        }

        tx.commit().await?;
        Ok(copied)
    }

    async fn record_match(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE redirect_rules \
             SET match_count = match_count + 1, last_matched_at = ? \
             WHERE id = ?",
        )
        .bind(now_secs()?)
        .bind(id.to_string())
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }
}
