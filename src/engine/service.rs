use anyhow::Result;
use std::sync::Arc;

use super::context::VisitorContext;
use super::evaluator::{self, EvaluationResult};
use crate::storage::RuleStore;

/// Ties the pure evaluator to a rule snapshot source and the match
/// statistics side effect.
#[derive(Clone)]
pub struct RuleEngine {
    store: Arc<dyn RuleStore>,
}

impl RuleEngine {
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self { store }
    }

    /// Fetches the enabled rule snapshot for a link and evaluates it.
    ///
    /// A snapshot fetch failure is returned as an error, distinct from a
    /// clean "no rule matched" result. When `record_stats` is set and a
    /// rule matched, its counters are bumped on a detached task; a failed
    /// write is logged and never affects the returned decision.
    pub async fn evaluate_link(
        &self,
        link_id: &str,
        ctx: &VisitorContext,
        record_stats: bool,
    ) -> Result<EvaluationResult> {
        let rules = self.store.list_enabled_rules(link_id).await?;
        let result = evaluator::evaluate(&rules, ctx);

        if record_stats {
            if let Some(rule_id) = result.rule_id {
                let store = Arc::clone(&self.store);
                tokio::spawn(async move {
                    if let Err(err) = store.record_match(rule_id).await {
                        tracing::warn!(rule_id = %rule_id, error = %err, "failed to record rule match");
                    }
                });
            }
        }

        Ok(result)
    }
}
