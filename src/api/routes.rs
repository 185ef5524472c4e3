use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::engine::RuleEngine;
use crate::storage::RuleStore;

use super::handlers::{
    create_link, create_rule, deactivate_link, delete_rule, duplicate_rules, evaluate_rules,
    get_link, health_check, list_rules, reorder_rules, set_rule_enabled, update_rule, AppState,
};

pub fn create_api_router(store: Arc<dyn RuleStore>, engine: RuleEngine) -> Router {
    let state = Arc::new(AppState { store, engine });

    Router::new()
        .route("/health", get(health_check))
        .route("/links", post(create_link))
        .route("/links/{code}", get(get_link))
        .route("/links/{code}", delete(deactivate_link))
        .route("/links/{link_id}/rules", get(list_rules))
        .route("/links/{link_id}/rules", post(create_rule))
        .route("/links/{link_id}/rules/reorder", post(reorder_rules))
        .route(
            "/links/{link_id}/rules/duplicate/{target_link_id}",
            post(duplicate_rules),
        )
        .route("/links/{link_id}/rules/evaluate", post(evaluate_rules))
        .route("/rules/{id}", put(update_rule))
        .route("/rules/{id}", delete(delete_rule))
        .route("/rules/{id}/enabled", put(set_rule_enabled))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
