use axum::{routing::get, Router};
use std::sync::Arc;

use crate::engine::RuleEngine;
use crate::storage::RuleStore;

use super::handlers::{health_check, redirect_url, RedirectState};

pub fn create_redirect_router(store: Arc<dyn RuleStore>, engine: RuleEngine) -> Router {
    let state = Arc::new(RedirectState { store, engine });

    Router::new()
        .route("/", get(health_check))
        .route("/{code}", get(redirect_url))
        .with_state(state)
}
