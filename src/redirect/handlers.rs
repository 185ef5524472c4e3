use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::engine::RuleEngine;
use crate::storage::RuleStore;
use crate::visitor::build_visitor_context;

pub struct RedirectState {
    pub store: Arc<dyn RuleStore>,
    pub engine: RuleEngine,
}

/// Resolve a short code to its destination and redirect.
///
/// Conditional rules are consulted first; when none matches (or rule
/// evaluation fails outright) the visitor goes to the link's original
/// URL. Responses use 302 because the destination varies per visitor.
pub async fn redirect_url(
    State(state): State<Arc<RedirectState>>,
    Path(code): Path<String>,
    Query(query_params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let handler_start = Instant::now();

    let link = match state.store.get_link(&code).await {
        Ok(Some(link)) => link,
        Ok(None) => return (StatusCode::NOT_FOUND, "URL not found").into_response(),
        Err(err) => {
            tracing::error!(short_code = %code, error = %err, "link lookup failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
        }
    };

    if !link.is_active {
        return (StatusCode::GONE, "This link has been deactivated").into_response();
    }

    let ctx = build_visitor_context(&headers, query_params);

    let (target_url, rule_matched) = match state.engine.evaluate_link(&link.id, &ctx, true).await {
        Ok(result) if result.matched => (
            result.target_url.unwrap_or_else(|| link.original_url.clone()),
            true,
        ),
        Ok(_) => (link.original_url.clone(), false),
        Err(err) => {
            // A failed snapshot fetch must not break the redirect.
            tracing::warn!(short_code = %code, error = %err, "rule evaluation failed, using default target");
            (link.original_url.clone(), false)
        }
    };

    if let Err(err) = state.store.increment_clicks(&code).await {
        tracing::warn!(short_code = %code, error = %err, "failed to increment click count");
    }

    let mut response_headers = HeaderMap::new();
    match target_url.parse() {
        Ok(location) => {
            response_headers.insert(header::LOCATION, location);
        }
        Err(err) => {
            tracing::error!(short_code = %code, target_url = %target_url, error = %err, "invalid redirect target");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
        }
    }
    if let Ok(value) = if rule_matched { "true" } else { "false" }.parse() {
        response_headers.insert("x-relink-rule-matched", value);
    }
    if let Ok(value) = handler_start.elapsed().as_millis().to_string().parse() {
        response_headers.insert("x-relink-timing-ms", value);
    }

    (StatusCode::FOUND, response_headers).into_response()
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
