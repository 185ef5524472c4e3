use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::engine::{EvaluationResult, RuleEngine, VisitorContext};
use crate::models::{
    CreateLinkRequest, CreateRuleRequest, RedirectRule, RuleDraft, RulePriority, RuleUpdate,
    ShortLink, UpdateRuleRequest,
};
use crate::storage::{RuleStore, RuleStoreError};

pub struct AppState {
    pub store: Arc<dyn RuleStore>,
    pub engine: RuleEngine,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn internal_error(err: impl std::fmt::Display) -> ApiError {
    tracing::error!(error = %err, "request failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
}

/// Generate a random short code
fn generate_short_code() -> String {
    use rand::{distributions::Alphanumeric, Rng};
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(char::from)
        .collect()
}

pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}

pub async fn create_link(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<ShortLink>), ApiError> {
    if payload.url.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "URL cannot be empty"));
    }

    let short_code = match payload.custom_code {
        Some(custom) => {
            if custom.is_empty() || custom.len() > 20 {
                return Err(api_error(
                    StatusCode::BAD_REQUEST,
                    "Custom code must be 1-20 characters",
                ));
            }
            custom
        }
        None => generate_short_code(),
    };

    match state.store.create_link(&short_code, &payload.url).await {
        Ok(link) => Ok((StatusCode::CREATED, Json(link))),
        Err(RuleStoreError::Conflict) => Err(api_error(
            StatusCode::CONFLICT,
            "Short code already exists",
        )),
        Err(RuleStoreError::Other(err)) => Err(internal_error(err)),
    }
}

pub async fn get_link(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<ShortLink>, ApiError> {
    match state.store.get_link(&code).await {
        Ok(Some(link)) => Ok(Json(link)),
        Ok(None) => Err(api_error(StatusCode::NOT_FOUND, "Link not found")),
        Err(err) => Err(internal_error(err)),
    }
}

pub async fn deactivate_link(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    match state.store.deactivate_link(&code).await {
        Ok(true) => Ok(Json(SuccessResponse {
            message: "Link deactivated".to_string(),
        })),
        Ok(false) => Err(api_error(StatusCode::NOT_FOUND, "Link not found")),
        Err(err) => Err(internal_error(err)),
    }
}

pub async fn list_rules(
    State(state): State<Arc<AppState>>,
    Path(link_id): Path<String>,
) -> Result<Json<Vec<RedirectRule>>, ApiError> {
    state
        .store
        .list_rules(&link_id)
        .await
        .map(Json)
        .map_err(internal_error)
}

pub async fn create_rule(
    State(state): State<Arc<AppState>>,
    Path(link_id): Path<String>,
    Json(payload): Json<CreateRuleRequest>,
) -> Result<(StatusCode, Json<RedirectRule>), ApiError> {
    if payload.rule_types.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "A rule must declare at least one condition family",
        ));
    }
    if payload.target_url.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Target URL cannot be empty",
        ));
    }

    match state.store.get_link_by_id(&link_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Err(api_error(StatusCode::NOT_FOUND, "Link not found")),
        Err(err) => return Err(internal_error(err)),
    }

    let draft = RuleDraft {
        link_id,
        name: payload.name,
        description: payload.description,
        target_url: payload.target_url,
        rule_types: payload.rule_types,
        conditions: payload.conditions,
        priority: payload.priority,
        enabled: payload.enabled,
    };

    match state.store.create_rule(draft).await {
        Ok(rule) => Ok((StatusCode::CREATED, Json(rule))),
        Err(err) => Err(internal_error(err)),
    }
}

pub async fn update_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRuleRequest>,
) -> Result<Json<RedirectRule>, ApiError> {
    if let Some(rule_types) = &payload.rule_types {
        if rule_types.is_empty() {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "A rule must declare at least one condition family",
            ));
        }
    }

    let update = RuleUpdate {
        name: payload.name,
        description: payload.description,
        target_url: payload.target_url,
        rule_types: payload.rule_types,
        conditions: payload.conditions,
        priority: payload.priority,
        enabled: payload.enabled,
    };

    match state.store.update_rule(id, update).await {
        Ok(Some(rule)) => Ok(Json(rule)),
        Ok(None) => Err(api_error(StatusCode::NOT_FOUND, "Rule not found")),
        Err(err) => Err(internal_error(err)),
    }
}

pub async fn delete_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ApiError> {
    match state.store.delete_rule(id).await {
        Ok(true) => Ok(Json(SuccessResponse {
            message: "Rule deleted".to_string(),
        })),
        Ok(false) => Err(api_error(StatusCode::NOT_FOUND, "Rule not found")),
        Err(err) => Err(internal_error(err)),
    }
}

#[derive(Deserialize)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

pub async fn set_rule_enabled(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetEnabledRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    match state.store.set_rule_enabled(id, payload.enabled).await {
        Ok(true) => Ok(Json(SuccessResponse {
            message: if payload.enabled {
                "Rule enabled".to_string()
            } else {
                "Rule disabled".to_string()
            },
        })),
        Ok(false) => Err(api_error(StatusCode::NOT_FOUND, "Rule not found")),
        Err(err) => Err(internal_error(err)),
    }
}

pub async fn reorder_rules(
    State(state): State<Arc<AppState>>,
    Path(link_id): Path<String>,
    Json(ordering): Json<Vec<RulePriority>>,
) -> Result<Json<SuccessResponse>, ApiError> {
    match state.store.reorder_rules(&link_id, &ordering).await {
        Ok(()) => Ok(Json(SuccessResponse {
            message: "Rules reordered".to_string(),
        })),
        Err(err) => Err(internal_error(err)),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateResponse {
    pub copied: u64,
}

pub async fn duplicate_rules(
    State(state): State<Arc<AppState>>,
    Path((link_id, target_link_id)): Path<(String, String)>,
) -> Result<Json<DuplicateResponse>, ApiError> {
    match state.store.get_link_by_id(&target_link_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Err(api_error(StatusCode::NOT_FOUND, "Target link not found")),
        Err(err) => return Err(internal_error(err)),
    }

    match state.store.duplicate_rules(&link_id, &target_link_id).await {
        Ok(copied) => Ok(Json(DuplicateResponse { copied })),
        Err(err) => Err(internal_error(err)),
    }
}

#[derive(Deserialize)]
pub struct EvaluateQuery {
    /// Statistics recording is opt-in; a dry run from an admin UI leaves
    /// counters untouched.
    #[serde(default)]
    pub record: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DryRunResponse {
    #[serde(flatten)]
    pub result: EvaluationResult,
    /// Echo of the evaluated context, for the testing UI.
    pub context: VisitorContext,
}

/// Evaluates a link's rules against a caller-supplied synthetic context.
pub async fn evaluate_rules(
    State(state): State<Arc<AppState>>,
    Path(link_id): Path<String>,
    Query(query): Query<EvaluateQuery>,
    Json(context): Json<VisitorContext>,
) -> Result<Json<DryRunResponse>, ApiError> {
    match state
        .engine
        .evaluate_link(&link_id, &context, query.record)
        .await
    {
        Ok(result) => Ok(Json(DryRunResponse { result, context })),
        Err(err) => Err(internal_error(err)),
    }
}
