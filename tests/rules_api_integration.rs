//! Rule management API integration tests
//!
//! These tests drive the axum API router end to end: link creation, rule
//! CRUD, reordering, duplication and dry-run evaluation.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use relink::api::create_api_router;
use relink::engine::RuleEngine;
use relink::storage::{RuleStore, SqliteStore};

/// A single connection so the in-memory database is shared.
async fn create_test_store() -> Arc<dyn RuleStore> {
    let store = SqliteStore::new("sqlite::memory:", 1).await.unwrap();
    store.init().await.unwrap();
    Arc::new(store)
}

async fn test_app() -> (Router, Arc<dyn RuleStore>) {
    let store = create_test_store().await;
    let engine = RuleEngine::new(Arc::clone(&store));
    (create_api_router(Arc::clone(&store), engine), store)
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn create_link(app: &Router, code: &str, url: &str) -> String {
    let (status, body) = send_json(
        app,
        "POST",
        "/links",
        json!({ "url": url, "customCode": code }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

fn geo_rule(name: &str, priority: i64, countries: Vec<&str>, target: &str) -> Value {
    json!({
        "name": name,
        "targetUrl": target,
        "ruleTypes": ["geo"],
        "conditions": { "geo": { "countries": countries } },
        "priority": priority,
    })
}

#[tokio::test]
async fn test_create_link_conflict() {
    let (app, _) = test_app().await;
    create_link(&app, "dup", "https://example.com").await;

    let (status, _) = send_json(
        &app,
        "POST",
        "/links",
        json!({ "url": "https://other.com", "customCode": "dup" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_create_rule_requires_declared_families() {
    let (app, _) = test_app().await;
    let link_id = create_link(&app, "nofam", "https://example.com").await;

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/links/{link_id}/rules"),
        json!({
            "name": "no families",
            "targetUrl": "https://target.example.com",
            "ruleTypes": [],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("condition family"));
}

#[tokio::test]
async fn test_create_rule_unknown_link() {
    let (app, _) = test_app().await;
    let (status, _) = send_json(
        &app,
        "POST",
        "/links/no-such-link/rules",
        geo_rule("r", 10, vec!["CN"], "https://cn.example.com"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_rules_in_evaluation_order() {
    let (app, _) = test_app().await;
    let link_id = create_link(&app, "ordered", "https://example.com").await;

    for (name, priority) in [("low", 10), ("high", 100), ("mid", 50)] {
        let (status, _) = send_json(
            &app,
            "POST",
            &format!("/links/{link_id}/rules"),
            geo_rule(name, priority, vec!["CN"], "https://cn.example.com"),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = get_json(&app, &format!("/links/{link_id}/rules")).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["high", "mid", "low"]);
}

#[tokio::test]
async fn test_dry_run_geo_scenario() {
    // One enabled geo rule for CN/HK/TW at priority 100.
    let (app, _) = test_app().await;
    let link_id = create_link(&app, "geo", "https://example.com").await;

    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/links/{link_id}/rules"),
        geo_rule("cn visitors", 100, vec!["CN", "HK", "TW"], "https://cn.example.com"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/links/{link_id}/rules/evaluate"),
        json!({ "country": "CN" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], json!(true));
    assert_eq!(body["targetUrl"], json!("https://cn.example.com"));
    assert_eq!(body["matchedFamilies"], json!(["geo"]));
    // the input context is echoed back
    assert_eq!(body["context"]["country"], json!("CN"));

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/links/{link_id}/rules/evaluate"),
        json!({ "country": "US" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], json!(false));
    assert!(body.get("targetUrl").is_none());
}

#[tokio::test]
async fn test_dry_run_does_not_record_stats() {
    let (app, store) = test_app().await;
    let link_id = create_link(&app, "dryrun", "https://example.com").await;

    let (_, rule) = send_json(
        &app,
        "POST",
        &format!("/links/{link_id}/rules"),
        geo_rule("cn", 100, vec!["CN"], "https://cn.example.com"),
    )
    .await;
    let rule_id = rule["id"].as_str().unwrap().parse().unwrap();

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/links/{link_id}/rules/evaluate"),
        json!({ "country": "CN" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], json!(true));

    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    let stored = store.get_rule(rule_id).await.unwrap().unwrap();
    assert_eq!(stored.match_count, 0, "dry run must not bump counters");
    assert!(stored.last_matched_at.is_none());
}

#[tokio::test]
async fn test_evaluate_with_record_flag_bumps_counters() {
    let (app, store) = test_app().await;
    let link_id = create_link(&app, "record", "https://example.com").await;

    let (_, rule) = send_json(
        &app,
        "POST",
        &format!("/links/{link_id}/rules"),
        geo_rule("cn", 100, vec!["CN"], "https://cn.example.com"),
    )
    .await;
    let rule_id = rule["id"].as_str().unwrap().parse().unwrap();

    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/links/{link_id}/rules/evaluate?record=true"),
        json!({ "country": "CN" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    let stored = store.get_rule(rule_id).await.unwrap().unwrap();
    assert_eq!(stored.match_count, 1);
    assert!(stored.last_matched_at.is_some());
}

#[tokio::test]
async fn test_priority_scenario_highest_wins() {
    // Two enabled rules that both match the visitor; priority 100 wins.
    let (app, _) = test_app().await;
    let link_id = create_link(&app, "prio", "https://example.com").await;

    send_json(
        &app,
        "POST",
        &format!("/links/{link_id}/rules"),
        geo_rule("lower", 50, vec!["CN"], "https://low.example.com"),
    )
    .await;
    send_json(
        &app,
        "POST",
        &format!("/links/{link_id}/rules"),
        geo_rule("higher", 100, vec!["CN"], "https://high.example.com"),
    )
    .await;

    let (_, body) = send_json(
        &app,
        "POST",
        &format!("/links/{link_id}/rules/evaluate"),
        json!({ "country": "CN" }),
    )
    .await;
    assert_eq!(body["targetUrl"], json!("https://high.example.com"));
    assert_eq!(body["ruleName"], json!("higher"));
}

#[tokio::test]
async fn test_toggle_disables_rule_for_evaluation() {
    let (app, _) = test_app().await;
    let link_id = create_link(&app, "toggle", "https://example.com").await;

    let (_, rule) = send_json(
        &app,
        "POST",
        &format!("/links/{link_id}/rules"),
        geo_rule("cn", 100, vec!["CN"], "https://cn.example.com"),
    )
    .await;
    let rule_id = rule["id"].as_str().unwrap();

    let (status, _) = send_json(
        &app,
        "PUT",
        &format!("/rules/{rule_id}/enabled"),
        json!({ "enabled": false }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send_json(
        &app,
        "POST",
        &format!("/links/{link_id}/rules/evaluate"),
        json!({ "country": "CN" }),
    )
    .await;
    assert_eq!(body["matched"], json!(false));
}

#[tokio::test]
async fn test_reorder_changes_winner() {
    let (app, _) = test_app().await;
    let link_id = create_link(&app, "reorder", "https://example.com").await;

    let (_, first) = send_json(
        &app,
        "POST",
        &format!("/links/{link_id}/rules"),
        geo_rule("first", 100, vec!["CN"], "https://first.example.com"),
    )
    .await;
    let (_, second) = send_json(
        &app,
        "POST",
        &format!("/links/{link_id}/rules"),
        geo_rule("second", 50, vec!["CN"], "https://second.example.com"),
    )
    .await;

    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/links/{link_id}/rules/reorder"),
        json!([
            { "id": first["id"], "priority": 10 },
            { "id": second["id"], "priority": 200 },
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send_json(
        &app,
        "POST",
        &format!("/links/{link_id}/rules/evaluate"),
        json!({ "country": "CN" }),
    )
    .await;
    assert_eq!(body["targetUrl"], json!("https://second.example.com"));
}

#[tokio::test]
async fn test_duplicate_rules_resets_counters() {
    let (app, store) = test_app().await;
    let source_id = create_link(&app, "src", "https://example.com").await;
    let target_id = create_link(&app, "dst", "https://example.org").await;

    let (_, rule) = send_json(
        &app,
        "POST",
        &format!("/links/{source_id}/rules"),
        geo_rule("cn", 100, vec!["CN"], "https://cn.example.com"),
    )
    .await;
    let rule_id = rule["id"].as_str().unwrap().parse().unwrap();

    // Put some history on the source rule first.
    store.record_match(rule_id).await.unwrap();

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/links/{source_id}/rules/duplicate/{target_id}"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["copied"], json!(1));

    let copies = store.list_rules(&target_id).await.unwrap();
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0].name, "cn");
    assert_eq!(copies[0].match_count, 0, "copies start with fresh counters");
    assert!(copies[0].last_matched_at.is_none());
    assert_ne!(copies[0].id, rule_id);

    // Copies are live on the target link immediately.
    let (_, body) = send_json(
        &app,
        "POST",
        &format!("/links/{target_id}/rules/evaluate"),
        json!({ "country": "CN" }),
    )
    .await;
    assert_eq!(body["matched"], json!(true));
}

#[tokio::test]
async fn test_update_and_delete_rule() {
    let (app, _) = test_app().await;
    let link_id = create_link(&app, "upd", "https://example.com").await;

    let (_, rule) = send_json(
        &app,
        "POST",
        &format!("/links/{link_id}/rules"),
        geo_rule("cn", 100, vec!["CN"], "https://cn.example.com"),
    )
    .await;
    let rule_id = rule["id"].as_str().unwrap();

    let (status, body) = send_json(
        &app,
        "PUT",
        &format!("/rules/{rule_id}"),
        json!({ "targetUrl": "https://updated.example.com", "priority": 7 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["targetUrl"], json!("https://updated.example.com"));
    assert_eq!(body["priority"], json!(7));
    // untouched fields survive
    assert_eq!(body["name"], json!("cn"));

    let (status, _) = send_json(&app, "DELETE", &format!("/rules/{rule_id}"), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (_, rules) = get_json(&app, &format!("/links/{link_id}/rules")).await;
    assert!(rules.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_multi_family_dry_run() {
    let (app, _) = test_app().await;
    let link_id = create_link(&app, "multi", "https://example.com").await;

    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/links/{link_id}/rules"),
        json!({
            "name": "cn mobile",
            "targetUrl": "https://m.cn.example.com",
            "ruleTypes": ["geo", "device"],
            "conditions": {
                "geo": { "countries": ["CN"] },
                "device": { "deviceTypes": ["mobile"] },
            },
            "priority": 10,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send_json(
        &app,
        "POST",
        &format!("/links/{link_id}/rules/evaluate"),
        json!({ "country": "CN", "deviceType": "mobile" }),
    )
    .await;
    assert_eq!(body["matched"], json!(true));
    assert_eq!(body["matchedFamilies"], json!(["geo", "device"]));

    let (_, body) = send_json(
        &app,
        "POST",
        &format!("/links/{link_id}/rules/evaluate"),
        json!({ "country": "CN", "deviceType": "desktop" }),
    )
    .await;
    assert_eq!(body["matched"], json!(false));
}
