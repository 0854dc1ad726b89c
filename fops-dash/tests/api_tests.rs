//! Integration tests for fops-dash API endpoints

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::util::ServiceExt;

use fops_common::config::DashboardConfig;
use fops_common::context::DashboardContext;
use fops_common::events::EventBus;
use fops_dash::runtime::{spawn_runtime, RuntimeHandle};
use fops_dash::{build_router, AppState};

const GATED: &str = r#"{"type":"agent_activity","payload":{"id":"evt-42","kind":"invoice_issued","requires_approval":true,"data":{"amount":450}}}"#;

/// Test helper: app over the default 50-state geography, plus the runtime handle
fn create_test_app() -> (Router, RuntimeHandle) {
    let config = DashboardConfig::default();
    let context = Arc::new(DashboardContext::build(&config).expect("default config builds"));
    let bus = EventBus::new(64);
    let (runtime, _task) = spawn_runtime(
        config.feed.gate_limits(),
        bus.clone(),
        None,
        CancellationToken::new(),
    );
    let app = build_router(AppState::new(context, runtime.clone(), bus));
    (app, runtime)
}

fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn extract_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app.clone().oneshot(test_request("GET", uri)).await.unwrap();
    let status = response.status();
    (status, extract_json(response).await)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _runtime) = create_test_app();

    let (status, json) = get_json(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "fops-dash");
}

#[tokio::test]
async fn test_areas_paginate_with_disclosure() {
    let (app, _runtime) = create_test_app();

    let (status, json) = get_json(&app, "/api/areas").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 450);
    assert_eq!(json["items"].as_array().unwrap().len(), 50);
    assert_eq!(json["showing"], "showing first 50 of 450");

    let (_, page2) = get_json(&app, "/api/areas?page=2").await;
    assert_eq!(page2["page"], 2);
    assert_eq!(page2["showing"], "showing 51-100 of 450");
}

#[tokio::test]
async fn test_areas_filter_by_region_and_sentinel() {
    let (app, _runtime) = create_test_app();

    let (_, json) = get_json(&app, "/api/areas?region=ca").await;
    assert_eq!(json["total"], 9);
    assert_eq!(json["showing"], "showing all 9");
    assert!(json["items"]
        .as_array()
        .unwrap()
        .iter()
        .all(|a| a["region"] == "CA"));

    let (_, all) = get_json(&app, "/api/areas?region=ALL&search=").await;
    assert_eq!(all["total"], 450);
}

#[tokio::test]
async fn test_contractors_filter_by_area_code() {
    let (app, _runtime) = create_test_app();

    let (status, json) = get_json(&app, "/api/contractors?area=CA-6").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 2);
    for row in json["items"].as_array().unwrap() {
        assert_eq!(row["planning_area"], "CA Metro");
        assert!(row.get("status").is_some());
        assert!(row.get("tier").is_some());
    }
}

#[tokio::test]
async fn test_unknown_region_matches_nothing() {
    let (app, _runtime) = create_test_app();

    let (status, json) = get_json(&app, "/api/contractors?region=ZZ").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 0);
    assert_eq!(json["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_invalid_state_rejected() {
    let (app, _runtime) = create_test_app();

    let (status, json) = get_json(&app, "/api/contractors?state=retired").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("retired"));
}

#[tokio::test]
async fn test_targets_tier_filter() {
    let (app, _runtime) = create_test_app();

    let (status, json) = get_json(&app, "/api/targets?tier=10").await;
    assert_eq!(status, StatusCode::OK);
    for row in json["items"].as_array().unwrap() {
        assert_eq!(row["decile"]["tier"], 10);
    }

    let (status, _) = get_json(&app, "/api/targets?tier=11").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_approval_flow() {
    let (app, runtime) = create_test_app();

    let attempt = runtime.connect().await.unwrap();
    runtime.opened(attempt).await.unwrap();
    runtime.message(attempt, GATED.to_string()).await.unwrap();

    let (_, pending) = get_json(&app, "/api/approvals").await;
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_eq!(pending[0]["id"], "evt-42");
    assert_eq!(pending[0]["label"], "Invoice issued");

    let response = app
        .clone()
        .oneshot(test_request("POST", "/api/approvals/evt-42/approve"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let ack = extract_json(response).await;
    assert_eq!(ack["decision"], "approved");

    // A second click is accepted but produces no second confirmation
    let response = app
        .clone()
        .oneshot(test_request("POST", "/api/approvals/evt-42/approve"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let (_, pending) = get_json(&app, "/api/approvals").await;
    assert!(pending.as_array().unwrap().is_empty());

    let (_, feed) = get_json(&app, "/api/feed?limit=10").await;
    let feed = feed.as_array().unwrap();
    let confirmations: Vec<_> = feed
        .iter()
        .filter(|e| e["kind"] == "approval_confirmed")
        .collect();
    assert_eq!(confirmations.len(), 1);
    assert_eq!(confirmations[0]["caused_by"], "evt-42");
    assert_eq!(confirmations[0]["label"], "Approved");
    assert_eq!(confirmations[0]["tone"], "success");
    assert_eq!(feed[0]["kind"], "approval_confirmed");
}

#[tokio::test]
async fn test_status_reports_connection_and_pending() {
    let (app, runtime) = create_test_app();

    let (_, idle) = get_json(&app, "/api/status").await;
    assert_eq!(idle["connection"], "closed");
    assert_eq!(idle["pending_approvals"], 0);
    assert!(idle.get("snapshot").is_none());

    let attempt = runtime.connect().await.unwrap();
    runtime.opened(attempt).await.unwrap();
    runtime.message(attempt, GATED.to_string()).await.unwrap();

    let (status, json) = get_json(&app, "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["connection"], "open");
    assert_eq!(json["pending_approvals"], 1);
}

#[tokio::test]
async fn test_buildinfo_endpoint() {
    let (app, _runtime) = create_test_app();

    let (status, json) = get_json(&app, "/api/buildinfo").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert!(json.get("git_hash").is_some());
}
