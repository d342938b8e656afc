mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use common::{seeded_pipeline, zero_scorer};
use guardian_supervisor::api::{build_router, AppState};
use guardian_supervisor::models::Approval;
use guardian_supervisor::state::GuardianStore;
use guardian_supervisor::streams::StreamBus;

/// Router over an in-memory store; the stream broker URL points nowhere,
/// which only matters for endpoints that actually append.
async fn test_app() -> (axum::Router, Arc<dyn GuardianStore>) {
    let (pipeline, store) = seeded_pipeline(zero_scorer()).await;
    let bus = Arc::new(StreamBus::new("redis://127.0.0.1:1").unwrap());
    let config = guardian_supervisor::config::Config::load().unwrap();
    let state = AppState::new(pipeline, store.clone(), bus, config.streams);
    (build_router(state), store)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _store) = test_app().await;
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn evaluate_blocks_secret_payload() {
    let (app, _store) = test_app().await;
    let response = app
        .oneshot(post_json(
            "/v1/evaluate",
            json!({
                "trace_id": "tr-1",
                "agent_id": "agent-7",
                "action": {
                    "type": "http.request",
                    "target": "https://example.com",
                    "args": {"text": "api_key=ABCDEF1234567890ZZZZ"}
                }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["decision"], "BLOCK");
    assert!(body["policy_hits"]
        .as_array()
        .unwrap()
        .contains(&json!("block_secrets_anywhere")));
    assert_eq!(body["rewrite"], Value::Null);
    assert_eq!(body["approval"]["required"], json!(false));
}

#[tokio::test]
async fn evaluate_rejects_empty_trace_id() {
    let (app, _store) = test_app().await;
    let response = app
        .oneshot(post_json(
            "/v1/evaluate",
            json!({"trace_id": "", "action": {"type": "http.request"}}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pending_approvals_are_listed() {
    let (app, store) = test_app().await;

    let approval = Approval::new("evt-9".to_string(), Uuid::new_v4());
    store.create_approval(&approval).await.unwrap();

    let response = app.oneshot(get("/v1/approvals/pending")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["request_id"], json!(approval.request_id));
    assert_eq!(list[0]["status"], "PENDING");
}

#[tokio::test]
async fn approve_resolves_pending_approval() {
    let (app, store) = test_app().await;

    let approval = Approval::new("evt-10".to_string(), Uuid::new_v4());
    store.create_approval(&approval).await.unwrap();

    let uri = format!("/v1/approvals/{}/approve", approval.request_id);
    let response = app
        .clone()
        .oneshot(post_json(&uri, json!({"reviewer_id": "alice", "comment": "ok"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "APPROVED");
    assert_eq!(body["reviewer_id"], "alice");

    // a second resolution attempt is rejected
    let response = app.oneshot(post_json(&uri, json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn approving_malformed_id_is_bad_request() {
    let (app, _store) = test_app().await;
    let response = app
        .oneshot(post_json("/v1/approvals/not-a-uuid/approve", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn approving_unknown_id_is_not_found() {
    let (app, _store) = test_app().await;
    let uri = format!("/v1/approvals/{}/deny", Uuid::new_v4());
    let response = app.oneshot(post_json(&uri, json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn policies_can_be_listed_and_created() {
    let (app, _store) = test_app().await;

    let response = app.clone().oneshot(get("/v1/policies")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let rule = json!({
        "policy_id": "deny_file_writes",
        "priority": 50,
        "match": {"action.type": ["file.write"]},
        "effect": "BLOCK",
        "risk_boost": 0.5,
        "message": "File writes are not permitted."
    });

    let response = app
        .clone()
        .oneshot(post_json("/v1/policies", rule.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // duplicate policy ids are rejected
    let response = app.oneshot(post_json("/v1/policies", rule)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn metrics_endpoint_exports_prometheus_text() {
    let _ = guardian_supervisor::metrics::init_metrics();
    let (app, _store) = test_app().await;

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
