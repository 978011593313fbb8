//! End to end tests of the daemon's HTTP API over an in-process router
//!
//! The router is driven directly with `tower::ServiceExt::oneshot`, so no
//! listener is bound. State is ephemeral: in-memory database, content store
//! and a low difficulty chain.

use axum::body::{to_bytes, Body};
use axum::Router;
use http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use common::crypto::Secret;
use common::linked_data::content_cid;
use common::record::RecordIndex;
use safetour_daemon::http_server::{self, api::v0::chain::VerifyResponse};
use safetour_daemon::http_server::api::v0::anchors::{HistoryResponse, VerifyAnchorResponse};
use safetour_daemon::http_server::api::v0::records::{ListResponse, ReadResponse, WriteResponse};
use safetour_daemon::{AnchorConfig, ContentConfig, RetryConfig, ServiceConfig, ServiceState};

const BODY_LIMIT: usize = 1024 * 1024;

async fn app_with(anchor: AnchorConfig) -> (Router, ServiceState) {
    let mut config = ServiceConfig::ephemeral(Secret::generate());
    config.anchor = anchor;
    let state = ServiceState::from_config(&config).await.unwrap();
    (http_server::router(state.clone()), state)
}

fn fast_chain(attempt_budget: Option<u64>) -> AnchorConfig {
    AnchorConfig::Chain {
        difficulty: 1,
        mining_timeout_secs: Some(10),
        attempt_budget,
    }
}

async fn app() -> (Router, ServiceState) {
    app_with(fast_chain(None)).await
}

/// Nothing listens on the discard port, so every call fails to connect
fn unreachable_url() -> url::Url {
    url::Url::parse("http://127.0.0.1:9/").unwrap()
}

fn no_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 1,
        initial_backoff_ms: 1,
        max_backoff_ms: 1,
    }
}

fn post_record(anchor_key: &str, document: Value) -> Request<Body> {
    post_json(
        "/api/v0/records",
        &json!({"anchor_key": anchor_key, "document": document}),
    )
}

async fn forge_anchor(state: &ServiceState, block: i64) {
    sqlx::query("UPDATE chain_blocks SET payload = json_set(payload, '$.cid', $1) WHERE id = $2")
        .bind(content_cid(b"forged").to_string())
        .bind(block)
        .execute(&**state.database())
        .await
        .unwrap();
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
    (status, body.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn write(router: &Router, anchor_key: &str, document: Value) -> WriteResponse {
    let (status, body) = send(router, post_record(anchor_key, document)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", String::from_utf8_lossy(&body));
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_write_read_lookup_verify() {
    let (router, _state) = app().await;
    let profile = json!({"name": "Asha", "destination": "Goa", "emergency_contact": "+91 98765 43210"});

    let written = write(&router, "asha@example.com", profile.clone()).await;

    let (status, body) = send(&router, get(&format!("/api/v0/records/{}", written.record_id))).await;
    assert_eq!(status, StatusCode::OK);
    let read: ReadResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(read.record_id, written.record_id);
    assert_eq!(read.document, profile);

    let (status, body) = send(&router, get("/api/v0/anchors/asha@example.com")).await;
    assert_eq!(status, StatusCode::OK);
    let anchored: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(anchored["cid"], written.cid.to_string());

    let (status, body) = send(&router, get("/api/v0/chain/verify")).await;
    assert_eq!(status, StatusCode::OK);
    let report: VerifyResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(report.blocks, 2);
    assert_eq!(report.difficulty, 1);
}

#[tokio::test]
async fn test_list_filters_by_anchor_key() {
    let (router, _state) = app().await;
    write(&router, "a@example.com", json!({"n": 1})).await;
    write(&router, "b@example.com", json!({"n": 2})).await;

    let (status, body) = send(&router, get("/api/v0/records")).await;
    assert_eq!(status, StatusCode::OK);
    let all: ListResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(all.records.len(), 2);

    let (_, body) = send(&router, get("/api/v0/records?anchor_key=b%40example.com")).await;
    let filtered: ListResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(filtered.records.len(), 1);
    assert_eq!(filtered.records[0].anchor_key, "b@example.com");
}

#[tokio::test]
async fn test_empty_anchor_key_is_bad_request() {
    let (router, _state) = app().await;
    let (status, _) = send(
        &router,
        post_json("/api/v0/records", &json!({"anchor_key": "", "document": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_record_and_key_are_not_found() {
    let (router, _state) = app().await;

    let (status, _) = send(&router, get(&format!("/api/v0/records/{}", Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&router, get("/api/v0/anchors/nobody@example.com")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_verify_without_chain_is_not_found() {
    let (router, _state) = app_with(AnchorConfig::Memory).await;
    let (status, _) = send(&router, get("/api/v0/chain/verify")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_endpoints() {
    let (router, state) = app().await;

    let (status, _) = send(&router, get("/_status/livez")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&router, get("/_status/readyz")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&router, get("/_status/version")).await;
    assert_eq!(status, StatusCode::OK);
    let version: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(version["version"], env!("CARGO_PKG_VERSION"));

    state.database().close().await;
    let (status, _) = send(&router, get("/_status/readyz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_unknown_route_is_json_not_found() {
    let (router, _state) = app().await;
    let request = Request::get("/nope")
        .header("accept", "application/json")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["msg"], "not found");
}

#[tokio::test]
async fn test_anchor_history_newest_first() {
    let (router, _state) = app().await;
    let first = write(&router, "asha@example.com", json!({"trip": "Goa"})).await;
    let second = write(&router, "asha@example.com", json!({"trip": "Kerala"})).await;
    write(&router, "ravi@example.com", json!({"trip": "Delhi"})).await;

    let (status, body) = send(&router, get("/api/v0/anchors/asha@example.com/history")).await;
    assert_eq!(status, StatusCode::OK);
    let history: HistoryResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(history.key, "asha@example.com");
    let cids: Vec<_> = history.events.iter().map(|event| event.cid).collect();
    assert_eq!(cids, vec![second.cid, first.cid]);
    assert_eq!(history.events[0].block, Some(2));
    assert_eq!(history.events[1].block, Some(1));
    assert_eq!(history.statistics.total_events, 2);
    assert_eq!(history.statistics.distinct_cids, 2);

    let (status, body) = send(
        &router,
        get("/api/v0/anchors/asha@example.com/history?start=2999-01-01T00:00:00Z"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let future: HistoryResponse = serde_json::from_slice(&body).unwrap();
    assert!(future.events.is_empty());
    assert_eq!(future.statistics.last_anchored, None);

    let (status, body) = send(
        &router,
        get("/api/v0/anchors/asha@example.com/history?end=2999-01-01T00:00:00Z"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let past: HistoryResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(past.events.len(), 2);
}

#[tokio::test]
async fn test_anchor_history_rejects_inverted_range() {
    let (router, _state) = app().await;
    let (status, _) = send(
        &router,
        get("/api/v0/anchors/asha@example.com/history?start=2024-02-01T00:00:00Z&end=2024-01-01T00:00:00Z"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_anchor_history_unknown_key_is_empty() {
    let (router, _state) = app().await;
    let (status, body) = send(&router, get("/api/v0/anchors/nobody@example.com/history")).await;
    assert_eq!(status, StatusCode::OK);
    let history: HistoryResponse = serde_json::from_slice(&body).unwrap();
    assert!(history.events.is_empty());
}

#[tokio::test]
async fn test_anchor_history_without_chain_is_not_implemented() {
    let mut config = ServiceConfig::ephemeral(Secret::generate());
    config.anchor = AnchorConfig::Remote {
        endpoint: unreachable_url(),
        timeout_secs: 1,
    };
    let state = ServiceState::from_config(&config).await.unwrap();
    let router = http_server::router(state);

    let (status, _) = send(&router, get("/api/v0/anchors/asha@example.com/history")).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_verify_anchor_current_and_superseded() {
    let (router, _state) = app().await;
    let old = write(&router, "asha@example.com", json!({"v": 1})).await;
    let new = write(&router, "asha@example.com", json!({"v": 2})).await;

    let (status, body) = send(
        &router,
        get(&format!("/api/v0/anchors/asha@example.com/verify?cid={}", new.cid)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let current: VerifyAnchorResponse = serde_json::from_slice(&body).unwrap();
    assert!(current.current);
    assert_eq!(current.current_cid, Some(new.cid));

    let (_, body) = send(
        &router,
        get(&format!("/api/v0/anchors/asha@example.com/verify?cid={}", old.cid)),
    )
    .await;
    let superseded: VerifyAnchorResponse = serde_json::from_slice(&body).unwrap();
    assert!(!superseded.current);
    assert_eq!(superseded.current_cid, Some(new.cid));

    let (status, body) = send(
        &router,
        get(&format!("/api/v0/anchors/nobody@example.com/verify?cid={}", old.cid)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let unknown: VerifyAnchorResponse = serde_json::from_slice(&body).unwrap();
    assert!(!unknown.current);
    assert_eq!(unknown.current_cid, None);
}

#[tokio::test]
async fn test_record_under_another_key_is_unprocessable() {
    let (router, state) = app().await;
    let written = state
        .records()
        .write_record("asha@example.com", &json!({"trip": "Goa"}), &Secret::generate())
        .await
        .unwrap();

    let (status, _) = send(&router, get(&format!("/api/v0/records/{}", written.record_id))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_tampered_chain_is_conflict() {
    let (router, state) = app().await;
    let written = write(&router, "asha@example.com", json!({"trip": "Goa"})).await;
    forge_anchor(&state, 1).await;

    let (status, _) = send(&router, get("/api/v0/chain/verify")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&router, get(&format!("/api/v0/records/{}", written.record_id))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&router, get("/api/v0/anchors/asha@example.com")).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_unreachable_pinning_service_is_bad_gateway() {
    let mut config = ServiceConfig::ephemeral(Secret::generate());
    config.anchor = fast_chain(None);
    config.retry = no_retry();
    config.content = ContentConfig::Pinning {
        api_url: unreachable_url(),
        gateway_url: unreachable_url(),
        api_key: Some("key".into()),
        secret_key: Some("secret".into()),
        timeout_secs: 1,
    };
    let state = ServiceState::from_config(&config).await.unwrap();
    let router = http_server::router(state.clone());

    let (status, _) = send(&router, post_record("asha@example.com", json!({"trip": "Goa"}))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(state.records().index().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_ledger_is_bad_gateway() {
    let mut config = ServiceConfig::ephemeral(Secret::generate());
    config.retry = no_retry();
    config.anchor = AnchorConfig::Remote {
        endpoint: unreachable_url(),
        timeout_secs: 1,
    };
    let state = ServiceState::from_config(&config).await.unwrap();
    let router = http_server::router(state);

    let (status, _) = send(&router, post_record("asha@example.com", json!({"trip": "Goa"}))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (status, _) = send(&router, get("/api/v0/anchors/asha@example.com")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_mining_giving_up_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("db.sqlite");
    std::fs::write(&db_path, "").unwrap();

    let mut config = ServiceConfig::ephemeral(Secret::generate());
    config.sqlite_path = Some(db_path);

    // genesis is mined on first open, later blocks get no nonces at all
    config.anchor = fast_chain(None);
    let seeded = ServiceState::from_config(&config).await.unwrap();
    seeded.database().close().await;

    config.anchor = fast_chain(Some(0));
    let state = ServiceState::from_config(&config).await.unwrap();
    let router = http_server::router(state.clone());

    let (status, _) = send(&router, post_record("asha@example.com", json!({"trip": "Goa"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(state.chain().unwrap().len().await.unwrap(), 1);
}
