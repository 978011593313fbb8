//! Shared helpers for the pipeline integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use ::common::linked_data::content_cid;
use ::common::transport::RetryPolicy;

pub const API_KEY: &str = "test-api-key";
pub const SECRET_KEY: &str = "test-secret-key";

/// A retry policy that does not slow the tests down
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(20),
    }
}

/// In-process stand-in for the pinning service, its gateway and the ledger
///  contract gateway
#[derive(Debug, Clone, Default)]
pub struct FakeServices {
    blobs: Arc<Mutex<HashMap<String, Bytes>>>,
    names: Arc<Mutex<HashMap<String, String>>>,
    anchors: Arc<Mutex<HashMap<String, String>>>,
    upload_attempts: Arc<AtomicU32>,
    failing_uploads: Arc<AtomicU32>,
    unconfirmed_anchors: Arc<AtomicU32>,
}

impl FakeServices {
    /// Answer the next `n` uploads with 503
    pub fn fail_next_uploads(&self, n: u32) {
        self.failing_uploads.store(n, Ordering::SeqCst);
    }

    /// Report the next `n` storeCid calls as unconfirmed
    pub fn leave_next_anchors_unconfirmed(&self, n: u32) {
        self.unconfirmed_anchors.store(n, Ordering::SeqCst);
    }

    pub fn upload_attempts(&self) -> u32 {
        self.upload_attempts.load(Ordering::SeqCst)
    }

    pub fn pinned_count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    pub fn name_of(&self, cid: &str) -> Option<String> {
        self.names.lock().unwrap().get(cid).cloned()
    }
}

/// Counters are decremented once per request while above zero
fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

async fn pin_file(
    State(services): State<FakeServices>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    services.upload_attempts.fetch_add(1, Ordering::SeqCst);
    if take_one(&services.failing_uploads) {
        return (StatusCode::SERVICE_UNAVAILABLE, "try again later").into_response();
    }

    let authorized = headers.get("pinata_api_key").map(|v| v.as_bytes()) == Some(API_KEY.as_bytes())
        && headers.get("pinata_secret_api_key").map(|v| v.as_bytes())
            == Some(SECRET_KEY.as_bytes());
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "invalid api keys").into_response();
    }

    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        };
        let cid = content_cid(&data).to_string();
        services.blobs.lock().unwrap().insert(cid.clone(), data);
        services.names.lock().unwrap().insert(cid.clone(), name);
        return Json(json!({
            "IpfsHash": cid,
            "PinSize": 0,
            "Timestamp": "2024-01-15T00:00:00Z"
        }))
        .into_response();
    }

    (StatusCode::BAD_REQUEST, "missing file part").into_response()
}

async fn gateway(State(services): State<FakeServices>, Path(cid): Path<String>) -> Response {
    match services.blobs.lock().unwrap().get(&cid) {
        Some(data) => data.clone().into_response(),
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

#[derive(Deserialize)]
struct StoreCid {
    hash: String,
    cid: String,
}

#[derive(Deserialize)]
struct GetCid {
    hash: String,
}

async fn store_cid(
    State(services): State<FakeServices>,
    Json(request): Json<StoreCid>,
) -> Json<serde_json::Value> {
    if take_one(&services.unconfirmed_anchors) {
        return Json(json!({ "confirmed": false }));
    }
    services
        .anchors
        .lock()
        .unwrap()
        .insert(request.hash, request.cid);
    Json(json!({ "confirmed": true, "tx": "0xabc123" }))
}

async fn get_cid(
    State(services): State<FakeServices>,
    Json(request): Json<GetCid>,
) -> Json<serde_json::Value> {
    // like the contract, unknown keys read as the empty string
    let cid = services
        .anchors
        .lock()
        .unwrap()
        .get(&request.hash)
        .cloned()
        .unwrap_or_default();
    Json(json!({ "cid": cid }))
}

/// Base urls of a running [`FakeServices`]
pub struct FakeEndpoints {
    pub api_url: Url,
    pub gateway_url: Url,
    pub ledger_url: Url,
}

/// Serve `services` on an ephemeral local port
pub async fn spawn_fake_services(services: FakeServices) -> FakeEndpoints {
    let app = Router::new()
        .route("/pinning/pinFileToIPFS", post(pin_file))
        .route("/ipfs/:cid", get(gateway))
        .route("/ledger/storeCid", post(store_cid))
        .route("/ledger/getCid", post(get_cid))
        .with_state(services);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let base = Url::parse(&format!("http://{}", addr)).unwrap();
    FakeEndpoints {
        api_url: base.clone(),
        gateway_url: base.join("ipfs").unwrap(),
        ledger_url: base.join("ledger").unwrap(),
    }
}
