use axum::extract::{Json, Path, State};
use axum::response::{IntoResponse, Response};
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::anchor::{AnchorError, AnchorRegistry};
use common::linked_data::{cid_string, Cid};

use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize, clap::Args)]
pub struct LookupRequest {
    /// Anchor key to resolve, e.g. the tourist's email
    #[arg(long)]
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResponse {
    pub key: String,
    #[serde(with = "cid_string")]
    pub cid: Cid,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, LookupError> {
    let cid = state.records().anchors().lookup(&key).await?;
    Ok((http::StatusCode::OK, Json(LookupResponse { key, cid })).into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error(transparent)]
    Anchor(#[from] AnchorError),
}

impl IntoResponse for LookupError {
    fn into_response(self) -> Response {
        let LookupError::Anchor(err) = self;
        let status = super::anchor_status(&err);
        if status != http::StatusCode::NOT_FOUND {
            tracing::error!("ANCHOR LOOKUP ERROR: {}", err);
        }
        (status, err.to_string()).into_response()
    }
}

// Client implementation - builds request for this operation
impl ApiRequest for LookupRequest {
    type Response = LookupResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let mut full_url = base_url
            .join("/api/v0/anchors")
            .expect("static api path joins any base url");
        // keys are free text, push_segment percent-encodes them
        if let Ok(mut segments) = full_url.path_segments_mut() {
            segments.push(&self.key);
        }
        client.get(full_url)
    }
}
