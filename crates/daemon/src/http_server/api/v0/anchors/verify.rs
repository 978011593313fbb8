use axum::extract::{Json, Path, Query, State};
use axum::response::{IntoResponse, Response};
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::anchor::{verify_anchor, AnchorError, AnchorVerification};
use common::linked_data::{cid_string, Cid};

use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize, clap::Args)]
pub struct VerifyAnchorRequest {
    /// Anchor key to check, e.g. the tourist's email
    #[arg(long)]
    pub key: String,
    /// CID expected to be the key's current anchor
    #[arg(long)]
    #[serde(with = "cid_string")]
    pub cid: Cid,
}

#[derive(Debug, Deserialize)]
pub struct CidQuery {
    #[serde(with = "cid_string")]
    pub cid: Cid,
}

pub type VerifyAnchorResponse = AnchorVerification;

/// Whether `cid` is what `key` currently resolves to. An unknown key is a
///  negative answer, not a 404.
pub async fn handler(
    State(state): State<ServiceState>,
    Path(key): Path<String>,
    Query(query): Query<CidQuery>,
) -> Result<impl IntoResponse, VerifyAnchorError> {
    let verification = verify_anchor(state.records().anchors(), &key, &query.cid).await?;
    if !verification.current {
        tracing::info!(key, cid = %query.cid, "cid is not the current anchor");
    }
    Ok((http::StatusCode::OK, Json(verification)).into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyAnchorError {
    #[error(transparent)]
    Anchor(#[from] AnchorError),
}

impl IntoResponse for VerifyAnchorError {
    fn into_response(self) -> Response {
        let VerifyAnchorError::Anchor(err) = self;
        let status = super::anchor_status(&err);
        tracing::error!("ANCHOR VERIFY ERROR: {}", err);
        (status, err.to_string()).into_response()
    }
}

// Client implementation - builds request for this operation
impl ApiRequest for VerifyAnchorRequest {
    type Response = VerifyAnchorResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let mut full_url = base_url
            .join("/api/v0/anchors")
            .expect("static api path joins any base url");
        if let Ok(mut segments) = full_url.path_segments_mut() {
            segments.push(&self.key).push("verify");
        }
        client.get(full_url).query(&[("cid", self.cid.to_string())])
    }
}
