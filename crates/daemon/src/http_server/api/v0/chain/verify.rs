use axum::extract::{Json, State};
use axum::response::{IntoResponse, Response};
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::chain::ChainError;

use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize, clap::Args)]
pub struct VerifyRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// Number of blocks checked, genesis included
    pub blocks: u64,
    pub tip: String,
    pub difficulty: usize,
}

/// Re-walk the whole anchor chain: links, merkle roots, hashes and work
pub async fn handler(State(state): State<ServiceState>) -> Result<impl IntoResponse, VerifyError> {
    let chain = state.chain().ok_or(VerifyError::NoChain)?;
    let report = chain.verify().await?;
    tracing::info!(blocks = report.blocks, tip = %report.tip, "chain verified");

    Ok((
        http::StatusCode::OK,
        Json(VerifyResponse {
            blocks: report.blocks,
            tip: report.tip,
            difficulty: chain.mining_config().difficulty,
        }),
    )
        .into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("anchors are not kept on a local chain")]
    NoChain,
    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl IntoResponse for VerifyError {
    fn into_response(self) -> Response {
        let status = match &self {
            VerifyError::NoChain => http::StatusCode::NOT_FOUND,
            VerifyError::Chain(ChainError::Integrity(_)) => http::StatusCode::CONFLICT,
            VerifyError::Chain(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status != http::StatusCode::NOT_FOUND {
            tracing::error!("CHAIN VERIFY ERROR: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}

// Client implementation - builds request for this operation
impl ApiRequest for VerifyRequest {
    type Response = VerifyResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = base_url
            .join("/api/v0/chain/verify")
            .expect("static api path joins any base url");
        client.get(full_url)
    }
}
