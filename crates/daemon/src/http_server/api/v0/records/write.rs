use axum::extract::{Json, State};
use axum::response::{IntoResponse, Response};
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::anchor::AnchorError;
use common::content::ContentError;
use common::linked_data::{cid_string, Cid};
use common::record::{PipelineError, RecordError};

use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRequest {
    /// Key the record is anchored under, e.g. the tourist's email
    pub anchor_key: String,
    /// Document to encrypt, pin and anchor
    pub document: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResponse {
    pub record_id: Uuid,
    pub anchor_key: String,
    #[serde(with = "cid_string")]
    pub cid: Cid,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<WriteRequest>,
) -> Result<impl IntoResponse, WriteError> {
    let written = state
        .records()
        .write_record(&req.anchor_key, &req.document, state.record_key())
        .await?;

    Ok((
        http::StatusCode::CREATED,
        Json(WriteResponse {
            record_id: written.record_id,
            anchor_key: req.anchor_key,
            cid: written.cid,
        }),
    )
        .into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error(transparent)]
    Record(#[from] RecordError),
}

impl IntoResponse for WriteError {
    fn into_response(self) -> Response {
        let WriteError::Record(err) = self;
        let status = match &err {
            RecordError::EmptyAnchorKey => http::StatusCode::BAD_REQUEST,
            RecordError::Write { source, .. } => match source {
                PipelineError::Content(ContentError::Network(_))
                | PipelineError::Content(ContentError::Upload(_))
                | PipelineError::Content(ContentError::Rejected { .. })
                | PipelineError::Anchor(AnchorError::Registry(_)) => http::StatusCode::BAD_GATEWAY,
                PipelineError::Anchor(AnchorError::Mining(_)) => {
                    http::StatusCode::SERVICE_UNAVAILABLE
                }
                PipelineError::Anchor(AnchorError::ChainIntegrity(_)) => http::StatusCode::CONFLICT,
                _ => http::StatusCode::INTERNAL_SERVER_ERROR,
            },
            _ => http::StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("WRITE RECORD ERROR: {}", err);
        } else {
            tracing::warn!("WRITE RECORD rejected: {}", err);
        }
        (status, err.to_string()).into_response()
    }
}

// Client implementation - builds request for this operation
impl ApiRequest for WriteRequest {
    type Response = WriteResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = base_url
            .join("/api/v0/records")
            .expect("static api path joins any base url");
        client.post(full_url).json(&self)
    }
}
