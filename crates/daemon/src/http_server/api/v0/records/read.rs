use axum::extract::{Json, Path, State};
use axum::response::{IntoResponse, Response};
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::anchor::AnchorError;
use common::content::ContentError;
use common::record::{PipelineError, RecordError};

use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize, clap::Args)]
pub struct ReadRequest {
    /// Id returned when the record was written
    #[arg(long)]
    pub record_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResponse {
    pub record_id: Uuid,
    pub document: serde_json::Value,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Path(record_id): Path<Uuid>,
) -> Result<impl IntoResponse, ReadError> {
    let document = state
        .records()
        .read_record(record_id, state.record_key())
        .await?;

    Ok((
        http::StatusCode::OK,
        Json(ReadResponse {
            record_id,
            document,
        }),
    )
        .into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error(transparent)]
    Record(#[from] RecordError),
}

impl IntoResponse for ReadError {
    fn into_response(self) -> Response {
        let ReadError::Record(err) = self;
        let status = if err.is_not_found() {
            http::StatusCode::NOT_FOUND
        } else if err.is_decryption() {
            http::StatusCode::UNPROCESSABLE_ENTITY
        } else {
            match &err {
                RecordError::Read {
                    source: PipelineError::Anchor(AnchorError::ChainIntegrity(_)),
                    ..
                } => http::StatusCode::CONFLICT,
                RecordError::Read {
                    source: PipelineError::Content(ContentError::Network(_))
                        | PipelineError::Content(ContentError::Rejected { .. })
                        | PipelineError::Anchor(AnchorError::Registry(_)),
                    ..
                } => http::StatusCode::BAD_GATEWAY,
                _ => http::StatusCode::INTERNAL_SERVER_ERROR,
            }
        };

        if status == http::StatusCode::NOT_FOUND {
            tracing::debug!("READ RECORD: {}", err);
        } else {
            tracing::error!("READ RECORD ERROR: {}", err);
        }
        (status, err.to_string()).into_response()
    }
}

// Client implementation - builds request for this operation
impl ApiRequest for ReadRequest {
    type Response = ReadResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = base_url
            .join(&format!("/api/v0/records/{}", self.record_id))
            .expect("record path joins any base url");
        client.get(full_url)
    }
}
