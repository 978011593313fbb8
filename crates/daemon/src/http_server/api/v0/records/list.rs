use axum::extract::{Json, Query, State};
use axum::response::{IntoResponse, Response};
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::record::{IndexError, RecordIndex, RecordIndexEntry};

use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Default, Serialize, Deserialize, clap::Args)]
pub struct ListRequest {
    /// Only list records anchored under this key
    #[arg(long)]
    pub anchor_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub records: Vec<RecordIndexEntry>,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Query(req): Query<ListRequest>,
) -> Result<impl IntoResponse, ListError> {
    let mut records = state.records().index().list().await?;
    if let Some(key) = &req.anchor_key {
        records.retain(|entry| &entry.anchor_key == key);
    }

    Ok((http::StatusCode::OK, Json(ListResponse { records })).into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum ListError {
    #[error("record index error: {0}")]
    Index(#[from] IndexError),
}

impl IntoResponse for ListError {
    fn into_response(self) -> Response {
        tracing::error!("LIST RECORDS ERROR: {}", self);
        (http::StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

// Client implementation - builds request for this operation
impl ApiRequest for ListRequest {
    type Response = ListResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = base_url
            .join("/api/v0/records")
            .expect("static api path joins any base url");
        let request = client.get(full_url);
        match self.anchor_key {
            Some(key) => request.query(&[("anchor_key", key)]),
            None => request,
        }
    }
}
