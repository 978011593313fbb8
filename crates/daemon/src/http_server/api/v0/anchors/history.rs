use axum::extract::{Json, Path, Query, State};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::anchor::{anchor_history, AnchorError, AnchorHistory, HistoryRange};

use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize, clap::Args)]
pub struct HistoryRequest {
    /// Anchor key to list, e.g. the tourist's email
    #[arg(long)]
    pub key: String,
    /// Only events anchored at or after this time (RFC 3339)
    #[arg(long)]
    pub start: Option<DateTime<Utc>>,
    /// Only events anchored at or before this time (RFC 3339)
    #[arg(long)]
    pub end: Option<DateTime<Utc>>,
}

pub type HistoryResponse = AnchorHistory;

/// Every anchoring of a key, newest first, with summary statistics
pub async fn handler(
    State(state): State<ServiceState>,
    Path(key): Path<String>,
    Query(range): Query<HistoryRange>,
) -> Result<impl IntoResponse, HistoryError> {
    if let (Some(start), Some(end)) = (range.start, range.end) {
        if start > end {
            return Err(HistoryError::InvalidRange);
        }
    }

    let history = anchor_history(state.records().anchors(), &key, &range).await?;
    Ok((http::StatusCode::OK, Json(history)).into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("start must not be after end")]
    InvalidRange,
    #[error(transparent)]
    Anchor(#[from] AnchorError),
}

impl IntoResponse for HistoryError {
    fn into_response(self) -> Response {
        let status = match &self {
            HistoryError::InvalidRange => http::StatusCode::BAD_REQUEST,
            HistoryError::Anchor(err) => super::anchor_status(err),
        };
        if status.is_server_error() || status == http::StatusCode::CONFLICT {
            tracing::error!("ANCHOR HISTORY ERROR: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}

// Client implementation - builds request for this operation
impl ApiRequest for HistoryRequest {
    type Response = HistoryResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let mut full_url = base_url
            .join("/api/v0/anchors")
            .expect("static api path joins any base url");
        if let Ok(mut segments) = full_url.path_segments_mut() {
            segments.push(&self.key).push("history");
        }

        let mut query = Vec::new();
        if let Some(start) = self.start {
            query.push(("start", start.to_rfc3339()));
        }
        if let Some(end) = self.end {
            query.push(("end", end.to_rfc3339()));
        }
        client.get(full_url).query(&query)
    }
}
