use axum::routing::get;
use axum::Router;

use common::anchor::AnchorError;

pub mod history;
pub mod lookup;
pub mod verify;

pub use history::{HistoryRequest, HistoryResponse};
pub use lookup::{LookupRequest, LookupResponse};
pub use verify::{VerifyAnchorRequest, VerifyAnchorResponse};

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/:key", get(lookup::handler))
        .route("/:key/history", get(history::handler))
        .route("/:key/verify", get(verify::handler))
        .with_state(state)
}

/// Status for a registry failure on the anchor endpoints
fn anchor_status(err: &AnchorError) -> http::StatusCode {
    match err {
        AnchorError::NotFound(_) => http::StatusCode::NOT_FOUND,
        AnchorError::ChainIntegrity(_) => http::StatusCode::CONFLICT,
        AnchorError::Registry(_) | AnchorError::InvalidCid(_) => http::StatusCode::BAD_GATEWAY,
        AnchorError::Unsupported(_) => http::StatusCode::NOT_IMPLEMENTED,
        AnchorError::Mining(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
    }
}
