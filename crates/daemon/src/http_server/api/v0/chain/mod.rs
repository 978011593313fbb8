use axum::routing::get;
use axum::Router;

pub mod verify;

pub use verify::{VerifyRequest, VerifyResponse};

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/verify", get(verify::handler))
        .with_state(state)
}
