use axum::Router;

pub mod anchors;
pub mod chain;
pub mod records;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .nest("/records", records::router(state.clone()))
        .nest("/anchors", anchors::router(state.clone()))
        .nest("/chain", chain::router(state.clone()))
        .with_state(state)
}
