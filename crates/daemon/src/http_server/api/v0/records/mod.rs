use axum::routing::get;
use axum::Router;

pub mod list;
pub mod read;
pub mod write;

pub use list::{ListRequest, ListResponse};
pub use read::{ReadRequest, ReadResponse};
pub use write::{WriteRequest, WriteResponse};

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/", get(list::handler).post(write::handler))
        .route("/:record_id", get(read::handler))
        .with_state(state)
}
