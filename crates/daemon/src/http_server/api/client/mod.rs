//! Typed client for the daemon's HTTP API
//!
//! Every request type in [`crate::http_server::api::v0`] implements
//!  [`ApiRequest`] next to its handler, so the CLI and the server can never
//!  disagree about a route or a payload.

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;

#[allow(clippy::module_inception)]
mod client;
mod error;

pub use client::ApiClient;
pub use error::ApiError;

pub trait ApiRequest {
    type Response: DeserializeOwned;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder;
}
