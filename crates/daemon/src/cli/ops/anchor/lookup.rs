use safetour_daemon::http_server::api::client::ApiError;
use safetour_daemon::http_server::api::v0::anchors::LookupRequest;

#[derive(Debug, thiserror::Error)]
pub enum AnchorLookupError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for LookupRequest {
    type Error = AnchorLookupError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let response = ctx.call(self.clone()).await?;
        Ok(format!("{} -> {}", response.key, response.cid))
    }
}
