use safetour_daemon::http_server::api::client::ApiError;
use safetour_daemon::http_server::api::v0::chain::VerifyRequest;

#[derive(Debug, thiserror::Error)]
pub enum ChainVerifyError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for VerifyRequest {
    type Error = ChainVerifyError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let response = ctx.call(self.clone()).await?;
        Ok(format!(
            "Chain OK: {} blocks at difficulty {}, tip {}",
            response.blocks, response.difficulty, response.tip
        ))
    }
}
