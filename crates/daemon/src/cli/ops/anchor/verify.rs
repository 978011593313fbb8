use safetour_daemon::http_server::api::client::ApiError;
use safetour_daemon::http_server::api::v0::anchors::VerifyAnchorRequest;

#[derive(Debug, thiserror::Error)]
pub enum AnchorVerifyError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for VerifyAnchorRequest {
    type Error = AnchorVerifyError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let verification = ctx.call(self.clone()).await?;
        Ok(match (verification.current, verification.current_cid) {
            (true, _) => format!("{} is the current anchor of {}", verification.cid, verification.key),
            (false, Some(current)) => format!(
                "{} is not current, {} resolves to {}",
                verification.cid, verification.key, current
            ),
            (false, None) => format!("Nothing anchored under {}", verification.key),
        })
    }
}
