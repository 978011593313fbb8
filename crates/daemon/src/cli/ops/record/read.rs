use safetour_daemon::http_server::api::client::ApiError;
use safetour_daemon::http_server::api::v0::records::ReadRequest;

#[derive(Debug, thiserror::Error)]
pub enum RecordReadError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("failed to render document: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for ReadRequest {
    type Error = RecordReadError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let response = ctx.call(self.clone()).await?;
        Ok(serde_json::to_string_pretty(&response.document)?)
    }
}
