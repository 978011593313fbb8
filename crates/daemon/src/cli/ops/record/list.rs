use safetour_daemon::http_server::api::client::ApiError;
use safetour_daemon::http_server::api::v0::records::ListRequest;

#[derive(Debug, thiserror::Error)]
pub enum RecordListError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for ListRequest {
    type Error = RecordListError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let response = ctx.call(self.clone()).await?;

        if response.records.is_empty() {
            return Ok("No records found".to_string());
        }
        Ok(response
            .records
            .iter()
            .map(|entry| {
                format!(
                    "{}  {}  {}  {}",
                    entry.record_id,
                    entry.created_at.to_rfc3339(),
                    entry.anchor_key,
                    entry.cid
                )
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
