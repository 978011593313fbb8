use safetour_daemon::http_server::api::client::ApiError;
use safetour_daemon::http_server::api::v0::anchors::HistoryRequest;

#[derive(Debug, thiserror::Error)]
pub enum AnchorHistoryError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for HistoryRequest {
    type Error = AnchorHistoryError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let history = ctx.call(self.clone()).await?;
        if history.events.is_empty() {
            return Ok(format!("Nothing anchored under {}", history.key));
        }

        let mut lines: Vec<String> = history
            .events
            .iter()
            .map(|event| {
                let block = event
                    .block
                    .map(|id| format!("  block {}", id))
                    .unwrap_or_default();
                format!("{}  {}{}", event.anchored_at.to_rfc3339(), event.cid, block)
            })
            .collect();
        lines.push(format!(
            "{} events, {} distinct cids",
            history.statistics.total_events, history.statistics.distinct_cids
        ));
        Ok(lines.join("\n"))
    }
}
