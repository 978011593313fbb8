use std::path::PathBuf;

use clap::Args;

use safetour_daemon::http_server::api::client::ApiError;
use safetour_daemon::http_server::api::v0::records::WriteRequest;

#[derive(Args, Debug, Clone)]
pub struct Write {
    /// Key to anchor the record under, e.g. the tourist's email
    #[arg(long)]
    pub anchor_key: String,

    /// Inline JSON document
    #[arg(long, group = "source")]
    pub document: Option<String>,

    /// Read the JSON document from a file
    #[arg(long, group = "source")]
    pub file: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum RecordWriteError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),
    #[error("document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Either --document or --file must be provided")]
    NoDocument,
}

impl Write {
    fn document(&self) -> Result<serde_json::Value, RecordWriteError> {
        let text = match (&self.document, &self.file) {
            (Some(inline), _) => inline.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)?,
            (None, None) => return Err(RecordWriteError::NoDocument),
        };
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Write {
    type Error = RecordWriteError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let request = WriteRequest {
            anchor_key: self.anchor_key.clone(),
            document: self.document()?,
        };
        let response = ctx.call(request).await?;

        Ok(format!(
            "Record {} anchored under {} as {}",
            response.record_id, response.anchor_key, response.cid
        ))
    }
}
