use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("HTTP status {0}: {1}")]
    HttpStatus(StatusCode, String),
}

impl ApiError {
    /// Whether the daemon answered 404 for the requested resource
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::HttpStatus(status, _) if *status == StatusCode::NOT_FOUND)
    }
}
