use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use super::{ContentError, ContentStore};
use crate::linked_data::{parse_cid, Cid};
use crate::transport::{endpoint, retry, RetryPolicy, DEFAULT_REQUEST_TIMEOUT};

pub const DEFAULT_PINNING_API_URL: &str = "https://api.pinata.cloud";
pub const DEFAULT_GATEWAY_URL: &str = "https://gateway.pinata.cloud/ipfs";

/// Connection settings for a Pinata-compatible pinning service
#[derive(Debug, Clone)]
pub struct PinningConfig {
    pub api_url: Url,
    pub gateway_url: Url,
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl PinningConfig {
    pub fn new(api_url: Url, gateway_url: Url) -> Self {
        Self {
            api_url,
            gateway_url,
            api_key: None,
            secret_key: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_credentials(mut self, api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }
}

impl Default for PinningConfig {
    fn default() -> Self {
        // both constants are well-formed urls
        Self::new(
            Url::parse(DEFAULT_PINNING_API_URL).expect("valid default pinning url"),
            Url::parse(DEFAULT_GATEWAY_URL).expect("valid default gateway url"),
        )
    }
}

/// Pin response. Pinata reports `IpfsHash`, simpler services report `cid`.
#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(alias = "IpfsHash")]
    cid: String,
}

/// Uploads blobs through the pinning API and reads them back through a gateway
#[derive(Debug, Clone)]
pub struct PinningClient {
    config: PinningConfig,
    client: Client,
}

impl PinningClient {
    pub fn new(config: PinningConfig) -> Result<Self, ContentError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ContentError::Store(format!("failed to build http client: {}", e)))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &PinningConfig {
        &self.config
    }

    async fn try_put(&self, url: Url, blob: Bytes, name: &str) -> Result<Cid, ContentError> {
        let part = Part::bytes(blob.to_vec())
            .file_name(name.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| ContentError::Upload(e.to_string()))?;
        let metadata = serde_json::json!({ "name": name }).to_string();
        let form = Form::new()
            .part("file", part)
            .text("pinataMetadata", metadata);

        let mut request = self.client.post(url).multipart(form);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("pinata_api_key", api_key);
        }
        if let Some(secret_key) = &self.config.secret_key {
            request = request.header("pinata_secret_api_key", secret_key);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if is_retryable(status) {
                ContentError::Network(format!("pinning service returned {}: {}", status, body))
            } else {
                ContentError::Upload(format!("pinning service returned {}: {}", status, body))
            });
        }

        let pinned: PinResponse = response
            .json()
            .await
            .map_err(|e| ContentError::Upload(format!("unexpected pin response: {}", e)))?;
        parse_cid(pinned.cid.trim()).map_err(|e| ContentError::InvalidCid(format!("{}: {}", pinned.cid, e)))
    }

    async fn try_get(&self, url: Url, cid: &Cid) -> Result<Bytes, ContentError> {
        let response = self.client.get(url).send().await.map_err(transport_error)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ContentError::NotFound(*cid));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if is_retryable(status) {
                ContentError::Network(format!("gateway returned {}: {}", status, body))
            } else {
                ContentError::Rejected {
                    status: status.as_u16(),
                    message: body,
                }
            });
        }
        response.bytes().await.map_err(transport_error)
    }
}

#[async_trait]
impl ContentStore for PinningClient {
    async fn put(&self, blob: Bytes, name: &str) -> Result<Cid, ContentError> {
        let url = endpoint(&self.config.api_url, &["pinning", "pinFileToIPFS"])
            .map_err(ContentError::Upload)?;
        let cid = retry(&self.config.retry, "pin upload", || {
            self.try_put(url.clone(), blob.clone(), name)
        })
        .await?;
        tracing::info!(name, %cid, "pinned blob");
        Ok(cid)
    }

    async fn get(&self, cid: &Cid) -> Result<Bytes, ContentError> {
        let segment = cid.to_string();
        let url = endpoint(&self.config.gateway_url, &[segment.as_str()])
            .map_err(ContentError::Store)?;
        retry(&self.config.retry, "gateway fetch", || {
            self.try_get(url.clone(), cid)
        })
        .await
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn transport_error(e: reqwest::Error) -> ContentError {
    ContentError::Network(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_response_accepts_both_shapes() {
        let pinata: PinResponse =
            serde_json::from_str(r#"{"IpfsHash":"bafy1","PinSize":10,"Timestamp":"now"}"#).unwrap();
        assert_eq!(pinata.cid, "bafy1");

        let plain: PinResponse = serde_json::from_str(r#"{"cid":"bafy2"}"#).unwrap();
        assert_eq!(plain.cid, "bafy2");
    }

    #[test]
    fn test_status_classification() {
        assert!(is_retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_default_config() {
        let config = PinningConfig::default();
        assert_eq!(config.gateway_url.as_str(), DEFAULT_GATEWAY_URL);
        assert!(config.api_key.is_none());
        assert_eq!(config.timeout, DEFAULT_REQUEST_TIMEOUT);
    }
}
