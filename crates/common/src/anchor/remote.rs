use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{AnchorError, AnchorRegistry};
use crate::linked_data::{parse_cid, Cid};
use crate::transport::{endpoint, retry, RetryPolicy, Transient, DEFAULT_REQUEST_TIMEOUT};

/// Where the ledger contract gateway lives and how patiently to call it
#[derive(Debug, Clone)]
pub struct RemoteLedgerConfig {
    pub endpoint: Url,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl RemoteLedgerConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct StoreCidRequest<'a> {
    hash: &'a str,
    cid: String,
}

#[derive(Debug, Deserialize)]
struct StoreCidResponse {
    #[serde(default)]
    confirmed: bool,
    #[serde(default)]
    tx: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetCidRequest<'a> {
    hash: &'a str,
}

#[derive(Debug, Deserialize)]
struct GetCidResponse {
    #[serde(default)]
    cid: String,
}

/// Failure of a single ledger call, split by whether it is worth repeating
#[derive(Debug)]
enum CallError {
    Retryable(String),
    Fatal(AnchorError),
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallError::Retryable(message) => write!(f, "{}", message),
            CallError::Fatal(e) => write!(f, "{}", e),
        }
    }
}

impl Transient for CallError {
    fn is_transient(&self) -> bool {
        matches!(self, CallError::Retryable(_))
    }
}

impl From<CallError> for AnchorError {
    fn from(e: CallError) -> Self {
        match e {
            CallError::Retryable(message) => AnchorError::Registry(message),
            CallError::Fatal(e) => e,
        }
    }
}

/// Anchor registry backed by a ledger contract exposing `storeCid` / `getCid`
///  over HTTP
///
/// `store` waits for the gateway to report the transaction as confirmed.
#[derive(Debug, Clone)]
pub struct RemoteAnchorRegistry {
    config: RemoteLedgerConfig,
    client: Client,
}

impl RemoteAnchorRegistry {
    pub fn new(config: RemoteLedgerConfig) -> Result<Self, AnchorError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AnchorError::Registry(format!("failed to build http client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn url(&self, method: &str) -> Result<Url, AnchorError> {
        endpoint(&self.config.endpoint, &[method]).map_err(AnchorError::Registry)
    }

    async fn try_store(&self, url: Url, key: &str, cid: &Cid) -> Result<Option<String>, CallError> {
        let request = StoreCidRequest {
            hash: key,
            cid: cid.to_string(),
        };
        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CallError::Retryable(format!("storeCid transport error: {}", e)))?;
        let response = check_status(response, "storeCid").await?;

        let receipt: StoreCidResponse = response.json().await.map_err(|e| {
            CallError::Fatal(AnchorError::Registry(format!(
                "unexpected storeCid response: {}",
                e
            )))
        })?;
        if !receipt.confirmed {
            return Err(CallError::Fatal(AnchorError::Registry(format!(
                "storeCid for {:?} was not confirmed",
                key
            ))));
        }
        Ok(receipt.tx)
    }

    async fn try_lookup(&self, url: Url, key: &str) -> Result<Cid, CallError> {
        let response = self
            .client
            .post(url)
            .json(&GetCidRequest { hash: key })
            .send()
            .await
            .map_err(|e| CallError::Retryable(format!("getCid transport error: {}", e)))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(CallError::Fatal(AnchorError::NotFound(key.to_string())));
        }
        let response = check_status(response, "getCid").await?;

        let found: GetCidResponse = response.json().await.map_err(|e| {
            CallError::Fatal(AnchorError::Registry(format!(
                "unexpected getCid response: {}",
                e
            )))
        })?;
        // the contract returns an empty string for unknown keys
        let raw = found.cid.trim();
        if raw.is_empty() {
            return Err(CallError::Fatal(AnchorError::NotFound(key.to_string())));
        }
        parse_cid(raw).map_err(|e| {
            CallError::Fatal(AnchorError::InvalidCid(format!("{}: {}", raw, e)))
        })
    }
}

async fn check_status(
    response: reqwest::Response,
    method: &str,
) -> Result<reqwest::Response, CallError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = format!("{} returned {}: {}", method, status, body);
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(CallError::Retryable(message))
    } else {
        Err(CallError::Fatal(AnchorError::Registry(message)))
    }
}

#[async_trait]
impl AnchorRegistry for RemoteAnchorRegistry {
    async fn store(&self, key: &str, cid: &Cid) -> Result<(), AnchorError> {
        let url = self.url("storeCid")?;
        let tx = retry(&self.config.retry, "storeCid", || {
            self.try_store(url.clone(), key, cid)
        })
        .await?;
        tracing::info!(key, %cid, tx = tx.as_deref().unwrap_or("-"), "anchored cid on ledger");
        Ok(())
    }

    async fn lookup(&self, key: &str) -> Result<Cid, AnchorError> {
        let url = self.url("getCid")?;
        let cid = retry(&self.config.retry, "getCid", || {
            self.try_lookup(url.clone(), key)
        })
        .await?;
        Ok(cid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_response_defaults_to_unconfirmed() {
        let receipt: StoreCidResponse = serde_json::from_str("{}").unwrap();
        assert!(!receipt.confirmed);
        assert!(receipt.tx.is_none());
    }

    #[test]
    fn test_request_shape() {
        let body = serde_json::to_value(StoreCidRequest {
            hash: "tourist@example.com",
            cid: "bafy".to_string(),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"hash": "tourist@example.com", "cid": "bafy"}));
    }

    #[test]
    fn test_url_keeps_endpoint_path() {
        let registry = RemoteAnchorRegistry::new(RemoteLedgerConfig::new(
            Url::parse("http://localhost:8545/contract").unwrap(),
        ))
        .unwrap();
        assert_eq!(
            registry.url("getCid").unwrap().as_str(),
            "http://localhost:8545/contract/getCid"
        );
    }

    #[tokio::test]
    async fn test_history_is_unsupported() {
        let registry = RemoteAnchorRegistry::new(RemoteLedgerConfig::new(
            Url::parse("http://localhost:8545").unwrap(),
        ))
        .unwrap();
        assert!(matches!(
            registry.history("k", &crate::anchor::HistoryRange::all()).await,
            Err(AnchorError::Unsupported(_))
        ));
    }
}
