use std::sync::Arc;
use std::time::Duration;

use url::Url;

use common::anchor::{AnchorRegistry, MemoryAnchorRegistry, RemoteAnchorRegistry, RemoteLedgerConfig};
use common::chain::{ChainAnchorRegistry, ChainError, HashChain, MiningConfig};
use common::content::{ContentStore, MemoryContentStore, PinningClient, PinningConfig};
use common::crypto::Secret;
use common::record::RecordService;
use common::transport::RetryPolicy;

use super::database::{Database, DatabaseSetupError};
use super::service_config::Config;
use super::state::{AnchorConfig, ContentConfig, PINATA_API_KEY_ENV, PINATA_SECRET_API_KEY_ENV};

pub type DynContentStore = Arc<dyn ContentStore>;
pub type DynAnchorRegistry = Arc<dyn AnchorRegistry>;
pub type Records = RecordService<DynContentStore, DynAnchorRegistry, Database>;

/// Shared daemon state: the record pipeline and the stores behind it
#[derive(Clone)]
pub struct State {
    database: Database,
    records: Arc<Records>,
    record_key: Secret,
    /// Set only when anchors live on the local chain
    chain: Option<Arc<HashChain<Database>>>,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        // 1. Setup database
        let database = match config.sqlite_path {
            Some(ref path) => {
                // check that the path exists
                if !path.exists() {
                    return Err(StateSetupError::DatabasePathDoesNotExist);
                }
                let url = Url::parse(&format!("sqlite://{}", path.display()))
                    .map_err(|_| StateSetupError::InvalidDatabaseUrl)?;
                tracing::info!("Database URL: {}", url);
                Database::connect(&url).await?
            }
            // otherwise just set up an in-memory database
            None => {
                tracing::info!("Database URL: sqlite::memory:");
                Database::in_memory().await?
            }
        };

        let retry = RetryPolicy::from(config.retry);

        // 2. Setup content store
        let content = content_store(&config.content, retry)?;

        // 3. Setup anchor registry
        let (anchors, chain) = anchor_registry(&config.anchor, retry, &database).await?;

        let records = RecordService::new(content, anchors, database.clone());

        Ok(Self {
            database,
            records: Arc::new(records),
            record_key: config.record_key.clone(),
            chain,
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn records(&self) -> &Records {
        &self.records
    }

    pub fn record_key(&self) -> &Secret {
        &self.record_key
    }

    pub fn chain(&self) -> Option<&Arc<HashChain<Database>>> {
        self.chain.as_ref()
    }
}

impl AsRef<Database> for State {
    fn as_ref(&self) -> &Database {
        self.database()
    }
}

fn content_store(config: &ContentConfig, retry: RetryPolicy) -> Result<DynContentStore, StateSetupError> {
    match config {
        ContentConfig::Memory => {
            tracing::warn!("using in-memory content store, pinned records will not survive a restart");
            Ok(Arc::new(MemoryContentStore::new()))
        }
        ContentConfig::Pinning {
            api_url,
            gateway_url,
            api_key,
            secret_key,
            timeout_secs,
        } => {
            let mut pinning = PinningConfig::new(api_url.clone(), gateway_url.clone());
            pinning.timeout = Duration::from_secs(*timeout_secs);
            pinning.retry = retry;

            let api_key = api_key.clone().or_else(|| std::env::var(PINATA_API_KEY_ENV).ok());
            let secret_key = secret_key
                .clone()
                .or_else(|| std::env::var(PINATA_SECRET_API_KEY_ENV).ok());
            match (api_key, secret_key) {
                (Some(api_key), Some(secret_key)) => {
                    pinning = pinning.with_credentials(api_key, secret_key);
                }
                _ => tracing::warn!("no pinning credentials configured, uploads may be rejected"),
            }

            tracing::info!(api = %api_url, gateway = %gateway_url, "using pinning content store");
            let client = PinningClient::new(pinning).map_err(|e| StateSetupError::Content(e.to_string()))?;
            Ok(Arc::new(client))
        }
    }
}

async fn anchor_registry(
    config: &AnchorConfig,
    retry: RetryPolicy,
    database: &Database,
) -> Result<(DynAnchorRegistry, Option<Arc<HashChain<Database>>>), StateSetupError> {
    match config {
        AnchorConfig::Memory => {
            tracing::warn!("using in-memory anchor registry, anchors will not survive a restart");
            Ok((Arc::new(MemoryAnchorRegistry::new()), None))
        }
        AnchorConfig::Chain {
            difficulty,
            mining_timeout_secs,
            attempt_budget,
        } => {
            let mining = MiningConfig {
                difficulty: *difficulty,
                timeout: mining_timeout_secs.map(Duration::from_secs),
                attempt_budget: *attempt_budget,
            };
            let chain = Arc::new(HashChain::open(database.clone(), mining).await?);
            let report = chain.verify().await?;
            tracing::info!(blocks = report.blocks, tip = %report.tip, difficulty, "opened anchor chain");

            Ok((Arc::new(ChainAnchorRegistry::new(chain.clone())), Some(chain)))
        }
        AnchorConfig::Remote { endpoint, timeout_secs } => {
            let mut ledger = RemoteLedgerConfig::new(endpoint.clone());
            ledger.timeout = Duration::from_secs(*timeout_secs);
            ledger.retry = retry;

            tracing::info!(%endpoint, "using remote anchor ledger");
            let registry = RemoteAnchorRegistry::new(ledger).map_err(|e| StateSetupError::Anchor(e.to_string()))?;
            Ok((Arc::new(registry), None))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("Database path does not exist")]
    DatabasePathDoesNotExist,
    #[error("Database setup error: {0}")]
    DatabaseSetupError(#[from] DatabaseSetupError),
    #[error("Invalid database URL")]
    InvalidDatabaseUrl,
    #[error("Content store error: {0}")]
    Content(String),
    #[error("Anchor registry error: {0}")]
    Anchor(String),
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AnchorConfig;
    use serde_json::json;

    fn fast_chain() -> AnchorConfig {
        AnchorConfig::Chain {
            difficulty: 1,
            mining_timeout_secs: Some(10),
            attempt_budget: None,
        }
    }

    #[tokio::test]
    async fn test_ephemeral_state_round_trip() {
        let mut config = Config::ephemeral(Secret::generate());
        config.anchor = fast_chain();
        let state = State::from_config(&config).await.unwrap();

        let written = state
            .records()
            .write_record("asha@example.com", &json!({"trip": "Goa"}), state.record_key())
            .await
            .unwrap();
        let document = state
            .records()
            .read_record(written.record_id, state.record_key())
            .await
            .unwrap();

        assert_eq!(document, json!({"trip": "Goa"}));
        assert_eq!(state.chain().unwrap().len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_memory_anchor_has_no_chain() {
        let mut config = Config::ephemeral(Secret::generate());
        config.anchor = AnchorConfig::Memory;
        let state = State::from_config(&config).await.unwrap();
        assert!(state.chain().is_none());
    }

    #[tokio::test]
    async fn test_missing_database_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::ephemeral(Secret::generate());
        config.sqlite_path = Some(dir.path().join("absent.sqlite"));

        assert!(matches!(
            State::from_config(&config).await,
            Err(StateSetupError::DatabasePathDoesNotExist)
        ));
    }

    #[tokio::test]
    async fn test_chain_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("db.sqlite");
        std::fs::write(&db_path, "").unwrap();

        let key = Secret::generate();
        let mut config = Config::ephemeral(key.clone());
        config.anchor = fast_chain();
        config.sqlite_path = Some(db_path);

        let written = {
            let state = State::from_config(&config).await.unwrap();
            state
                .records()
                .anchors()
                .store("k", &common::linked_data::content_cid(b"blob"))
                .await
                .unwrap();
            let written = state.chain().unwrap().len().await.unwrap();
            state.database().close().await;
            written
        };

        let state = State::from_config(&config).await.unwrap();
        assert_eq!(state.chain().unwrap().len().await.unwrap(), written);
        assert_eq!(
            state.records().anchors().lookup("k").await.unwrap(),
            common::linked_data::content_cid(b"blob")
        );
    }
}
