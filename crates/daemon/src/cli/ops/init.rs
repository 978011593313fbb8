use clap::{Args, ValueEnum};
use url::Url;

use common::content::{DEFAULT_GATEWAY_URL, DEFAULT_PINNING_API_URL};
use safetour_daemon::state::{AnchorConfig, AppConfig, AppState, ContentConfig, StateError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ContentBackend {
    /// Keep blobs in daemon memory
    Memory,
    /// Pin blobs through a Pinata-compatible service
    Pinning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AnchorBackend {
    Memory,
    /// Local proof-of-work chain in the daemon database
    Chain,
    /// Ledger contract behind an HTTP gateway
    Remote,
}

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// API server port
    #[arg(long, default_value_t = 5001)]
    pub api_port: u16,

    /// Where encrypted records are pinned
    #[arg(long, value_enum, default_value_t = ContentBackend::Memory)]
    pub content: ContentBackend,

    /// Pinning service API url
    #[arg(long, default_value = DEFAULT_PINNING_API_URL)]
    pub pinning_api_url: Url,

    /// IPFS gateway records are fetched from
    #[arg(long, default_value = DEFAULT_GATEWAY_URL)]
    pub gateway_url: Url,

    /// Where record CIDs are anchored
    #[arg(long, value_enum, default_value_t = AnchorBackend::Chain)]
    pub anchor: AnchorBackend,

    /// Leading zero hex digits required of every chain block
    #[arg(long, default_value_t = 3)]
    pub difficulty: usize,

    /// Ledger gateway url, required with `--anchor remote`
    #[arg(long, required_if_eq("anchor", "remote"))]
    pub ledger_url: Option<Url>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] StateError),
    #[error("--ledger-url is required with --anchor remote")]
    MissingLedgerUrl,
}

impl Init {
    fn config(&self) -> Result<AppConfig, InitError> {
        let content = match self.content {
            ContentBackend::Memory => ContentConfig::Memory,
            ContentBackend::Pinning => ContentConfig::Pinning {
                api_url: self.pinning_api_url.clone(),
                gateway_url: self.gateway_url.clone(),
                // credentials come from PINATA_API_KEY / PINATA_SECRET_API_KEY
                api_key: None,
                secret_key: None,
                timeout_secs: 30,
            },
        };
        let anchor = match self.anchor {
            AnchorBackend::Memory => AnchorConfig::Memory,
            AnchorBackend::Chain => AnchorConfig::Chain {
                difficulty: self.difficulty,
                mining_timeout_secs: Some(30),
                attempt_budget: None,
            },
            AnchorBackend::Remote => AnchorConfig::Remote {
                endpoint: self.ledger_url.clone().ok_or(InitError::MissingLedgerUrl)?,
                timeout_secs: 30,
            },
        };

        Ok(AppConfig {
            api_port: self.api_port,
            content,
            anchor,
            ..AppConfig::default()
        })
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::init(ctx.config_path.clone(), Some(self.config()?))?;

        let content = match &state.config.content {
            ContentConfig::Memory => "memory (not durable)".to_string(),
            ContentConfig::Pinning { api_url, .. } => format!("pinning via {}", api_url),
        };
        let anchor = match &state.config.anchor {
            AnchorConfig::Memory => "memory (not durable)".to_string(),
            AnchorConfig::Chain { difficulty, .. } => format!("local chain, difficulty {}", difficulty),
            AnchorConfig::Remote { endpoint, .. } => format!("remote ledger at {}", endpoint),
        };

        Ok(format!(
            "Initialized safetour directory at: {}\n\
             - Database: {}\n\
             - Record key: {}\n\
             - Config: {}\n\
             - API port: {}\n\
             - Content store: {}\n\
             - Anchors: {}",
            state.state_dir.display(),
            state.db_path.display(),
            state.key_path.display(),
            state.config_path.display(),
            state.config.api_port,
            content,
            anchor,
        ))
    }
}
