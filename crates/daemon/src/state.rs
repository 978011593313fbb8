use std::time::Duration;
use std::{fs, path::PathBuf};

use common::crypto::Secret;
use common::transport::RetryPolicy;
use serde::{Deserialize, Serialize};
use url::Url;

pub const APP_NAME: &str = "safetour";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DB_FILE_NAME: &str = "db.sqlite";
pub const KEY_FILE_NAME: &str = "record.key";

/// Hex record key that takes precedence over the key file
pub const RECORD_KEY_ENV: &str = "SAFETOUR_RECORD_KEY";
/// Pinning credentials used when the config file carries none
pub const PINATA_API_KEY_ENV: &str = "PINATA_API_KEY";
pub const PINATA_SECRET_API_KEY_ENV: &str = "PINATA_SECRET_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Port for the API server
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Default tracing directive, `RUST_LOG` still wins
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub anchor: AnchorConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_api_port() -> u16 {
    5001
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            log_level: default_log_level(),
            content: ContentConfig::default(),
            anchor: AnchorConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// Where encrypted blobs are pinned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentConfig {
    /// Keep blobs in process memory. Nothing survives a restart.
    #[default]
    Memory,

    /// A Pinata-compatible pinning service plus an IPFS gateway
    Pinning {
        #[serde(default = "default_pinning_api_url")]
        api_url: Url,
        #[serde(default = "default_gateway_url")]
        gateway_url: Url,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default)]
        secret_key: Option<String>,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_pinning_api_url() -> Url {
    Url::parse(common::content::DEFAULT_PINNING_API_URL).expect("valid default pinning url")
}

fn default_gateway_url() -> Url {
    Url::parse(common::content::DEFAULT_GATEWAY_URL).expect("valid default gateway url")
}

/// Which registry is authoritative for anchors, reads included
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnchorConfig {
    /// In-memory map. Nothing survives a restart.
    Memory,

    /// Local proof-of-work chain stored in the daemon's database
    Chain {
        #[serde(default = "default_difficulty")]
        difficulty: usize,
        #[serde(default = "default_mining_timeout_secs")]
        mining_timeout_secs: Option<u64>,
        #[serde(default)]
        attempt_budget: Option<u64>,
    },

    /// Ledger contract reached through an HTTP gateway (`storeCid` / `getCid`)
    Remote {
        endpoint: Url,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_difficulty() -> usize {
    3
}

fn default_mining_timeout_secs() -> Option<u64> {
    Some(30)
}

impl Default for AnchorConfig {
    fn default() -> Self {
        AnchorConfig::Chain {
            difficulty: default_difficulty(),
            mining_timeout_secs: default_mining_timeout_secs(),
            attempt_budget: None,
        }
    }
}

/// Retry settings for calls to remote services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    2000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the state directory (~/.safetour)
    pub state_dir: PathBuf,
    /// Path to the SQLite database
    pub db_path: PathBuf,
    /// Path to the hex encoded record key
    pub key_path: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the state directory path (custom or default ~/.safetour)
    pub fn state_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new state directory with a fresh record key
    pub fn init(custom_path: Option<PathBuf>, config: Option<AppConfig>) -> Result<Self, StateError> {
        let state_dir = Self::state_dir(custom_path)?;
        if state_dir.join(CONFIG_FILE_NAME).exists() {
            return Err(StateError::AlreadyInitialized);
        }
        fs::create_dir_all(&state_dir)?;

        let key_path = state_dir.join(KEY_FILE_NAME);
        write_private(&key_path, &Secret::generate().to_hex())?;

        let config = config.unwrap_or_default();
        let config_path = state_dir.join(CONFIG_FILE_NAME);
        fs::write(&config_path, toml::to_string_pretty(&config)?)?;

        // the daemon creates the schema on first start
        let db_path = state_dir.join(DB_FILE_NAME);
        fs::write(&db_path, "")?;

        Ok(Self {
            state_dir,
            db_path,
            key_path,
            config_path,
            config,
        })
    }

    /// Load existing state from the state directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let state_dir = Self::state_dir(custom_path)?;
        if !state_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let db_path = state_dir.join(DB_FILE_NAME);
        let key_path = state_dir.join(KEY_FILE_NAME);
        let config_path = state_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            state_dir,
            db_path,
            key_path,
            config_path,
            config,
        })
    }

    /// Load the record key, preferring the environment over the key file
    ///
    /// There is no fallback key: a missing or malformed key is an error.
    pub fn load_record_key(&self) -> Result<Secret, StateError> {
        if let Ok(hex) = std::env::var(RECORD_KEY_ENV) {
            return Secret::from_hex(hex.trim())
                .map_err(|e| StateError::InvalidKey(format!("{}: {}", RECORD_KEY_ENV, e)));
        }

        if !self.key_path.exists() {
            return Err(StateError::MissingKey(self.key_path.clone()));
        }
        let hex = fs::read_to_string(&self.key_path)?;
        Secret::from_hex(hex.trim()).map_err(|e| StateError::InvalidKey(e.to_string()))
    }
}

#[cfg(unix)]
fn write_private(path: &std::path::Path, contents: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents.as_bytes())
}

#[cfg(not(unix))]
fn write_private(path: &std::path::Path, contents: &str) -> std::io::Result<()> {
    fs::write(path, contents)
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("safetour directory not initialized. Run 'safetour init' first")]
    NotInitialized,

    #[error("safetour directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("no record key: set {RECORD_KEY_ENV} or create {0}")]
    MissingKey(PathBuf),

    #[error("invalid record key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
