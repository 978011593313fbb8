use std::path::PathBuf;

use common::crypto::Secret;

use crate::state::{AnchorConfig, ContentConfig, RetryConfig};

#[derive(Debug, Clone)]
pub struct Config {
    // pipeline configuration
    /// Where encrypted blobs are pinned
    pub content: ContentConfig,
    /// Which registry anchors records
    pub anchor: AnchorConfig,
    /// Retry settings for remote services
    pub retry: RetryConfig,
    /// Key every record is encrypted under
    pub record_key: Secret,

    // http server configuration
    /// Port for the API HTTP server
    pub api_port: u16,

    // data store configuration
    /// a path to a sqlite database, if not set then an
    ///  in-memory database will be used
    pub sqlite_path: Option<PathBuf>,

    // logging
    /// Default tracing directive, e.g. `info` or `safetour_daemon=debug`
    pub log_level: String,
    /// Directory for log files (optional, logs to stdout only if not set)
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// A throwaway configuration: in-memory stores and database, chain anchoring
    pub fn ephemeral(record_key: Secret) -> Self {
        Self {
            content: ContentConfig::Memory,
            anchor: AnchorConfig::default(),
            retry: RetryConfig::default(),
            record_key,
            api_port: 0,
            sqlite_path: None,
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}
