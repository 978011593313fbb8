pub mod utils;

use std::net::SocketAddr;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::http_server;
use crate::{ServiceConfig, ServiceState};

/// How long the API gets to drain after shutdown is signalled
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
const LOG_FILE_NAME: &str = "safetour.log";

/// Exit status when the vault cannot be opened, including a chain that fails verification
const EXIT_STATE_SETUP: i32 = 3;
/// Exit status when the API does not drain in time
const EXIT_DRAIN_TIMEOUT: i32 = 4;

/// A running vault daemon
///
/// Holds the API task and the shutdown signal. Dropping it leaves the API
///  running; call [`ShutdownHandle::shutdown`] and then [`ShutdownHandle::wait`].
pub struct ShutdownHandle {
    signals: JoinHandle<()>,
    api: JoinHandle<()>,
    shutdown_tx: watch::Sender<()>,
}

impl ShutdownHandle {
    /// Wait for a signal or [`ShutdownHandle::shutdown`], then for the API to drain
    pub async fn wait(self) {
        let _ = self.signals.await;
        drain(vec![self.api]).await;
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Configured directive, unless `RUST_LOG` says otherwise
fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::builder()
        .parse_lossy(std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| default_directive.to_string()))
}

/// Compact logs on stdout, plus daily rolling files when a log directory is set
///
/// The returned guards flush the non-blocking writers and must outlive the daemon.
fn init_logging(config: &ServiceConfig) -> Vec<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::fmt::format::FmtSpan;

    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let mut guards = vec![stdout_guard];
    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout_writer)
        .with_filter(env_filter(&config.log_level));

    let file_layer = config.log_dir.as_ref().and_then(|log_dir| {
        if let Err(e) = std::fs::create_dir_all(log_dir) {
            eprintln!("cannot create log directory {:?}, logging to stdout only: {}", log_dir, e);
            return None;
        }
        let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
        let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
        guards.push(file_guard);
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_span_events(FmtSpan::CLOSE)
                .with_filter(env_filter(&config.log_level)),
        )
    });

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    utils::register_panic_logger();
    utils::report_build_info();

    guards
}

/// Open the database, content store and anchor registry
///
/// A chain-backed registry is walked block by block before anything is
///  served; a chain that fails verification stops the daemon here.
async fn open_vault(config: &ServiceConfig) -> ServiceState {
    let state = match ServiceState::from_config(config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("cannot open the vault: {}", e);
            std::process::exit(EXIT_STATE_SETUP);
        }
    };

    match state.chain() {
        Some(chain) => match chain.len().await {
            Ok(blocks) => tracing::info!(blocks, "anchor chain verified"),
            Err(e) => tracing::warn!("anchor chain verified but its length is unavailable: {}", e),
        },
        None => tracing::info!("anchors are not kept on the local chain"),
    }
    state
}

async fn drain(tasks: Vec<JoinHandle<()>>) {
    if timeout(DRAIN_TIMEOUT, join_all(tasks)).await.is_err() {
        tracing::error!("API did not drain within {} seconds", DRAIN_TIMEOUT.as_secs());
        std::process::exit(EXIT_DRAIN_TIMEOUT);
    }
}

/// Open the vault and serve the record API on `api_port`
///
/// Returns once the API task is spawned. The vault only ever serves the API;
///  pinning and anchoring happen inside request handlers.
pub async fn start_service(config: &ServiceConfig) -> (ServiceState, ShutdownHandle) {
    let (signals, shutdown_tx, shutdown_rx) = utils::graceful_shutdown_blocker();
    let state = open_vault(config).await;

    let api_addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    let api_state = state.clone();
    let api = tokio::spawn(async move {
        if let Err(e) = http_server::run_api(http_server::Config::new(api_addr), api_state, shutdown_rx).await {
            tracing::error!("API server error: {}", e);
        }
    });
    tracing::info!(port = config.api_port, "vault API listening");

    (
        state,
        ShutdownHandle {
            signals,
            api,
            shutdown_tx,
        },
    )
}

/// Run the daemon in the foreground until SIGINT or SIGTERM
pub async fn spawn_service(config: &ServiceConfig) {
    let _guards = init_logging(config);
    let (_, handle) = start_service(config).await;
    handle.wait().await;
    tracing::info!("vault stopped");
}
