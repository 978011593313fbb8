use std::error::Error;
use std::path::PathBuf;

use url::Url;

use safetour_daemon::http_server::api::client::{ApiClient, ApiError, ApiRequest};
use safetour_daemon::state::{AppState, StateError};

const DEFAULT_REMOTE: &str = "http://localhost:5001";

/// Pick the daemon url the CLI talks to.
///
/// An explicit `--remote` wins, then the `api_port` of an initialized state
///  directory, then the default port.
pub fn resolve_remote(explicit: Option<Url>, config_path: Option<PathBuf>) -> Url {
    if let Some(url) = explicit {
        return url;
    }
    AppState::load(config_path)
        .ok()
        .and_then(|state| Url::parse(&format!("http://localhost:{}", state.config.api_port)).ok())
        .unwrap_or_else(|| Url::parse(DEFAULT_REMOTE).expect("hardcoded URL must parse"))
}

#[derive(Clone)]
pub struct OpContext {
    /// Client for the daemon API
    pub client: ApiClient,
    /// Custom state directory, `None` means ~/.safetour
    pub config_path: Option<PathBuf>,
}

impl OpContext {
    pub fn new(remote: Url, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        Ok(Self {
            client: ApiClient::new(&remote)?,
            config_path,
        })
    }

    /// Load the on-disk state this invocation points at
    pub fn app_state(&self) -> Result<AppState, StateError> {
        AppState::load(self.config_path.clone())
    }

    /// Send a single api request to the daemon
    pub async fn call<R>(&self, request: R) -> Result<R::Response, ApiError>
    where
        R: ApiRequest + Send,
        R::Response: Send,
    {
        self.client.call(request).await
    }
}

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

/// Generate a `Command` subcommand enum over a list of ops, along with
///  `OpOutput` and `OpError` enums and an `Op` impl that dispatches to them.
#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::cli::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::cli::op::Op>::Error),
            )*
        }

        #[async_trait::async_trait]
        impl $crate::cli::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            async fn execute(&self, ctx: &$crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => op
                            .execute(ctx)
                            .await
                            .map(OpOutput::$variant)
                            .map_err(OpError::$variant),
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}
