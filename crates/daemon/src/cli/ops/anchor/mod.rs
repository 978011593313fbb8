use clap::{Args, Subcommand};

pub mod history;
pub mod lookup;
pub mod verify;

use crate::cli::op::Op;
use safetour_daemon::http_server::api::v0::anchors::{HistoryRequest, LookupRequest, VerifyAnchorRequest};

crate::command_enum! {
    (Lookup, LookupRequest),
    (History, HistoryRequest),
    (Verify, VerifyAnchorRequest),
}

#[derive(Args, Debug, Clone)]
pub struct Anchor {
    #[command(subcommand)]
    pub command: Command,
}

#[async_trait::async_trait]
impl Op for Anchor {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
