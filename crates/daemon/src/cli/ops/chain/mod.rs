use clap::{Args, Subcommand};

pub mod verify;

use crate::cli::op::Op;
use safetour_daemon::http_server::api::v0::chain::VerifyRequest;

crate::command_enum! {
    (Verify, VerifyRequest),
}

#[derive(Args, Debug, Clone)]
pub struct Chain {
    #[command(subcommand)]
    pub command: Command,
}

#[async_trait::async_trait]
impl Op for Chain {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
