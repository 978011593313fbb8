use clap::{Args, Subcommand};

pub mod list;
pub mod read;
pub mod write;

use crate::cli::op::Op;
use safetour_daemon::http_server::api::v0::records::{ListRequest, ReadRequest};

crate::command_enum! {
    (Write, write::Write),
    (Read, ReadRequest),
    (List, ListRequest),
}

pub type RecordCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Record {
    #[command(subcommand)]
    pub command: RecordCommand,
}

#[async_trait::async_trait]
impl Op for Record {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
