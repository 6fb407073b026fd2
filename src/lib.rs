mod accounts;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod entity;
pub mod model;
mod serve;
mod validate;

use clap::Parser;
use color_eyre::Result;

#[derive(Debug, Parser)]
pub enum Command {
    /// Check that an Up API token is accepted.
    Validate(validate::Cmd),
    /// List accounts once and exit.
    Accounts(accounts::Cmd),
    /// Poll on a schedule and serve entity states.
    Serve(serve::Cmd),
}

impl Command {
    pub async fn run(&self) -> Result<()> {
        match self {
            Command::Validate(cmd) => cmd.run().await?,
            Command::Accounts(cmd) => cmd.run().await?,
            Command::Serve(cmd) => cmd.run().await?,
        }

        Ok(())
    }
}
