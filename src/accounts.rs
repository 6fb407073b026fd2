use std::path::PathBuf;

use clap::Parser;
use color_eyre::Result;
use tracing::{info, instrument};

use crate::client::UpClient;
use crate::config::load_token;

/// One-shot account listing for diagnostics.
#[derive(Debug, Parser)]
pub struct Cmd {
    #[clap(short = 't', long = "token", help = "Token file")]
    token: PathBuf,
}

impl Cmd {
    #[instrument("accounts", skip_all, fields(token = ?self.token))]
    pub(crate) async fn run(&self) -> Result<()> {
        let token = load_token(&self.token).await?;
        let client = UpClient::new(token)?;

        let accounts = client.list_accounts().await?;

        info!("Accounts: {}", serde_json::to_string_pretty(&accounts.data)?);

        Ok(())
    }
}
