use std::path::PathBuf;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use tracing::{info, instrument};

use crate::client::{ApiError, UpClient};
use crate::config::load_token;

/// Check an Up API token with a single test call, the way the setup
/// form validates it before it is accepted.
#[derive(Debug, Parser)]
pub struct Cmd {
    #[clap(short = 't', long = "token", help = "Token file")]
    token: PathBuf,
}

impl Cmd {
    #[instrument("validate", skip_all, fields(token = ?self.token))]
    pub(crate) async fn run(&self) -> Result<()> {
        let token = load_token(&self.token).await?;
        let client = UpClient::new(token)?;

        match client.ping().await {
            Ok(ping) => {
                info!(ping_id = %ping.meta.id, "Token accepted");
                Ok(())
            }
            Err(err @ ApiError::Authentication { .. }) => {
                Err(eyre!("{err}; re-enter the token and try again"))
            }
            Err(err) => Err(err.into()),
        }
    }
}
