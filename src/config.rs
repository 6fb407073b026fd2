use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::{eyre::eyre, eyre::Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

pub const DEFAULT_REFRESH_MINUTES: u32 = 60;
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
const DEFAULT_PORT: u16 = 8990;

// Supported refresh cadences; anything else falls back to hourly.
const ALLOWED_REFRESH_MINUTES: &[u32] = &[1, 2, 5, 10, 15, 30, 60];

#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Path to a file holding the Up API bearer token.
    pub token: PathBuf,
    refresh_minutes: Option<u32>,
    failure_threshold: Option<u32>,
    port: Option<u16>,
}

impl ScraperConfig {
    #[instrument(skip_all, fields(?path))]
    pub async fn load(path: &Path) -> Result<ScraperConfig> {
        let buf = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Read config file: {}", path.display()))?;
        let config = toml::from_str(&buf).context("Parse config file")?;

        debug!(?path, "Loaded config");

        Ok(config)
    }

    pub fn refresh_minutes(&self) -> u32 {
        match self.refresh_minutes {
            None => DEFAULT_REFRESH_MINUTES,
            Some(minutes) if ALLOWED_REFRESH_MINUTES.contains(&minutes) => minutes,
            Some(minutes) => {
                warn!(
                    minutes,
                    default = DEFAULT_REFRESH_MINUTES,
                    "Unsupported refresh interval, using default"
                );
                DEFAULT_REFRESH_MINUTES
            }
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.refresh_minutes()) * 60)
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
            .unwrap_or(DEFAULT_FAILURE_THRESHOLD)
            .max(1)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

#[instrument(skip_all, fields(?path))]
pub async fn load_token(path: &Path) -> Result<SecretString> {
    let buf = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Read token file: {}", path.display()))?;
    let token = buf.trim();
    if token.is_empty() {
        return Err(eyre!("Token file is empty: {}", path.display()));
    }

    debug!(?path, "Loaded token");

    Ok(SecretString::new(token.to_string()))
}
