use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::{debug_handler, extract::State, routing::get, Json, Router};
use clap::Parser;
use color_eyre::{
    eyre::{eyre, Context},
    Result,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::client::UpClient;
use crate::config::{load_token, ScraperConfig};
use crate::coordinator::{Coordinator, PollOutcome, Published};
use crate::entity::{entities, SensorEntity};

/// Host loop: owns the refresh timer, polls on a fixed cadence, and
/// serves the published entity states over HTTP.
#[derive(Debug, Parser)]
pub struct Cmd {
    #[clap(short = 'c', long = "config", help = "Config file")]
    config: PathBuf,
}

impl Cmd {
    #[instrument("serve", skip_all, fields(config = ?self.config))]
    pub(crate) async fn run(&self) -> Result<()> {
        let config = ScraperConfig::load(&self.config).await?;
        let token = load_token(&config.token).await?;
        let client = UpClient::new(token)?;

        let (mut coordinator, rx) = Coordinator::new(client, config.failure_threshold());

        // The first refresh must succeed before anything is served,
        // so a bad token or dead network shows up at startup rather
        // than as an empty entity list.
        match coordinator.poll().await {
            PollOutcome::Updated => {}
            outcome => return Err(eyre!("Initial Up API fetch failed ({outcome:?})")),
        }

        let cnx = CancellationToken::new();
        let ip_addr = IpAddr::from([127, 0, 0, 1]);
        let listener = TcpListener::bind((ip_addr, config.port()))
            .await
            .with_context(|| format!("Bind to address: {}:{}", ip_addr, config.port()))?;

        info!(
            addr = %listener.local_addr().context("listen address")?,
            interval_minutes = config.refresh_minutes(),
            "Serving entity states"
        );

        tokio::spawn({
            let cnx = cnx.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Shutting down");
                    cnx.cancel();
                }
            }
        });

        let poller = tokio::spawn(poll_loop(
            coordinator,
            config.refresh_interval(),
            cnx.clone(),
        ));

        let app = routes(rx);
        axum::serve(listener, app)
            .with_graceful_shutdown(cnx.clone().cancelled_owned())
            .await
            .context("Running server")?;

        cnx.cancel();
        poller.await.context("Poll loop")?;

        Ok(())
    }
}

/// Calls `poll` serially, one tick at a time. Stops for good when the
/// token is rejected; the server stays up so `/status` shows why.
async fn poll_loop(
    mut coordinator: Coordinator<UpClient>,
    every: Duration,
    cnx: CancellationToken,
) {
    // The first refresh already happened; start the cadence one full
    // interval out.
    let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cnx.cancelled() => break,
            _ = ticker.tick() => {
                if coordinator.poll().await == PollOutcome::ReauthRequired {
                    error!("Polling stopped; replace the token and restart");
                    break;
                }
            }
        }
    }
}

#[derive(Clone)]
struct AxumState {
    published: watch::Receiver<Published>,
}

fn routes(published: watch::Receiver<Published>) -> Router {
    Router::new()
        .route("/entities", get(handle_entities))
        .route("/status", get(handle_status))
        .with_state(AxumState { published })
}

#[debug_handler]
async fn handle_entities(State(state): State<AxumState>) -> Json<Vec<SensorEntity>> {
    let published = state.published.borrow().clone();
    Json(entities(&published))
}

#[debug_handler]
async fn handle_status(State(state): State<AxumState>) -> Json<serde_json::Value> {
    let published = state.published.borrow().clone();
    Json(json!({
        "availability": published.availability,
        "last_success": published.last_success,
        "last_error": published.last_error,
        "consecutive_failures": published.consecutive_failures,
    }))
}
