use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, instrument, warn};

use crate::client::ApiError;
use crate::model::{AccountResource, Snapshot, TransactionResource};

/// Where account data comes from. The live implementation is
/// [`crate::client::UpClient`]; tests script one.
#[async_trait]
pub trait UpSource {
    async fn accounts(&self) -> Result<Vec<AccountResource>, ApiError>;
    async fn transactions(&self) -> Result<Vec<TransactionResource>, ApiError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Serving data, possibly stale if the last poll failed.
    Available,
    /// Too many consecutive failed polls; data is too old to trust.
    Unavailable,
    /// The token was rejected. Polling stops until it is replaced.
    ReauthRequired,
}

/// Everything the rendering side needs, published through a watch
/// channel. The snapshot inside is only ever swapped wholesale.
#[derive(Debug, Clone)]
pub struct Published {
    pub snapshot: Option<Arc<Snapshot>>,
    pub availability: Availability,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

impl Default for Published {
    fn default() -> Self {
        Published {
            snapshot: None,
            availability: Availability::Available,
            last_success: None,
            last_error: None,
            consecutive_failures: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A fresh snapshot was published.
    Updated,
    /// The previous snapshot stands; the host should keep polling.
    Failed,
    /// The token was rejected; the host must stop polling.
    ReauthRequired,
}

/// Drives polls and publishes the results. The host invokes
/// [`Coordinator::poll`] on its own schedule; `&mut self` keeps polls
/// for one credential from overlapping.
pub struct Coordinator<S> {
    source: S,
    failure_threshold: u32,
    consecutive_failures: u32,
    published: watch::Sender<Published>,
}

impl<S: UpSource> Coordinator<S> {
    pub fn new(source: S, failure_threshold: u32) -> (Self, watch::Receiver<Published>) {
        let (published, rx) = watch::channel(Published::default());
        let coordinator = Coordinator {
            source,
            failure_threshold: failure_threshold.max(1),
            consecutive_failures: 0,
            published,
        };
        (coordinator, rx)
    }

    #[instrument(skip_all)]
    pub async fn poll(&mut self) -> PollOutcome {
        let fetched_at = Utc::now();
        match self.refresh(fetched_at).await {
            Ok(snapshot) => {
                self.consecutive_failures = 0;
                debug!(
                    accounts = snapshot.accounts.len(),
                    transactions = snapshot.transactions.len(),
                    "Publishing fresh snapshot"
                );
                self.published.send_replace(Published {
                    snapshot: Some(Arc::new(snapshot)),
                    availability: Availability::Available,
                    last_success: Some(fetched_at),
                    last_error: None,
                    consecutive_failures: 0,
                });
                PollOutcome::Updated
            }
            Err(err @ ApiError::Authentication { .. }) => {
                error!(%err, "Token rejected; re-enter the Up API token");
                self.published.send_modify(|p| {
                    p.availability = Availability::ReauthRequired;
                    p.last_error = Some(err.to_string());
                });
                PollOutcome::ReauthRequired
            }
            Err(err) => {
                // Protocol errors get retried like transient ones, but
                // loudly: the response shape changing under us is worth
                // diagnosing.
                match &err {
                    ApiError::Protocol { .. } => warn!(%err, "Unexpected response; will retry"),
                    _ => warn!(%err, "Poll failed; will retry"),
                }
                self.consecutive_failures += 1;
                let failures = self.consecutive_failures;
                let unavailable = failures >= self.failure_threshold;
                self.published.send_modify(|p| {
                    p.consecutive_failures = failures;
                    p.last_error = Some(err.to_string());
                    if unavailable {
                        p.availability = Availability::Unavailable;
                    }
                });
                PollOutcome::Failed
            }
        }
    }

    async fn refresh(&self, fetched_at: DateTime<Utc>) -> Result<Snapshot, ApiError> {
        let (accounts, transactions) =
            tokio::join!(self.source.accounts(), self.source.transactions());
        Ok(Snapshot::assemble(accounts?, transactions?, fetched_at))
    }
}
