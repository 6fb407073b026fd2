use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::coordinator::UpSource;
use crate::model::{AccountResource, Paginated, Ping, TransactionResource};

const UP_API_BASE: &str = "https://api.up.com.au/api/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const ACCOUNTS_PAGE_SIZE: &str = "100";
const TRANSACTIONS_PAGE_SIZE: &str = "50";

/// How a request against the Up API failed. The client never retries;
/// callers decide what each class of failure means for them.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The token was rejected (HTTP 401/403). Re-entering the token is
    /// the only way out.
    #[error("Up API rejected the token (HTTP {status})")]
    Authentication { status: StatusCode },
    /// Network trouble, a timeout, or a 5xx. Expected to clear up on a
    /// later poll.
    #[error("transient Up API failure: {reason}")]
    Transient { reason: String },
    /// A response we don't know how to read. Retried like a transient
    /// failure, but worth a look.
    #[error("unexpected Up API response: {reason}")]
    Protocol { reason: String },
}

impl ApiError {
    fn from_send(source: reqwest::Error) -> ApiError {
        if source.is_builder() {
            ApiError::Protocol {
                reason: source.to_string(),
            }
        } else {
            ApiError::Transient {
                reason: source.to_string(),
            }
        }
    }
}

/// Error body the Up API sends alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<ErrorObject>,
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
    #[serde(default)]
    status: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    detail: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            let ErrorObject {
                status,
                title,
                detail,
            } = err;
            write!(f, "{status} {title}: {detail}")?;
        }
        Ok(())
    }
}

pub struct UpClient {
    http: Client,
    base: String,
    token: SecretString,
}

impl UpClient {
    pub fn new(token: SecretString) -> reqwest::Result<Self> {
        Self::with_base_url(token, UP_API_BASE)
    }

    /// Point the client somewhere other than the live API.
    pub fn with_base_url(token: SecretString, base: impl Into<String>) -> reqwest::Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(UpClient {
            http,
            base: base.into(),
            token,
        })
    }

    pub async fn ping(&self) -> Result<Ping, ApiError> {
        self.get("/util/ping", &[]).await
    }

    pub async fn list_accounts(&self) -> Result<Paginated<AccountResource>, ApiError> {
        self.get("/accounts", &[("page[size]", ACCOUNTS_PAGE_SIZE)])
            .await
    }

    pub async fn list_transactions(&self) -> Result<Paginated<TransactionResource>, ApiError> {
        self.get("/transactions", &[("page[size]", TRANSACTIONS_PAGE_SIZE)])
            .await
    }

    async fn get<Response: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Response, ApiError> {
        let url = format!("{}{}", self.base, path);
        debug!(%url, "GET");

        let resp = self
            .http
            .get(&url)
            .query(query)
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(ApiError::from_send)?;

        let resp = parse_error(resp).await?;

        let data = resp.json().await.map_err(|err| ApiError::Protocol {
            reason: format!("malformed JSON body: {err}"),
        })?;

        Ok(data)
    }
}

async fn parse_error(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    if let Ok(body) = resp.json::<ErrorResponse>().await {
        warn!(%status, %body, "Failed response");
    } else {
        warn!(%status, "Failed response with unreadable body");
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(ApiError::Authentication { status })
    } else if status.is_server_error() {
        Err(ApiError::Transient {
            reason: format!("HTTP {status}"),
        })
    } else {
        Err(ApiError::Protocol {
            reason: format!("HTTP {status}"),
        })
    }
}

#[async_trait]
impl UpSource for UpClient {
    async fn accounts(&self) -> Result<Vec<AccountResource>, ApiError> {
        Ok(self.list_accounts().await?.data)
    }

    async fn transactions(&self) -> Result<Vec<TransactionResource>, ApiError> {
        Ok(self.list_transactions().await?.data)
    }
}
