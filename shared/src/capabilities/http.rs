use async_trait::async_trait;
use bytes::Bytes;
use std::error::Error as StdError;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use super::fetch::{FetchError, FetchResponse, Fetcher};
use crate::cancel::CancelToken;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
pub const USER_AGENT: &str = concat!("quakeview/", env!("CARGO_PKG_VERSION"));

/// [`Fetcher`] backed by a shared reqwest client.
///
/// There is no overall request timeout here; slow custom-range queries are
/// governed by the escalation machine instead.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Other {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn execute(&self, url: &Url, host: &str) -> Result<FetchResponse, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| map_error(host, &e))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            // Error bodies are not guaranteed to be well-formed; skip them.
            return Ok(FetchResponse::new(status, Bytes::new()));
        }

        let body = response.bytes().await.map_err(|e| map_error(host, &e))?;
        Ok(FetchResponse::new(status, body))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self, cancel), fields(url = %url))]
    async fn fetch(&self, url: &Url, cancel: &CancelToken) -> Result<FetchResponse, FetchError> {
        let host = url.host_str().unwrap_or_default().to_string();
        tokio::select! {
            biased;
            reason = cancel.cancelled() => {
                debug!(?reason, "aborting in-flight request");
                Err(FetchError::Aborted)
            }
            result = self.execute(url, &host) => result,
        }
    }
}

fn map_error(host: &str, error: &reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            host: host.to_string(),
        }
    } else if error.is_connect() && is_dns_failure(error) {
        FetchError::Dns {
            host: host.to_string(),
            message: error.to_string(),
        }
    } else if error.is_connect() {
        FetchError::Connection {
            host: host.to_string(),
            message: error.to_string(),
        }
    } else {
        FetchError::Other {
            message: error.to_string(),
        }
    }
}

/// The connector reports resolver failures as a connect error whose cause
/// reads `dns error`.
fn is_dns_failure(error: &(dyn StdError + 'static)) -> bool {
    let mut cause = Some(error);
    while let Some(current) = cause {
        if current.to_string().starts_with("dns error") {
            return true;
        }
        cause = current.source();
    }
    false
}
