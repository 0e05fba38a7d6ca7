use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use crate::cancel::CancelToken;

/// Status and raw body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    status: u16,
    body: Bytes,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Failures below the HTTP layer; none of them carry a status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("DNS resolution failed for {host}: {message}")]
    Dns { host: String, message: String },

    #[error("connection failed to {host}: {message}")]
    Connection { host: String, message: String },

    #[error("timed out talking to {host}")]
    Timeout { host: String },

    #[error("transport error: {message}")]
    Other { message: String },

    #[error("request aborted")]
    Aborted,
}

/// Network fetch primitive.
///
/// Implementations should stop promptly once `cancel` fires. The controller
/// tolerates a late answer either way and discards it.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url, cancel: &CancelToken) -> Result<FetchResponse, FetchError>;
}

#[async_trait]
impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    async fn fetch(&self, url: &Url, cancel: &CancelToken) -> Result<FetchResponse, FetchError> {
        (**self).fetch(url, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_body() {
        let response = FetchResponse::new(200, "{}".as_bytes().to_vec());
        assert_eq!(response.body(), b"{}");
    }
}
