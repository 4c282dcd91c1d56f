//! HTTP transfer client with automatic retry
//!
//! [`TransferClient`] performs a single logical GET (possibly several attempts)
//! and hands back the raw body. It knows nothing about attachments or Airtable;
//! callers decide how to interpret the bytes.

use crate::config::RetryConfig;
use crate::error::{Error, Result, TransferError};
use crate::retry::with_retry;
use bytes::Bytes;
use std::time::Duration;

/// Per-request options
#[derive(Clone, Debug, Default)]
pub struct FetchOptions {
    /// Bearer token sent as `Authorization: Bearer <token>`
    pub bearer_token: Option<String>,
    /// Query string parameters appended to the URL
    pub query: Vec<(String, String)>,
}

impl FetchOptions {
    /// Options carrying only a bearer token
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(token.into()),
            query: Vec::new(),
        }
    }

    /// Append a query parameter
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Retrying HTTP GET client (cheap to clone, shares one connection pool)
#[derive(Clone, Debug)]
pub struct TransferClient {
    http: reqwest::Client,
    retry: RetryConfig,
}

impl TransferClient {
    /// Create a client whose every attempt is bounded by `request_timeout`
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built
    /// (e.g., TLS backend initialization failure).
    pub fn new(request_timeout: Duration, retry: RetryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("airtable-backup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to create HTTP client: {}", e),
                key: None,
            })?;

        Ok(Self { http, retry })
    }

    /// Retry policy applied by [`fetch`](Self::fetch)
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// GET `url` and return the full response body
    ///
    /// Retries network-level failures and 5xx responses with exponential
    /// backoff; 4xx responses fail immediately.
    ///
    /// # Errors
    ///
    /// Returns the last [`TransferError`] once retries are exhausted or a
    /// non-retryable failure is seen.
    pub async fn fetch(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> std::result::Result<Bytes, TransferError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| TransferError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        with_retry(&self.retry, || self.fetch_once(parsed.clone(), options)).await
    }

    async fn fetch_once(
        &self,
        url: reqwest::Url,
        options: &FetchOptions,
    ) -> std::result::Result<Bytes, TransferError> {
        let mut request = self.http.get(url.clone());
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        if let Some(token) = &options.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|source| TransferError::Network {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Status {
                status,
                url: url.to_string(),
            });
        }

        response.bytes().await.map_err(|source| TransferError::Body {
            url: url.to_string(),
            source,
        })
    }
}
