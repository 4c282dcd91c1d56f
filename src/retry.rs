//! Retry logic with exponential backoff
//!
//! The policy is generic: both attachment downloads and metadata/record
//! retrieval go through [`with_retry`], and the error type alone decides
//! whether another attempt is worthwhile.
//!
//! # Example
//!
//! ```no_run
//! use airtable_backup::retry::{IsRetryable, with_retry};
//! use airtable_backup::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! with_retry(&config, || async { Ok::<_, MyError>(()) }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::TransferError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, connection reset, server errors) should return `true`.
/// Permanent failures (client errors, malformed input) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for TransferError {
    fn is_retryable(&self) -> bool {
        match self {
            // No response at all: connect/DNS failure, reset, or per-attempt timeout
            TransferError::Network { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            // Only server-side failures are worth another attempt
            TransferError::Status { status, .. } => status.is_server_error(),
            // Body stream cut off mid-transfer behaves like a reset
            TransferError::Body { source, .. } => source.is_timeout() || source.is_body(),
            TransferError::InvalidUrl { .. } => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// `config.max_attempts` bounds the total number of calls to `operation`,
/// the first one included.
///
/// # Returns
///
/// Returns the successful result or the last error once attempts are exhausted
/// or a non-retryable error is seen.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt: u32 = 1;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                let jittered_delay = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };
                tokio::time::sleep(jittered_delay).await;

                attempt += 1;
                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Add up to 20% random jitter to a delay
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=0.2);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
