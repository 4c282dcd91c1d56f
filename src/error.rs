//! Error types for airtable-backup
//!
//! The taxonomy mirrors how far a failure is allowed to travel:
//! - [`RemoteError`] - schema/record retrieval failed; fatal, aborts the run
//! - [`Error::Io`] - filesystem failure at the run level; fatal (except during teardown)
//! - [`TransferError`] - a single fetch failed after retries; contained per attachment

use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for airtable-backup operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for airtable-backup
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "AIRTABLE_API_KEY")
        key: Option<String>,
    },

    /// Schema or record retrieval failed
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Filesystem operation failed
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path the operation was acting on
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A single network transfer failed
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Operation not permitted in the current run state
    #[error("cannot {operation} a backup run that is {state}")]
    InvalidState {
        /// The attempted operation (e.g., "initialize", "persist records")
        operation: &'static str,
        /// The state the run was in
        state: String,
    },

    /// The concurrency limiter stopped admitting tasks
    #[error("concurrency limiter is closed")]
    LimiterClosed,

    /// The run was interrupted by a termination signal
    #[error("backup interrupted by signal")]
    Interrupted,
}

impl Error {
    /// Build an [`Error::Io`] for `path`
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Build an [`Error::Config`] for a named key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Failure of a single HTTP fetch
#[derive(Debug, Error)]
pub enum TransferError {
    /// Request never produced a usable response (connect, DNS, timeout, reset)
    #[error("request to {url} failed: {source}")]
    Network {
        /// Requested URL
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status {
        /// Response status code
        status: StatusCode,
        /// Requested URL
        url: String,
    },

    /// Response body could not be read
    #[error("failed to read response body from {url}: {source}")]
    Body {
        /// Requested URL
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// The URL could not be parsed
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// Offending URL
        url: String,
        /// Parser message
        reason: String,
    },
}

impl TransferError {
    /// HTTP status of the failed response, if the server answered
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TransferError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Schema or record retrieval errors
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Table metadata could not be fetched
    #[error("failed to fetch table metadata: {0}")]
    Tables(#[source] TransferError),

    /// Records of a table could not be fetched
    #[error("failed to fetch records from table {table}: {source}")]
    Records {
        /// Table being listed
        table: String,
        /// Underlying transfer failure
        #[source]
        source: TransferError,
    },

    /// A response body was not the expected JSON shape
    #[error("failed to decode {what}: {source}")]
    Decode {
        /// What was being decoded (e.g., "table metadata")
        what: String,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },
}
