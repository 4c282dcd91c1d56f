//! # airtable-backup
//!
//! One-shot export of an Airtable base to local disk: every table's schema,
//! every record, and every file attachment those records reference.
//!
//! ## Output layout
//!
//! ```text
//! <BACKUP_FOLDER_PATH>/<YYYYMMDD HH-mm-ss>/
//!     <table>_structure.json
//!     <table>_data.json
//!     <table>/<record id>/<field>/<filename>
//! ```
//!
//! ## Guarantees
//!
//! - At most `concurrent_downloads` attachment transfers are in flight across
//!   the whole run
//! - A failed attachment is logged and skipped; the run continues
//! - Any fatal error removes the run folder before it is reported
//!
//! ## Quick Start
//!
//! ```no_run
//! use airtable_backup::{Backup, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let backup = Backup::from_config(config)?;
//!
//!     let summary = backup.run().await?;
//!     println!("Backed up {} tables, {} files", summary.tables, summary.files);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Backup orchestration, run lifecycle and attachment downloads
pub mod backup;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Global concurrency cap
pub mod limiter;
/// Schema and record retrieval
pub mod remote;
/// Retry logic with exponential backoff
pub mod retry;
/// Retrying HTTP transfers
pub mod transfer;
/// Core data types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use backup::{AttachmentDownloader, Backup, BackupRun, RunState};
pub use config::{AirtableConfig, BackupConfig, Config, RetryConfig};
pub use error::{Error, RemoteError, Result, TransferError};
pub use limiter::ConcurrencyLimiter;
pub use remote::{AirtableClient, RemoteSource};
pub use transfer::{FetchOptions, TransferClient};
pub use types::{
    Attachment, AttachmentOutcome, BackupSummary, DownloadSummary, Record, TableMeta,
};

/// Run a backup, abandoning it if a termination signal arrives first.
///
/// On Unix this listens for SIGTERM and SIGINT, falling back to Ctrl+C if
/// neither can be registered. Elsewhere it listens for Ctrl+C only.
///
/// An interrupted run is dropped mid-flight, which deletes its output folder.
///
/// # Errors
///
/// Returns the backup's own error, or [`Error::Interrupted`] on a signal.
pub async fn run_with_shutdown(backup: &Backup) -> Result<types::BackupSummary> {
    tokio::select! {
        result = backup.run() => result,
        _ = wait_for_signal() => {
            tracing::warn!("Backup interrupted, partial output removed");
            Err(Error::Interrupted)
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{Signal, SignalKind, signal};

    // Registration can fail in restricted environments; a missing stream just never fires
    let register = |kind: SignalKind, name: &'static str| {
        signal(kind)
            .inspect_err(|e| tracing::warn!(signal = name, error = %e, "Could not register signal handler"))
            .ok()
    };
    async fn recv(stream: &mut Option<Signal>) -> Option<()> {
        match stream {
            Some(stream) => stream.recv().await,
            None => std::future::pending().await,
        }
    }

    let mut sigterm = register(SignalKind::terminate(), "SIGTERM");
    let mut sigint = register(SignalKind::interrupt(), "SIGINT");
    if sigterm.is_none() && sigint.is_none() {
        return wait_for_ctrl_c().await;
    }

    tokio::select! {
        Some(()) = recv(&mut sigterm) => tracing::info!("Received SIGTERM"),
        Some(()) = recv(&mut sigint) => tracing::info!("Received SIGINT"),
        else => std::future::pending().await,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
    tracing::info!("Received Ctrl+C");
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed
async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C, signals will be ignored");
        std::future::pending::<()>().await;
    }
}
