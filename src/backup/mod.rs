//! Backup orchestration split into focused submodules.
//!
//! - [`lifecycle`] - Run directory ownership, JSON persistence and teardown
//! - [`attachments`] - Bounded-concurrency attachment downloads
//!
//! [`Backup::run`] is the single error boundary of a run: any fatal error
//! after the run directory exists tears the directory down before the error
//! is returned.

pub mod attachments;
pub mod lifecycle;

pub use attachments::AttachmentDownloader;
pub use lifecycle::{BackupRun, RunState};

use crate::config::Config;
use crate::error::Result;
use crate::limiter::ConcurrencyLimiter;
use crate::remote::{AirtableClient, RemoteSource};
use crate::transfer::TransferClient;
use crate::types::{BackupSummary, DownloadSummary, TableMeta};
use crate::utils::format_megabytes;
use std::sync::Arc;

/// Totals for one table
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TableSummary {
    /// Size of the written `<table>_data.json`
    pub data_bytes: u64,
    /// Attachment results
    pub attachments: DownloadSummary,
}

/// One complete export of a base
pub struct Backup {
    config: Config,
    remote: Arc<dyn RemoteSource>,
    downloader: AttachmentDownloader,
}

impl Backup {
    /// Assemble a backup from explicit collaborators
    ///
    /// One [`ConcurrencyLimiter`] sized by `config.backup.concurrent_downloads`
    /// is created here and shared by every table of the run.
    pub fn new(config: Config, remote: Arc<dyn RemoteSource>, client: TransferClient) -> Self {
        let limiter = ConcurrencyLimiter::new(config.backup.concurrent_downloads);
        let downloader = AttachmentDownloader::new(client, limiter);
        Self {
            config,
            remote,
            downloader,
        }
    }

    /// Build the production collaborators (HTTP client, Airtable API) from `config`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the configuration is
    /// invalid or the HTTP client cannot be created.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let client = TransferClient::new(config.backup.request_timeout, config.retry.clone())?;
        let remote = Arc::new(AirtableClient::new(client.clone(), config.airtable.clone()));
        Ok(Self::new(config, remote, client))
    }

    /// Export every table, then keep the output
    ///
    /// Steps: create the run directory, list tables, and per table save its
    /// structure, fetch and save its records, and download its attachments.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error ([`RemoteError`](crate::RemoteError) or
    /// run-level [`Error::Io`](crate::Error::Io)). The run directory has
    /// already been removed when this returns an error.
    pub async fn run(&self) -> Result<BackupSummary> {
        let mut run = BackupRun::from_config(&self.config.backup);
        let root = run.initialize().await?;
        tracing::info!(root = %root.display(), "Backup folder created");

        match self.back_up_tables(&run).await {
            Ok(mut summary) => {
                summary.root = run.retain()?;
                tracing::info!(
                    tables = summary.tables,
                    files = summary.files,
                    failed_files = summary.failed_files,
                    total = %format_megabytes(summary.bytes),
                    "Backup completed successfully"
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(error = %e, "Backup failed, removing partial output");
                run.teardown().await;
                Err(e)
            }
        }
    }

    async fn back_up_tables(&self, run: &BackupRun) -> Result<BackupSummary> {
        let tables = self.remote.list_tables().await?;
        tracing::info!(count = tables.len(), "Found tables");

        let mut summary = BackupSummary::default();
        for table in &tables {
            let table_summary = self.back_up_table(run, table).await?;
            summary.tables += 1;
            summary.bytes += table_summary.data_bytes + table_summary.attachments.bytes;
            summary.files += table_summary.attachments.files;
            summary.failed_files += table_summary.attachments.failed;
        }
        Ok(summary)
    }

    /// Save one table's structure, records and attachments into `run`
    ///
    /// # Errors
    ///
    /// Returns any fatal error; attachment failures are only counted.
    pub async fn back_up_table(&self, run: &BackupRun, table: &TableMeta) -> Result<TableSummary> {
        tracing::info!(table = %table.name, "Backing up table");

        run.persist_structure(table).await?;

        let records = self.remote.list_records(&table.name).await?;
        let data_bytes = run.persist_records(&table.name, &records).await?;

        let attachments = self
            .downloader
            .download_attachments(run, &table.name, &records)
            .await?;
        if attachments.failed > 0 {
            tracing::warn!(
                table = %table.name,
                failed = attachments.failed,
                "Some attachments could not be downloaded"
            );
        }

        Ok(TableSummary {
            data_bytes,
            attachments,
        })
    }
}
