//! airtable-backup - export an Airtable base to local disk
//!
//! Entry point for the CLI. Configuration comes from the environment (or a
//! `.env` file); see [`Config::from_env`].

use airtable_backup::utils::format_megabytes;
use airtable_backup::{Backup, Config, run_with_shutdown};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    setup_logging();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "An error occurred during the backup process");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> airtable_backup::Result<()> {
    info!("Starting Airtable backup process");

    let config = Config::from_env()?;
    let backup = Backup::from_config(config)?;
    let summary = run_with_shutdown(&backup).await?;

    info!(folder = %summary.root.display(), "Backup completed successfully");
    info!("Tables backed up: {}", summary.tables);
    info!("Files downloaded: {}", summary.files);
    if summary.failed_files > 0 {
        info!("Files skipped after errors: {}", summary.failed_files);
    }
    info!("Total data size: {}", format_megabytes(summary.bytes));
    Ok(())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("airtable_backup=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
