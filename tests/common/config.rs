//! Test configuration helpers pointing the backup at a mock server

use airtable_backup::{AirtableConfig, BackupConfig, Config, RetryConfig};
use std::path::Path;
use std::time::Duration;

/// Base id used by every mock Airtable server
pub const BASE_ID: &str = "appTEST";

/// API token expected by every mock Airtable server
pub const API_KEY: &str = "pat-integration";

/// Fixed run folder name so tests can locate the output
pub const RUN_FOLDER: &str = "20240101 12-00-00";

/// Retry policy with millisecond delays
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

/// Config writing under `backup_root` and talking to `api_url`
pub fn test_config(api_url: &str, backup_root: &Path, concurrent_downloads: usize) -> Config {
    Config {
        airtable: AirtableConfig {
            api_key: API_KEY.to_string(),
            base_id: BASE_ID.to_string(),
            api_url: api_url.to_string(),
        },
        backup: BackupConfig {
            run_folder_name: RUN_FOLDER.to_string(),
            concurrent_downloads,
            request_timeout: Duration::from_secs(5),
            ..BackupConfig::new(backup_root)
        },
        retry: fast_retry(3),
    }
}
