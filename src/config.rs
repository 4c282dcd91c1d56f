//! Configuration types for airtable-backup

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Format of run folder names, e.g. `20261019 14-03-59`
pub const RUN_FOLDER_FORMAT: &str = "%Y%m%d %H-%M-%S";

/// Airtable connection settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AirtableConfig {
    /// Personal access token used as bearer credential
    pub api_key: String,

    /// Base to export (e.g., "appXXXXXXXXXXXXXX")
    pub base_id: String,

    /// API origin (default: "https://api.airtable.com")
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

/// Output and download behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Directory under which run folders are created
    pub backup_root_path: PathBuf,

    /// Name of this run's folder (default: current local time as `YYYYMMDD HH-mm-ss`)
    #[serde(default = "default_run_folder_name")]
    pub run_folder_name: String,

    /// Maximum simultaneous attachment transfers across the whole run (default: 20)
    #[serde(default = "default_concurrent_downloads")]
    pub concurrent_downloads: usize,

    /// Timeout applied to each individual request attempt (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl BackupConfig {
    /// Create a config rooted at `backup_root_path` with default settings
    pub fn new(backup_root_path: impl Into<PathBuf>) -> Self {
        Self {
            backup_root_path: backup_root_path.into(),
            run_folder_name: default_run_folder_name(),
            concurrent_downloads: default_concurrent_downloads(),
            request_timeout: default_request_timeout(),
        }
    }

    /// Full path of this run's output directory
    pub fn run_root(&self) -> PathBuf {
        self.backup_root_path.join(&self.run_folder_name)
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per request, including the first one (default: 6)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 100 milliseconds)
    #[serde(default = "default_initial_delay", with = "millis_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "millis_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Main configuration for a backup run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Remote API settings
    pub airtable: AirtableConfig,

    /// Output and concurrency settings
    pub backup: BackupConfig,

    /// Retry policy shared by every HTTP request
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// A `.env` file in the working directory is loaded first if present.
    ///
    /// Required variables: `AIRTABLE_API_KEY`, `AIRTABLE_BASE_ID`, `BACKUP_FOLDER_PATH`.
    /// Optional: `AIRTABLE_API_URL`, `CONCURRENT_DOWNLOADS`, `BACKUP_FOLDER_NAME`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first missing or malformed variable.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| Error::config(key, format!("environment variable {key} is not set")))
        };

        let api_key = require("AIRTABLE_API_KEY")?;
        let base_id = require("AIRTABLE_BASE_ID")?;
        let backup_root_path = PathBuf::from(require("BACKUP_FOLDER_PATH")?);

        let mut backup = BackupConfig::new(backup_root_path);
        if let Some(raw) = get("CONCURRENT_DOWNLOADS") {
            backup.concurrent_downloads = raw.trim().parse().map_err(|_| {
                Error::config(
                    "CONCURRENT_DOWNLOADS",
                    format!("expected a positive integer, got {raw:?}"),
                )
            })?;
        }
        if let Some(name) = get("BACKUP_FOLDER_NAME") {
            backup.run_folder_name = name;
        }

        let config = Self {
            airtable: AirtableConfig {
                api_key,
                base_id,
                api_url: get("AIRTABLE_API_URL").unwrap_or_else(default_api_url),
            },
            backup,
            retry: RetryConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero concurrency cap, zero retry attempts,
    /// or an empty run folder name.
    pub fn validate(&self) -> Result<()> {
        if self.backup.concurrent_downloads == 0 {
            return Err(Error::config(
                "CONCURRENT_DOWNLOADS",
                "concurrent downloads must be at least 1",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config("max_attempts", "at least one attempt is required"));
        }
        if self.backup.run_folder_name.trim().is_empty() {
            return Err(Error::config("BACKUP_FOLDER_NAME", "run folder name is empty"));
        }
        if url::Url::parse(&self.airtable.api_url).is_err() {
            return Err(Error::config(
                "AIRTABLE_API_URL",
                format!("not a valid URL: {}", self.airtable.api_url),
            ));
        }
        Ok(())
    }
}

fn default_api_url() -> String {
    "https://api.airtable.com".to_string()
}

fn default_run_folder_name() -> String {
    chrono::Local::now().format(RUN_FOLDER_FORMAT).to_string()
}

fn default_concurrent_downloads() -> usize {
    20
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_attempts() -> u32 {
    6
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
