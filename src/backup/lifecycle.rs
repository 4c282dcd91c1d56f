//! Run directory ownership: creation, JSON persistence and teardown.

use crate::config::BackupConfig;
use crate::error::{Error, Result};
use crate::types::{Record, TableMeta};
use crate::utils::sanitize_path_component;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Where a [`BackupRun`] is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// Root chosen, directory not yet created
    Uninitialized,
    /// Directory exists and is being written
    Active,
    /// Directory deleted after a fatal error
    Removed,
    /// Run finished and its output is kept
    Retained,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunState::Uninitialized => "uninitialized",
            RunState::Active => "active",
            RunState::Removed => "removed",
            RunState::Retained => "retained",
        };
        f.write_str(name)
    }
}

/// Owns the output directory of exactly one backup run
///
/// Transitions: `Uninitialized -> Active` on [`initialize`](Self::initialize),
/// then `Active -> Removed` on [`teardown`](Self::teardown) or
/// `Active -> Retained` on [`retain`](Self::retain). Neither terminal state
/// can become active again.
///
/// A run dropped while still `Active` (panic, cancelled future) removes its
/// directory on drop, so partial output never survives an abnormal exit.
#[derive(Debug)]
pub struct BackupRun {
    root: PathBuf,
    state: RunState,
}

impl BackupRun {
    /// Plan a run rooted at `root`; nothing touches the filesystem yet
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state: RunState::Uninitialized,
        }
    }

    /// Plan a run at `<backup_root_path>/<run_folder_name>`
    pub fn from_config(config: &BackupConfig) -> Self {
        Self::new(config.run_root())
    }

    /// Run output directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Create the run directory (and parents) and mark the run active
    ///
    /// Creating a directory that already exists is not an error, and calling
    /// this again on an active run is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be created, or
    /// [`Error::InvalidState`] if the run was already removed or retained.
    pub async fn initialize(&mut self) -> Result<PathBuf> {
        match self.state {
            RunState::Uninitialized | RunState::Active => {}
            state => {
                return Err(Error::InvalidState {
                    operation: "initialize",
                    state: state.to_string(),
                });
            }
        }

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::io(&self.root, e))?;
        self.state = RunState::Active;

        tracing::debug!(root = %self.root.display(), "Backup run initialized");
        Ok(self.root.clone())
    }

    /// Write `<table>_structure.json` with the table's schema
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] on write failure or [`Error::InvalidState`] if the
    /// run is not active.
    pub async fn persist_structure(&self, table: &TableMeta) -> Result<PathBuf> {
        let path = self.json_path(&table.name, "structure", "persist structure")?;
        self.write_json(&path, table).await?;
        Ok(path)
    }

    /// Write `<table>_data.json` with every record and return its size in bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] on write failure or [`Error::InvalidState`] if the
    /// run is not active.
    pub async fn persist_records(&self, table_name: &str, records: &[Record]) -> Result<u64> {
        let path = self.json_path(table_name, "data", "persist records")?;
        self.write_json(&path, records).await
    }

    /// Directory holding one field's attachments:
    /// `<root>/<table>/<record id>/<field>`
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the run is not active.
    pub fn attachment_dir(&self, table_name: &str, record_id: &str, field: &str) -> Result<PathBuf> {
        self.ensure_active("store attachments")?;
        Ok(self
            .root
            .join(sanitize_path_component(table_name, "table"))
            .join(sanitize_path_component(record_id, "record"))
            .join(sanitize_path_component(field, "field")))
    }

    /// Recursively delete the run directory
    ///
    /// Best effort: a failure is logged and swallowed so it never masks the
    /// error that triggered the teardown. Does nothing unless the run is active.
    pub async fn teardown(&mut self) {
        if self.state != RunState::Active {
            tracing::debug!(state = %self.state, "Teardown skipped, run not active");
            return;
        }
        self.state = RunState::Removed;

        tracing::info!(root = %self.root.display(), "Deleting backup folder");
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => tracing::info!(root = %self.root.display(), "Deleted backup folder"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::error!(
                root = %self.root.display(),
                error = %e,
                "Failed to delete backup folder"
            ),
        }
    }

    /// Keep the run's output and release the drop-time cleanup
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the run is not active.
    pub fn retain(&mut self) -> Result<PathBuf> {
        self.ensure_active("retain")?;
        self.state = RunState::Retained;
        Ok(self.root.clone())
    }

    fn ensure_active(&self, operation: &'static str) -> Result<()> {
        if self.state == RunState::Active {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: self.state.to_string(),
            })
        }
    }

    fn json_path(&self, table_name: &str, kind: &str, operation: &'static str) -> Result<PathBuf> {
        self.ensure_active(operation)?;
        let table = sanitize_path_component(table_name, "table");
        Ok(self.root.join(format!("{table}_{kind}.json")))
    }

    async fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<u64> {
        let data = serde_json::to_string_pretty(value)?;
        tokio::fs::write(path, &data)
            .await
            .map_err(|e| Error::io(path, e))?;
        Ok(data.len() as u64)
    }
}

impl Drop for BackupRun {
    fn drop(&mut self) {
        if self.state != RunState::Active {
            return;
        }
        tracing::warn!(
            root = %self.root.display(),
            "Backup run dropped while active, deleting backup folder"
        );
        if let Err(e) = std::fs::remove_dir_all(&self.root)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::error!(
                root = %self.root.display(),
                error = %e,
                "Failed to delete backup folder"
            );
        }
    }
}
