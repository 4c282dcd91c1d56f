//! Core data types: tables, records, attachments and run summaries

use crate::error::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Table metadata as returned by the schema endpoint
///
/// Only `name` is interpreted; every other key is carried through verbatim
/// so the persisted structure file matches what the API sent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    /// Table name, used for file and directory names
    pub name: String,

    /// Remaining schema (id, fields, views, ...)
    #[serde(flatten)]
    pub schema: Map<String, Value>,
}

impl TableMeta {
    /// Table metadata with no schema beyond its name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: Map::new(),
        }
    }
}

/// One row of a table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record identifier (e.g., "recXXXXXXXXXXXXXX")
    pub id: String,

    /// Creation timestamp as reported by the API
    #[serde(rename = "createdTime", default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,

    /// Field name to value; attachment fields hold arrays of descriptors
    #[serde(default)]
    pub fields: Map<String, Value>,

    /// Any other top-level keys, kept so the data file matches the API response
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    /// Record with the given id and no fields
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_time: None,
            fields: Map::new(),
            extra: Map::new(),
        }
    }

    /// Builder-style field setter
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Fields whose values are attachment lists, with their descriptors
    ///
    /// A field qualifies when its value is a non-empty array whose first
    /// element carries a `url`. Within a qualifying field, elements without a
    /// URL are dropped.
    pub fn attachment_fields(&self) -> impl Iterator<Item = (&str, Vec<Attachment>)> {
        self.fields.iter().filter_map(|(name, value)| {
            let items = value.as_array()?;
            Attachment::from_value(items.first()?)?;
            let attachments = items.iter().filter_map(Attachment::from_value).collect();
            Some((name.as_str(), attachments))
        })
    }
}

/// A file reference embedded in a record field
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Download URL
    pub url: String,

    /// Original filename, if the descriptor has one
    #[serde(default)]
    pub filename: Option<String>,

    /// Attachment id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Size in bytes as reported by the API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// MIME type as reported by the API
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl Attachment {
    /// Interpret a JSON value as an attachment descriptor
    ///
    /// Returns `None` unless the value is an object with a non-empty string `url`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let url = value.get("url")?.as_str()?;
        if url.is_empty() {
            return None;
        }
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

        Some(Self {
            url: url.to_string(),
            filename: text("filename"),
            id: text("id"),
            size: value.get("size").and_then(Value::as_u64),
            mime_type: text("type"),
        })
    }

    /// Name to store the file under
    ///
    /// Uses the descriptor's filename, falling back to the URL's last path
    /// segment, then to `"attachment"`. The result is sanitized for use as a
    /// single path component.
    pub fn file_name(&self) -> String {
        let raw = self
            .filename
            .clone()
            .filter(|name| !name.is_empty())
            .or_else(|| {
                url::Url::parse(&self.url).ok().and_then(|url| {
                    url.path_segments()?
                        .next_back()
                        .filter(|segment| !segment.is_empty())
                        .map(|segment| {
                            urlencoding::decode(segment)
                                .map(|s| s.into_owned())
                                .unwrap_or_else(|_| segment.to_string())
                        })
                })
            })
            .unwrap_or_default();

        crate::utils::sanitize_path_component(&raw, "attachment")
    }
}

/// Result of a single attachment download
#[derive(Debug)]
pub enum AttachmentOutcome {
    /// File written to disk
    Downloaded {
        /// Where the bytes were written
        path: PathBuf,
        /// Number of bytes written
        bytes: u64,
    },
    /// Fetch or write failed; the attachment was skipped
    Failed {
        /// Name the file would have been stored under
        filename: String,
        /// Why it failed
        error: Error,
    },
}

/// Aggregated attachment results for one table
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DownloadSummary {
    /// Attachments written successfully
    pub files: u64,
    /// Total bytes written
    pub bytes: u64,
    /// Attachments skipped after a failure
    pub failed: u64,
}

impl DownloadSummary {
    /// Fold one outcome into the counters
    pub fn record(&mut self, outcome: &AttachmentOutcome) {
        match outcome {
            AttachmentOutcome::Downloaded { bytes, .. } => {
                self.files += 1;
                self.bytes += bytes;
            }
            AttachmentOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

impl std::ops::AddAssign for DownloadSummary {
    fn add_assign(&mut self, other: Self) {
        self.files += other.files;
        self.bytes += other.bytes;
        self.failed += other.failed;
    }
}

/// Totals for a whole run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BackupSummary {
    /// Run output directory
    pub root: PathBuf,
    /// Tables whose structure was saved
    pub tables: u64,
    /// Attachments downloaded
    pub files: u64,
    /// Attachments skipped after a failure
    pub failed_files: u64,
    /// Record JSON bytes plus attachment bytes
    pub bytes: u64,
}

impl BackupSummary {
    /// Total size in mebibytes
    pub fn megabytes(&self) -> f64 {
        self.bytes as f64 / (1024.0 * 1024.0)
    }
}
