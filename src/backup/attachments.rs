//! Attachment fan-out: one table's records in, files on disk out.
//!
//! Records are processed strictly in order. Within a record every attachment
//! of every eligible field is submitted to the shared limiter at once, and the
//! next record starts only after all of them have settled. A failed
//! attachment becomes an [`AttachmentOutcome::Failed`] and never aborts the
//! batch; only run-level directory creation errors propagate.

use super::lifecycle::BackupRun;
use crate::error::{Error, Result};
use crate::limiter::ConcurrencyLimiter;
use crate::transfer::{FetchOptions, TransferClient};
use crate::types::{Attachment, AttachmentOutcome, DownloadSummary, Record};
use futures::future::join_all;
use std::path::PathBuf;

/// Downloads record attachments through a shared [`ConcurrencyLimiter`]
#[derive(Clone, Debug)]
pub struct AttachmentDownloader {
    client: TransferClient,
    limiter: ConcurrencyLimiter,
}

impl AttachmentDownloader {
    /// Create a downloader; clones of `limiter` elsewhere share its cap
    pub fn new(client: TransferClient, limiter: ConcurrencyLimiter) -> Self {
        Self { client, limiter }
    }

    /// The limiter every download is admitted through
    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Download every attachment of `records` into the run directory
    ///
    /// Files land at `<root>/<table>/<record id>/<field>/<filename>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if an attachment directory cannot be created.
    /// Individual download failures are logged and counted, not returned.
    pub async fn download_attachments(
        &self,
        run: &BackupRun,
        table_name: &str,
        records: &[Record],
    ) -> Result<DownloadSummary> {
        let mut summary = DownloadSummary::default();
        let total = records.len();

        for (index, record) in records.iter().enumerate() {
            for outcome in self.download_record(run, table_name, record).await? {
                summary.record(&outcome);
            }
            tracing::info!(
                table = %table_name,
                processed = index + 1,
                total,
                "Processed records"
            );
        }

        Ok(summary)
    }

    /// Download one record's attachments and wait for all of them to settle
    ///
    /// Destination directories are created before any download of their
    /// field begins. Records without attachment fields create nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if an attachment directory cannot be created.
    pub async fn download_record(
        &self,
        run: &BackupRun,
        table_name: &str,
        record: &Record,
    ) -> Result<Vec<AttachmentOutcome>> {
        let mut downloads = Vec::new();

        for (field, attachments) in record.attachment_fields() {
            let dir = run.attachment_dir(table_name, &record.id, field)?;
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| Error::io(&dir, e))?;

            for attachment in attachments {
                downloads.push(self.download_one(attachment, dir.clone()));
            }
        }

        Ok(join_all(downloads).await)
    }

    async fn download_one(&self, attachment: Attachment, dir: PathBuf) -> AttachmentOutcome {
        let filename = attachment.file_name();
        let path = dir.join(&filename);

        let result = self
            .limiter
            .run(async {
                let body = self
                    .client
                    .fetch(&attachment.url, &FetchOptions::default())
                    .await?;
                tokio::fs::write(&path, &body)
                    .await
                    .map_err(|e| Error::io(&path, e))?;
                Ok::<_, Error>(body.len() as u64)
            })
            .await
            .and_then(|inner| inner);

        match result {
            Ok(bytes) => {
                tracing::debug!(path = %path.display(), bytes, "Downloaded attachment");
                AttachmentOutcome::Downloaded { path, bytes }
            }
            Err(error) => {
                tracing::warn!(
                    filename = %filename,
                    url = %attachment.url,
                    error = %error,
                    "Failed to download attachment"
                );
                AttachmentOutcome::Failed { filename, error }
            }
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn downloader(cap: usize) -> AttachmentDownloader {
        let client = TransferClient::new(
            Duration::from_secs(5),
            RetryConfig {
                max_attempts: 2,
                initial_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(10),
                backoff_multiplier: 2.0,
                jitter: false,
            },
        )
        .unwrap();
        AttachmentDownloader::new(client, ConcurrencyLimiter::new(cap))
    }

    async fn active_run(temp: &TempDir) -> BackupRun {
        let mut run = BackupRun::new(temp.path().join("run"));
        run.initialize().await.unwrap();
        run
    }

    async fn serve(server: &MockServer, file: &str, body: &[u8]) {
        Mock::given(method("GET"))
            .and(path(format!("/{file}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
            .mount(server)
            .await;
    }

    fn descriptor(server: &MockServer, file: &str) -> serde_json::Value {
        json!({ "url": format!("{}/{file}", server.uri()), "filename": file })
    }

    #[tokio::test]
    async fn writes_to_table_record_field_path() {
        let server = MockServer::start().await;
        serve(&server, "a.png", b"PNGDATA").await;
        let temp = TempDir::new().unwrap();
        let mut run = active_run(&temp).await;

        let record = Record::new("rec123").with_field("Photo", json!([descriptor(&server, "a.png")]));
        let summary = downloader(20)
            .download_attachments(&run, "Users", &[record])
            .await
            .unwrap();

        let expected = run.root().join("Users").join("rec123").join("Photo").join("a.png");
        assert_eq!(std::fs::read(&expected).unwrap(), b"PNGDATA");
        assert_eq!(
            summary,
            DownloadSummary {
                files: 1,
                bytes: 7,
                failed: 0
            }
        );
        run.retain().unwrap();
    }

    #[tokio::test]
    async fn record_without_attachments_creates_nothing() {
        let temp = TempDir::new().unwrap();
        let mut run = active_run(&temp).await;

        let record = Record::new("rec1")
            .with_field("Name", json!("Ada"))
            .with_field("Tags", json!(["x", "y"]))
            .with_field("Empty", json!([]));
        let summary = downloader(20)
            .download_attachments(&run, "Users", &[record])
            .await
            .unwrap();

        assert_eq!(summary, DownloadSummary::default());
        assert!(!run.root().join("Users").exists());
        run.retain().unwrap();
    }

    #[tokio::test]
    async fn failed_attachment_is_isolated() {
        let server = MockServer::start().await;
        serve(&server, "one.txt", b"12345").await;
        serve(&server, "two.txt", b"abc").await;
        Mock::given(method("GET"))
            .and(path("/broken.txt"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let temp = TempDir::new().unwrap();
        let mut run = active_run(&temp).await;

        let record = Record::new("rec1").with_field(
            "Files",
            json!([
                descriptor(&server, "one.txt"),
                descriptor(&server, "broken.txt"),
                descriptor(&server, "two.txt")
            ]),
        );
        let downloader = downloader(2);
        let outcomes = downloader
            .download_record(&run, "Docs", &record)
            .await
            .unwrap();

        let failed: Vec<_> = outcomes
            .iter()
            .filter_map(|o| match o {
                AttachmentOutcome::Failed { filename, .. } => Some(filename.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(failed, ["broken.txt"]);

        let summary = downloader
            .download_attachments(&run, "Docs", &[record])
            .await
            .unwrap();
        assert_eq!(
            summary,
            DownloadSummary {
                files: 2,
                bytes: 8,
                failed: 1
            }
        );
        let dir = run.root().join("Docs").join("rec1").join("Files");
        assert!(!dir.join("broken.txt").exists());
        assert_eq!(downloader.limiter().in_flight(), 0);
        run.retain().unwrap();
    }

    #[tokio::test]
    async fn descriptors_without_url_are_skipped_silently() {
        let server = MockServer::start().await;
        serve(&server, "a.png", b"A").await;
        let temp = TempDir::new().unwrap();
        let mut run = active_run(&temp).await;

        let record = Record::new("rec1").with_field(
            "Photo",
            json!([descriptor(&server, "a.png"), { "filename": "ghost.png" }]),
        );
        let summary = downloader(20)
            .download_attachments(&run, "Users", &[record])
            .await
            .unwrap();

        assert_eq!(
            summary,
            DownloadSummary {
                files: 1,
                bytes: 1,
                failed: 0
            }
        );
        run.retain().unwrap();
    }

    #[tokio::test]
    async fn multiple_fields_and_records() {
        let server = MockServer::start().await;
        for file in ["a.png", "b.pdf", "c.jpg"] {
            serve(&server, file, file.as_bytes()).await;
        }
        let temp = TempDir::new().unwrap();
        let mut run = active_run(&temp).await;

        let records = vec![
            Record::new("rec1")
                .with_field("Photo", json!([descriptor(&server, "a.png")]))
                .with_field("Contract", json!([descriptor(&server, "b.pdf")])),
            Record::new("rec2").with_field("Photo", json!([descriptor(&server, "c.jpg")])),
        ];
        let summary = downloader(1)
            .download_attachments(&run, "Users", &records)
            .await
            .unwrap();

        assert_eq!(summary.files, 3);
        assert_eq!(summary.bytes, 5 + 5 + 5);
        let root = run.root().join("Users");
        assert!(root.join("rec1/Photo/a.png").is_file());
        assert!(root.join("rec1/Contract/b.pdf").is_file());
        assert!(root.join("rec2/Photo/c.jpg").is_file());
        run.retain().unwrap();
    }

    #[tokio::test]
    async fn duplicate_filenames_overwrite() {
        let server = MockServer::start().await;
        serve(&server, "v1/same.txt", b"first").await;
        serve(&server, "v2/same.txt", b"second!").await;
        let temp = TempDir::new().unwrap();
        let mut run = active_run(&temp).await;

        let record = Record::new("rec1").with_field(
            "Files",
            json!([
                { "url": format!("{}/v1/same.txt", server.uri()), "filename": "same.txt" },
                { "url": format!("{}/v2/same.txt", server.uri()), "filename": "same.txt" }
            ]),
        );
        let summary = downloader(1)
            .download_attachments(&run, "Docs", &[record])
            .await
            .unwrap();

        // Both count; one file survives
        assert_eq!(summary.files, 2);
        let written = std::fs::read(run.root().join("Docs/rec1/Files/same.txt")).unwrap();
        assert!(written == b"first" || written == b"second!");
        run.retain().unwrap();
    }

    #[tokio::test]
    async fn fields_differing_by_reserved_character_keep_both_files() {
        let server = MockServer::start().await;
        serve(&server, "one/a.png", b"FIELD-ONE").await;
        serve(&server, "two/a.png", b"FIELD-TWO").await;
        let temp = TempDir::new().unwrap();
        let mut run = active_run(&temp).await;

        let record = Record::new("rec1")
            .with_field(
                "Photo?",
                json!([{ "url": format!("{}/one/a.png", server.uri()), "filename": "a.png" }]),
            )
            .with_field(
                "Photo",
                json!([{ "url": format!("{}/two/a.png", server.uri()), "filename": "a.png" }]),
            );
        let summary = downloader(4)
            .download_attachments(&run, "Users", &[record])
            .await
            .unwrap();

        assert_eq!(summary.files, 2);
        let root = run.root().join("Users/rec1");
        assert_eq!(std::fs::read(root.join("Photo%3F/a.png")).unwrap(), b"FIELD-ONE");
        assert_eq!(std::fs::read(root.join("Photo/a.png")).unwrap(), b"FIELD-TWO");
        run.retain().unwrap();
    }

    #[tokio::test]
    async fn directory_creation_failure_is_fatal() {
        let temp = TempDir::new().unwrap();
        let mut run = active_run(&temp).await;
        // A file where the table directory should go
        std::fs::write(run.root().join("Users"), b"blocker").unwrap();

        let record = Record::new("rec1").with_field(
            "Photo",
            json!([{ "url": "http://127.0.0.1:9/a.png", "filename": "a.png" }]),
        );
        let err = downloader(20)
            .download_attachments(&run, "Users", &[record])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Io { .. }), "got {err:?}");
        run.retain().unwrap();
    }
}
