//! Airtable REST API implementation of [`RemoteSource`]

use super::RemoteSource;
use crate::config::AirtableConfig;
use crate::error::{RemoteError, TransferError};
use crate::transfer::{FetchOptions, TransferClient};
use crate::types::{Record, TableMeta};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

#[derive(Deserialize)]
struct TablesPage {
    tables: Vec<TableMeta>,
}

#[derive(Deserialize)]
struct RecordsPage {
    records: Vec<Record>,
    #[serde(default)]
    offset: Option<String>,
}

/// Reads schema and records of one base
#[derive(Clone, Debug)]
pub struct AirtableClient {
    http: TransferClient,
    config: AirtableConfig,
}

impl AirtableClient {
    /// Create a client that issues requests through `http`
    pub fn new(http: TransferClient, config: AirtableConfig) -> Self {
        Self { http, config }
    }

    fn base_url(&self) -> &str {
        self.config.api_url.trim_end_matches('/')
    }

    fn tables_url(&self) -> String {
        format!(
            "{}/v0/meta/bases/{}/tables",
            self.base_url(),
            urlencoding::encode(&self.config.base_id)
        )
    }

    fn records_url(&self, table_name: &str) -> String {
        format!(
            "{}/v0/{}/{}",
            self.base_url(),
            urlencoding::encode(&self.config.base_id),
            urlencoding::encode(table_name)
        )
    }

    /// Fetch `url` and decode its JSON body
    ///
    /// `on_transfer` maps a failed fetch into the caller's error; `what`
    /// names the payload in a decode error.
    async fn get_json<T, F>(
        &self,
        url: &str,
        options: &FetchOptions,
        what: impl Into<String>,
        on_transfer: F,
    ) -> Result<T, RemoteError>
    where
        T: DeserializeOwned,
        F: FnOnce(TransferError) -> RemoteError,
    {
        let body = self.http.fetch(url, options).await.map_err(on_transfer)?;
        serde_json::from_slice(&body).map_err(|source| RemoteError::Decode {
            what: what.into(),
            source,
        })
    }
}

#[async_trait]
impl RemoteSource for AirtableClient {
    async fn list_tables(&self) -> Result<Vec<TableMeta>, RemoteError> {
        let options = FetchOptions::bearer(&self.config.api_key);
        let page: TablesPage = self
            .get_json(&self.tables_url(), &options, "table metadata", RemoteError::Tables)
            .await?;

        tracing::debug!(count = page.tables.len(), "Fetched table metadata");
        Ok(page.tables)
    }

    async fn list_records(&self, table_name: &str) -> Result<Vec<Record>, RemoteError> {
        let url = self.records_url(table_name);
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut options = FetchOptions::bearer(&self.config.api_key);
            if let Some(cursor) = offset.take() {
                options = options.with_query("offset", cursor);
            }

            let page: RecordsPage = self
                .get_json(
                    &url,
                    &options,
                    format!("records of table {table_name}"),
                    |source| RemoteError::Records {
                        table: table_name.to_string(),
                        source,
                    },
                )
                .await?;

            records.extend(page.records);
            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        tracing::debug!(table = %table_name, count = records.len(), "Fetched records");
        Ok(records)
    }
}
