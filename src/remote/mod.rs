//! Source of table schemas and records
//!
//! The backup only needs two calls from the remote service, expressed by
//! [`RemoteSource`]. [`AirtableClient`] is the production implementation.

use crate::error::RemoteError;
use crate::types::{Record, TableMeta};
use async_trait::async_trait;

mod airtable;

pub use airtable::AirtableClient;

/// Lists tables and their records
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// All tables of the base, with their schema
    async fn list_tables(&self) -> Result<Vec<TableMeta>, RemoteError>;

    /// Every record of `table_name`, in API order
    async fn list_records(&self, table_name: &str) -> Result<Vec<Record>, RemoteError>;
}
