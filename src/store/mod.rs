//! Document store seam. Collections are keyed by string ids and hold JSON object bodies.

pub mod pg;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

/// Per-batch write ceiling of the destination store.
pub const MAX_BATCH_WRITES: usize = 500;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("batch of {size} writes exceeds the store limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },
}

/// A document as read from a source collection. Read-only to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub id: String,
    pub data: Value,
}

/// One merge write of a fully-resolved document body.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeWrite {
    pub id: String,
    pub fields: Map<String, Value>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn count(&self, collection: &str) -> Result<u64, StoreError>;

    /// Next page of documents ordered by id, strictly after `after`. Empty means exhausted.
    async fn fetch_page(
        &self,
        collection: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SourceRecord>, StoreError>;

    async fn server_time(&self) -> Result<DateTime<Utc>, StoreError>;

    /// Applies every write or none. Top-level fields are merged onto existing documents.
    async fn commit_batch(&self, collection: &str, writes: &[MergeWrite]) -> Result<(), StoreError>;
}

/// Row limits arrive as `usize`; Postgres wants a non-negative BIGINT.
pub(crate) fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

pub(crate) fn check_batch_size(size: usize) -> Result<(), StoreError> {
    if size > MAX_BATCH_WRITES {
        return Err(StoreError::BatchTooLarge { size, limit: MAX_BATCH_WRITES });
    }
    Ok(())
}
