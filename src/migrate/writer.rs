use std::time::Duration;

use tracing::Instrument;

use crate::store::{DocumentStore, MergeWrite, StoreError, MAX_BATCH_WRITES};
use crate::telemetry::{self};
use crate::telemetry::ops::migrate::Phase as MigratePhase;

use super::error::MigrateError;
use super::profile::PublicProfile;

/// Staged merge writes waiting for one atomic commit.
#[derive(Debug)]
pub struct Batch {
    writes: Vec<(String, PublicProfile)>,
    limit: usize,
}

impl Batch {
    pub fn new(limit: usize) -> Self {
        Batch { writes: Vec::with_capacity(limit), limit }
    }

    pub fn len(&self) -> usize { self.writes.len() }
    pub fn is_empty(&self) -> bool { self.writes.is_empty() }
    pub fn is_full(&self) -> bool { self.writes.len() >= self.limit }

    fn push(&mut self, id: String, profile: PublicProfile) {
        debug_assert!(!self.is_full(), "batch staged past its limit");
        self.writes.push((id, profile));
    }

    fn take(&mut self) -> Vec<(String, PublicProfile)> {
        std::mem::replace(&mut self.writes, Vec::with_capacity(self.limit))
    }
}

/// Retries of a failed batch commit. `max_retries == 0` makes the first failure final.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        RetryPolicy { max_retries: 0, base_delay: Duration::ZERO }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

pub struct BatchWriter<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    collection: String,
    batch: Batch,
    retry: RetryPolicy,
    committed_batches: usize,
    committed_writes: usize,
}

/// Clamp a requested batch size to what the store accepts in one commit.
pub fn effective_batch_size(requested: usize) -> usize {
    requested.clamp(1, MAX_BATCH_WRITES)
}

impl<'a, S: DocumentStore + ?Sized> BatchWriter<'a, S> {
    pub fn new(store: &'a S, collection: &str, batch_size: usize, retry: RetryPolicy) -> Self {
        BatchWriter {
            store,
            collection: collection.to_string(),
            batch: Batch::new(effective_batch_size(batch_size)),
            retry,
            committed_batches: 0,
            committed_writes: 0,
        }
    }

    pub fn stage(&mut self, id: String, profile: PublicProfile) {
        self.batch.push(id, profile);
    }

    pub async fn flush_if_full(&mut self) -> Result<(), MigrateError> {
        if self.batch.is_full() { self.flush().await } else { Ok(()) }
    }

    pub async fn flush_remaining(&mut self) -> Result<(), MigrateError> {
        if self.batch.is_empty() { Ok(()) } else { self.flush().await }
    }

    pub fn committed_batches(&self) -> usize { self.committed_batches }
    pub fn committed_writes(&self) -> usize { self.committed_writes }
    pub fn staged(&self) -> usize { self.batch.len() }

    async fn flush(&mut self) -> Result<(), MigrateError> {
        let log = telemetry::migrate();
        let staged = self.batch.take();
        let number = self.committed_batches + 1;
        let span = log.span_kv(&MigratePhase::Commit, [
            ("batch", number.to_string()),
            ("size", staged.len().to_string()),
        ]);

        let mut attempt = 0u32;
        loop {
            match self.commit_once(&staged).instrument(span.clone()).await {
                Ok(()) => break,
                Err(e) if attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    log.warn_kv(&format!("⚠️  batch #{} commit failed, retrying in {:?}: {}", number, delay, e), [
                        ("batch", number.to_string()),
                        ("attempt", (attempt + 1).to_string()),
                        ("error", e.to_string()),
                    ]);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(source) => {
                    return Err(MigrateError::BatchCommitFailed {
                        collection: self.collection.clone(),
                        batch: number,
                        size: staged.len(),
                        attempts: attempt + 1,
                        source,
                    });
                }
            }
        }

        self.committed_batches = number;
        self.committed_writes += staged.len();
        log.info_kv(&format!("💾 Committed batch #{} of {} documents", number, staged.len()), [
            ("batch", number.to_string()),
            ("size", staged.len().to_string()),
            ("total", self.committed_writes.to_string()),
        ]);
        Ok(())
    }

    async fn commit_once(&self, staged: &[(String, PublicProfile)]) -> Result<(), StoreError> {
        // One clock reading per commit, so generated createdAt/updatedAt agree.
        let now = self.store.server_time().await?;
        let writes: Vec<MergeWrite> = staged
            .iter()
            .map(|(id, p)| MergeWrite { id: id.clone(), fields: p.to_fields(now) })
            .collect();
        self.store.commit_batch(&self.collection, &writes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::profile::extract;
    use crate::store::memory::MemoryStore;
    use serde_json::json;

    fn profile(id: &str) -> PublicProfile {
        extract(id, &json!({ "displayName": id })).unwrap()
    }

    async fn stage_all<S: DocumentStore>(w: &mut BatchWriter<'_, S>, n: usize) -> Result<(), MigrateError> {
        for i in 0..n {
            let id = format!("u{i:04}");
            w.stage(id.clone(), profile(&id));
            w.flush_if_full().await?;
        }
        w.flush_remaining().await
    }

    #[tokio::test]
    async fn commits_never_exceed_the_batch_limit() {
        let store = MemoryStore::new();
        let mut w = BatchWriter::new(&store, "publicProfiles", 500, RetryPolicy::none());
        stage_all(&mut w, 501).await.unwrap();
        assert_eq!(store.commit_sizes(), vec![500, 1]);
        assert_eq!(w.committed_batches(), 2);
        assert_eq!(w.committed_writes(), 501);
        assert_eq!(store.snapshot("publicProfiles").len(), 501);
    }

    #[tokio::test]
    async fn oversized_batch_request_is_clamped() {
        let store = MemoryStore::new();
        let mut w = BatchWriter::new(&store, "publicProfiles", 10_000, RetryPolicy::none());
        stage_all(&mut w, 1_200).await.unwrap();
        assert_eq!(store.commit_sizes(), vec![500, 500, 200]);
    }

    #[tokio::test]
    async fn empty_writer_commits_nothing() {
        let store = MemoryStore::new();
        let mut w = BatchWriter::new(&store, "publicProfiles", 500, RetryPolicy::none());
        w.flush_remaining().await.unwrap();
        assert!(store.commit_sizes().is_empty());
    }

    #[tokio::test]
    async fn merge_keeps_fields_outside_the_schema() {
        let store = MemoryStore::new();
        store.insert("publicProfiles", "u0000", json!({ "badge": "early", "bio": "old" }));
        let mut w = BatchWriter::new(&store, "publicProfiles", 500, RetryPolicy::none());
        stage_all(&mut w, 1).await.unwrap();
        let doc = store.get("publicProfiles", "u0000").unwrap();
        assert_eq!(doc["badge"], json!("early"));
        assert_eq!(doc["bio"], serde_json::Value::Null);
        assert_eq!(doc["displayName"], json!("u0000"));
    }

    #[tokio::test]
    async fn merge_replaces_a_non_object_body() {
        let store = MemoryStore::new();
        store.insert("publicProfiles", "u0000", json!(["legacy"]));
        let mut w = BatchWriter::new(&store, "publicProfiles", 500, RetryPolicy::none());
        stage_all(&mut w, 1).await.unwrap();
        let doc = store.get("publicProfiles", "u0000").unwrap();
        assert!(doc.is_object());
        assert_eq!(doc["id"], json!("u0000"));
    }

    #[tokio::test]
    async fn commit_failure_without_retry_is_fatal() {
        let store = MemoryStore::new();
        store.fail_next_commits(1);
        let mut w = BatchWriter::new(&store, "publicProfiles", 2, RetryPolicy::none());
        let err = stage_all(&mut w, 3).await.unwrap_err();
        match err {
            MigrateError::BatchCommitFailed { batch, size, attempts, .. } => {
                assert_eq!((batch, size, attempts), (1, 2, 1));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.snapshot("publicProfiles").is_empty());
    }

    #[tokio::test]
    async fn retry_recovers_a_transient_commit_failure() {
        let store = MemoryStore::new();
        store.fail_next_commits(2);
        let retry = RetryPolicy { max_retries: 3, base_delay: Duration::from_millis(1) };
        let mut w = BatchWriter::new(&store, "publicProfiles", 500, retry);
        stage_all(&mut w, 3).await.unwrap();
        assert_eq!(store.commit_sizes(), vec![3]);
        assert_eq!(w.committed_batches(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_fail_the_batch() {
        let store = MemoryStore::new();
        store.fail_next_commits(3);
        let retry = RetryPolicy { max_retries: 2, base_delay: Duration::from_millis(1) };
        let mut w = BatchWriter::new(&store, "publicProfiles", 500, retry);
        let err = stage_all(&mut w, 1).await.unwrap_err();
        match err {
            MigrateError::BatchCommitFailed { batch, size, attempts, .. } => {
                assert_eq!((batch, size, attempts), (1, 1, 3));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.snapshot("publicProfiles").is_empty());
        assert!(store.commit_sizes().is_empty());
        assert_eq!(w.committed_batches(), 0);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let retry = RetryPolicy { max_retries: 3, base_delay: Duration::from_millis(100) };
        assert_eq!(retry.delay_for(0), Duration::from_millis(100));
        assert_eq!(retry.delay_for(1), Duration::from_millis(200));
        assert_eq!(retry.delay_for(3), Duration::from_millis(800));
    }
}
