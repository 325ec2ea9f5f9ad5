use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{check_batch_size, DocumentStore, MergeWrite, SourceRecord, StoreError};

#[derive(Default)]
struct State {
    collections: BTreeMap<String, BTreeMap<String, Value>>,
    commits: Vec<(String, usize)>,
    failing_commits: usize,
    reads_unavailable: bool,
}

/// In-memory store for tests. Commits are logged so batch sizes can be asserted.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    clock: Option<DateTime<Utc>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: DateTime<Utc>) -> Self {
        MemoryStore { state: Mutex::default(), clock: Some(clock) }
    }

    pub fn insert(&self, collection: &str, id: &str, data: Value) {
        let mut st = self.state.lock().unwrap();
        st.collections.entry(collection.to_string()).or_default().insert(id.to_string(), data);
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Value> {
        let st = self.state.lock().unwrap();
        st.collections.get(collection).and_then(|c| c.get(id)).cloned()
    }

    pub fn snapshot(&self, collection: &str) -> BTreeMap<String, Value> {
        let st = self.state.lock().unwrap();
        st.collections.get(collection).cloned().unwrap_or_default()
    }

    pub fn commit_sizes(&self) -> Vec<usize> {
        let st = self.state.lock().unwrap();
        st.commits.iter().map(|(_, n)| *n).collect()
    }

    /// The next `n` commits fail without applying anything.
    pub fn fail_next_commits(&self, n: usize) {
        self.state.lock().unwrap().failing_commits = n;
    }

    pub fn make_reads_unavailable(&self) {
        self.state.lock().unwrap().reads_unavailable = true;
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        let st = self.state.lock().unwrap();
        if st.reads_unavailable {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(st.collections.get(collection).map(|c| c.len() as u64).unwrap_or(0))
    }

    async fn fetch_page(
        &self,
        collection: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SourceRecord>, StoreError> {
        let st = self.state.lock().unwrap();
        if st.reads_unavailable {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let Some(docs) = st.collections.get(collection) else { return Ok(vec![]) };
        Ok(docs
            .iter()
            .filter(|(id, _)| after.is_none_or(|a| id.as_str() > a))
            .take(limit)
            .map(|(id, data)| SourceRecord { id: id.clone(), data: data.clone() })
            .collect())
    }

    async fn server_time(&self) -> Result<DateTime<Utc>, StoreError> {
        Ok(self.clock.unwrap_or_else(Utc::now))
    }

    async fn commit_batch(&self, collection: &str, writes: &[MergeWrite]) -> Result<(), StoreError> {
        check_batch_size(writes.len())?;
        let mut st = self.state.lock().unwrap();
        if st.failing_commits > 0 {
            st.failing_commits -= 1;
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let docs = st.collections.entry(collection.to_string()).or_default();
        for w in writes {
            let doc = docs.entry(w.id.clone()).or_insert_with(|| Value::Object(Default::default()));
            if !doc.is_object() {
                *doc = Value::Object(Default::default());
            }
            if let Value::Object(existing) = doc {
                for (k, v) in &w.fields {
                    existing.insert(k.clone(), v.clone());
                }
            }
        }
        st.commits.push((collection.to_string(), writes.len()));
        Ok(())
    }
}
