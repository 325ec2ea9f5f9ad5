use crate::store::{DocumentStore, SourceRecord};

use super::error::MigrateError;

/// Forward-only keyset pager over a collection, in id order.
pub struct SourceReader<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    collection: String,
    page_size: usize,
    cursor: Option<String>,
    exhausted: bool,
}

pub fn read_all<'a, S: DocumentStore + ?Sized>(store: &'a S, collection: &str, page_size: usize) -> SourceReader<'a, S> {
    SourceReader {
        store,
        collection: collection.to_string(),
        page_size: page_size.max(1),
        cursor: None,
        exhausted: false,
    }
}

impl<'a, S: DocumentStore + ?Sized> SourceReader<'a, S> {
    /// Next page of records; empty once the collection is exhausted.
    pub async fn next_page(&mut self) -> Result<Vec<SourceRecord>, MigrateError> {
        if self.exhausted {
            return Ok(vec![]);
        }
        let page = self
            .store
            .fetch_page(&self.collection, self.cursor.as_deref(), self.page_size)
            .await
            .map_err(|source| MigrateError::SourceUnavailable { collection: self.collection.clone(), source })?;

        if page.len() < self.page_size {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.cursor = Some(last.id.clone());
        }
        Ok(page)
    }
}
