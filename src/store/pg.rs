use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use super::{check_batch_size, sql_limit, DocumentStore, MergeWrite, SourceRecord, StoreError};

// A non-object body on the existing row is replaced, not array-concatenated.
const MERGE_DOCUMENT: &str = r#"
    INSERT INTO docstore.document (collection, doc_id, data, created_at, updated_at)
    VALUES ($1, $2, $3, now(), now())
    ON CONFLICT (collection, doc_id) DO UPDATE
      SET data       = CASE WHEN jsonb_typeof(docstore.document.data) = 'object'
                            THEN docstore.document.data
                            ELSE '{}'::jsonb
                       END || EXCLUDED.data,
          updated_at = now()
"#;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub async fn collection_counts(&self) -> Result<Vec<(String, i64)>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT d.collection, COUNT(*)::bigint AS n
            FROM docstore.document d
            GROUP BY d.collection
            ORDER BY d.collection
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            out.push((r.try_get::<String, _>("collection")?, r.try_get::<i64, _>("n")?));
        }
        Ok(out)
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        let n: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*)::bigint FROM docstore.document d WHERE d.collection = $1"#,
        )
        .bind(collection)
        .fetch_one(&self.pool)
        .await?;
        Ok(n.max(0) as u64)
    }

    async fn fetch_page(
        &self,
        collection: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SourceRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT d.doc_id, d.data
            FROM docstore.document d
            WHERE d.collection = $1
              AND ($2::text IS NULL OR d.doc_id > $2)
            ORDER BY d.doc_id
            LIMIT $3
            "#,
        )
        .bind(collection)
        .bind(after)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let id: String = r.try_get("doc_id")?;
            let Json(data): Json<Value> = r.try_get("data")?;
            out.push(SourceRecord { id, data });
        }
        Ok(out)
    }

    async fn server_time(&self) -> Result<DateTime<Utc>, StoreError> {
        let now: DateTime<Utc> = sqlx::query_scalar("SELECT now()").fetch_one(&self.pool).await?;
        Ok(now)
    }

    async fn commit_batch(&self, collection: &str, writes: &[MergeWrite]) -> Result<(), StoreError> {
        check_batch_size(writes.len())?;
        if writes.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for w in writes {
            sqlx::query(MERGE_DOCUMENT)
            .bind(collection)
            .bind(&w.id)
            .bind(Json(&w.fields))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
