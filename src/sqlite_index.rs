//! Durable [`VectorIndex`] backed by SQLite.
//!
//! Records live in the `records` table with their vectors stored as
//! little-endian f32 BLOBs. Inserts are staged in memory and written in a
//! single transaction on [`flush`](VectorIndex::flush). Searches run over an
//! in-memory [`IvfIndex`] that is loaded from the table on first use and
//! rebuilt after every flush.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use ragops_core::embedding::{blob_to_vec, vec_to_blob};
use ragops_core::models::{IndexRecord, NewRecord, SearchHit};
use ragops_core::store::ivf::IvfIndex;
use ragops_core::store::{CollectionSchema, IndexParams, Metric, VectorIndex};

pub struct SqliteIndex {
    pool: SqlitePool,
    schema: CollectionSchema,
    params: IndexParams,
    staged: Mutex<Vec<NewRecord>>,
    loaded: RwLock<Option<IvfIndex>>,
}

impl SqliteIndex {
    /// Wrap an open pool. Tables must already exist (see [`crate::migrate`]).
    pub fn new(pool: SqlitePool, schema: CollectionSchema, params: IndexParams) -> Self {
        Self {
            pool,
            schema,
            params,
            staged: Mutex::new(Vec::new()),
            loaded: RwLock::new(None),
        }
    }

    pub fn metric(&self) -> Metric {
        self.params.metric
    }

    async fn collection_dims(&self) -> Result<Option<i64>> {
        let dims: Option<i64> = sqlx::query_scalar("SELECT dims FROM collections WHERE name = ?")
            .bind(&self.schema.name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(dims)
    }

    async fn load(&self) -> Result<IvfIndex> {
        let rows: Vec<(i64, String, String, Vec<u8>)> = sqlx::query_as(
            "SELECT id, text, source, vector FROM records WHERE collection = ? ORDER BY id",
        )
        .bind(&self.schema.name)
        .fetch_all(&self.pool)
        .await?;

        let records: Vec<IndexRecord> = rows
            .into_iter()
            .map(|(id, text, source, blob)| IndexRecord {
                id,
                text,
                source,
                vector: blob_to_vec(&blob),
            })
            .collect();

        let index = IvfIndex::build(records, self.params.metric, self.params.nlist);
        info!(
            collection = %self.schema.name,
            records = index.len(),
            lists = index.list_count(),
            "loaded collection"
        );
        Ok(index)
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    async fn ensure_collection(&self) -> Result<()> {
        match self.collection_dims().await? {
            Some(dims) if dims as usize == self.schema.dims => Ok(()),
            Some(dims) => bail!(
                "collection '{}' exists with {} dimensions, configured for {}",
                self.schema.name,
                dims,
                self.schema.dims
            ),
            None => {
                sqlx::query(
                    "INSERT OR IGNORE INTO collections (name, dims, metric, nlist, created_at) \
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(&self.schema.name)
                .bind(self.schema.dims as i64)
                .bind(self.params.metric.as_str())
                .bind(self.params.nlist as i64)
                .bind(chrono::Utc::now().timestamp())
                .execute(&self.pool)
                .await?;
                info!(collection = %self.schema.name, dims = self.schema.dims, "created collection");
                Ok(())
            }
        }
    }

    async fn insert(&self, records: Vec<NewRecord>) -> Result<usize> {
        for record in &records {
            self.schema.validate(record)?;
        }
        if self.collection_dims().await?.is_none() {
            return Err(anyhow!("collection '{}' does not exist", self.schema.name));
        }
        let count = records.len();
        self.staged.lock().await.extend(records);
        debug!(staged = count, "records staged");
        Ok(count)
    }

    async fn flush(&self) -> Result<()> {
        // Drained up front: a failed commit discards the batch instead of
        // leaving it for the next flush.
        let batch = std::mem::take(&mut *self.staged.lock().await);
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for record in batch.iter() {
            sqlx::query(
                "INSERT INTO records (collection, text, source, vector) VALUES (?, ?, ?, ?)",
            )
            .bind(&self.schema.name)
            .bind(&record.text)
            .bind(&record.source)
            .bind(vec_to_blob(&record.vector))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!(records = batch.len(), "flushed records");
        *self.loaded.write().await = None;
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.ensure_collection().await?;

        if let Some(index) = self.loaded.read().await.as_ref() {
            return Ok(index.search(query, k, self.params.nprobe));
        }

        let mut loaded = self.loaded.write().await;
        if loaded.is_none() {
            *loaded = Some(self.load().await?);
        }
        Ok(loaded
            .as_ref()
            .map(|index| index.search(query, k, self.params.nprobe))
            .unwrap_or_default())
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(&self.schema.name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
