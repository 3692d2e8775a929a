//! In-memory [`VectorIndex`] implementation for tests and ephemeral use.
//!
//! Uses `Vec`s behind `std::sync::RwLock` for thread safety. Staged records
//! become visible on [`flush`](VectorIndex::flush); the partitioned index is
//! rebuilt lazily on the first search after a flush.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{IndexRecord, NewRecord, SearchHit};

use super::ivf::IvfIndex;
use super::{CollectionSchema, IndexParams, VectorIndex};

#[derive(Default)]
struct State {
    created: bool,
    next_id: i64,
    staged: Vec<IndexRecord>,
    committed: Vec<IndexRecord>,
    loaded: Option<IvfIndex>,
}

/// In-memory vector index.
pub struct InMemoryIndex {
    schema: CollectionSchema,
    params: IndexParams,
    state: RwLock<State>,
}

impl InMemoryIndex {
    pub fn new(schema: CollectionSchema, params: IndexParams) -> Self {
        Self {
            schema,
            params,
            state: RwLock::new(State {
                next_id: 1,
                ..State::default()
            }),
        }
    }

    /// Number of staged, not yet flushed records.
    pub fn staged(&self) -> usize {
        self.state.read().map(|s| s.staged.len()).unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory index lock poisoned")
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    async fn ensure_collection(&self) -> Result<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.created = true;
        Ok(())
    }

    async fn insert(&self, records: Vec<NewRecord>) -> Result<usize> {
        for record in &records {
            self.schema.validate(record)?;
        }
        let mut state = self.state.write().map_err(poisoned)?;
        if !state.created {
            return Err(anyhow!("collection '{}' does not exist", self.schema.name));
        }
        let count = records.len();
        for record in records {
            let id = state.next_id;
            state.next_id += 1;
            state.staged.push(IndexRecord {
                id,
                text: record.text,
                source: record.source,
                vector: record.vector,
            });
        }
        Ok(count)
    }

    async fn flush(&self) -> Result<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        let staged = std::mem::take(&mut state.staged);
        if !staged.is_empty() {
            state.committed.extend(staged);
            state.loaded = None;
        }
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.ensure_collection().await?;

        {
            let state = self.state.read().map_err(poisoned)?;
            if let Some(index) = &state.loaded {
                return Ok(index.search(query, k, self.params.nprobe));
            }
        }

        let mut state = self.state.write().map_err(poisoned)?;
        let index = IvfIndex::build(state.committed.clone(), self.params.metric, self.params.nlist);
        let hits = index.search(query, k, self.params.nprobe);
        state.loaded = Some(index);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.committed.len())
    }
}
