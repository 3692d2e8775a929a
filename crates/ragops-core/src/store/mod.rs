//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait defines the storage operations needed by the
//! ingestion and retrieval pipelines, enabling pluggable backends (SQLite,
//! in-memory). Implementations must be `Send + Sync`; search, classify and
//! generate all run concurrently across requests.
//!
//! # Visibility
//!
//! Inserted records are staged until [`flush`](VectorIndex::flush) commits
//! them. [`search`](VectorIndex::search) only considers committed records,
//! and loads the collection into its queryable form on demand.

pub mod ivf;
pub mod memory;

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::{cosine_similarity, dot, squared_l2};
use crate::error::RagError;
use crate::models::{NewRecord, SearchHit};

/// Maximum stored text length, in characters.
pub const MAX_TEXT_CHARS: usize = 65_535;
/// Maximum stored source length, in characters.
pub const MAX_SOURCE_CHARS: usize = 500;

/// Distance metric used for similarity search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    /// Squared Euclidean distance; lower is closer.
    #[default]
    L2,
    /// Inner product; higher is closer.
    Ip,
    /// Cosine similarity; higher is closer.
    Cosine,
}

impl Metric {
    /// Ordering key where lower always means closer.
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::L2 => squared_l2(a, b),
            Metric::Ip => -dot(a, b),
            Metric::Cosine => 1.0 - cosine_similarity(a, b),
        }
    }

    /// Convert an ordering key into the score reported on a [`SearchHit`].
    pub fn score(self, distance: f32) -> f32 {
        match self {
            Metric::L2 => distance,
            Metric::Ip => -distance,
            Metric::Cosine => 1.0 - distance,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::L2 => "l2",
            Metric::Ip => "ip",
            Metric::Cosine => "cosine",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = RagError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l2" => Ok(Metric::L2),
            "ip" => Ok(Metric::Ip),
            "cosine" => Ok(Metric::Cosine),
            other => Err(RagError::Config(format!(
                "unknown metric '{}'. Must be l2, ip, or cosine.",
                other
            ))),
        }
    }
}

/// Declared shape of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSchema {
    pub name: String,
    /// Vector dimensionality; must match the embedding provider.
    pub dims: usize,
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>, dims: usize) -> Self {
        Self {
            name: name.into(),
            dims,
        }
    }

    /// Validate a record against the schema before it is staged.
    pub fn validate(&self, record: &NewRecord) -> std::result::Result<(), RagError> {
        if record.vector.len() != self.dims {
            return Err(RagError::Schema(format!(
                "vector has {} dimensions, collection '{}' expects {}",
                record.vector.len(),
                self.name,
                self.dims
            )));
        }
        let text_len = record.text.chars().count();
        if text_len > MAX_TEXT_CHARS {
            return Err(RagError::Schema(format!(
                "text is {} chars, limit is {}",
                text_len, MAX_TEXT_CHARS
            )));
        }
        let source_len = record.source.chars().count();
        if source_len > MAX_SOURCE_CHARS {
            return Err(RagError::Schema(format!(
                "source is {} chars, limit is {}",
                source_len, MAX_SOURCE_CHARS
            )));
        }
        Ok(())
    }
}

/// Similarity index tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexParams {
    pub metric: Metric,
    /// Number of partitions built over the vector field.
    pub nlist: usize,
    /// Number of partitions scanned per query.
    pub nprobe: usize,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            metric: Metric::L2,
            nlist: 128,
            nprobe: 10,
        }
    }
}

/// Abstract vector storage and search backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_collection`](VectorIndex::ensure_collection) | Idempotently create the collection and its index |
/// | [`insert`](VectorIndex::insert) | Stage a batch of records |
/// | [`flush`](VectorIndex::flush) | Commit staged records |
/// | [`search`](VectorIndex::search) | Top-k search over committed records |
/// | [`count`](VectorIndex::count) | Number of committed records |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// The schema this index was opened with.
    fn schema(&self) -> &CollectionSchema;

    /// Create the collection and its similarity index if absent.
    /// Safe to call repeatedly.
    async fn ensure_collection(&self) -> Result<()>;

    /// Stage records for writing. The whole batch is rejected if any record
    /// violates the schema. Returns the number of records staged.
    async fn insert(&self, records: Vec<NewRecord>) -> Result<usize>;

    /// Commit staged records so they are durable and searchable.
    async fn flush(&self) -> Result<()>;

    /// Return up to `k` committed records closest to `query`, best first.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    /// Number of committed records.
    async fn count(&self) -> Result<usize>;
}
