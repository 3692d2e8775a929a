//! Core data models flowing through the ingestion and answer pipelines.

use serde::{Deserialize, Serialize};

/// Raw input unit handed to the ingestion pipeline.
///
/// Documents are never persisted themselves; only their chunks are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Full body text.
    pub text: String,
    /// Provenance identifier, usually a file name.
    pub source: String,
}

impl Document {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
        }
    }
}

/// A bounded-length piece of a [`Document`] produced by the splitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Inherited from the parent document.
    pub source: String,
    /// Contiguous position within the parent document, starting at 0.
    pub index: usize,
}

/// A record about to be written to a vector index. The index assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub text: String,
    pub source: String,
    pub vector: Vec<f32>,
}

/// A persisted record owned by the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    /// Index-assigned unique key.
    pub id: i64,
    pub text: String,
    pub source: String,
    pub vector: Vec<f32>,
}

/// A ranked result returned by [`VectorIndex::search`](crate::store::VectorIndex::search).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: i64,
    pub text: String,
    pub source: String,
    /// Distance for `l2` (lower is closer), similarity for `ip`/`cosine`.
    pub score: f32,
}

/// Passage text used when a search returns no hits.
pub const NO_RESULTS_TEXT: &str = "No relevant documents found in the database.";

/// One unit of retrieved context in the answer pipeline.
///
/// The sentinel variants travel through grading and generation like any
/// other passage but stay distinguishable from real hits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Passage {
    /// A chunk returned by the vector index.
    Hit { text: String, source: String },
    /// The search succeeded but matched nothing.
    NoResults,
    /// The embedder or the index failed; context is unavailable.
    Unavailable { reason: String },
}

impl Passage {
    /// Human-readable form handed to the grader and the prompt templates.
    pub fn render(&self) -> String {
        match self {
            Passage::Hit { text, source } => format!("Content: {}\nSource: {}", text, source),
            Passage::NoResults => NO_RESULTS_TEXT.to_string(),
            Passage::Unavailable { reason } => {
                format!("Error connecting to vector database: {}", reason)
            }
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Passage::Hit { .. })
    }
}

impl From<SearchHit> for Passage {
    fn from(hit: SearchHit) -> Self {
        Passage::Hit {
            text: hit.text,
            source: hit.source,
        }
    }
}
