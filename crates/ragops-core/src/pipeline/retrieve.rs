//! Retrieval stage: embed the question and fetch the top matching chunks.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::models::Passage;
use crate::store::VectorIndex;

use super::{PipelineState, RunContext, Stage, StateUpdate};

/// Number of chunks fetched per question.
pub const TOP_K: usize = 3;

/// Outcome of a retrieval attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieval {
    /// One or more hits, best first.
    Passages(Vec<Passage>),
    /// The search ran and matched nothing.
    Empty,
    /// The embedder or the index failed.
    Degraded(String),
}

impl Retrieval {
    /// The document list this outcome contributes to the pipeline state.
    /// Never empty.
    pub fn into_passages(self) -> Vec<Passage> {
        match self {
            Retrieval::Passages(passages) => passages,
            Retrieval::Empty => vec![Passage::NoResults],
            Retrieval::Degraded(reason) => vec![Passage::Unavailable { reason }],
        }
    }
}

pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Fetch up to [`TOP_K`] passages for `question`.
    ///
    /// Failures are reported as [`Retrieval::Degraded`], never as errors.
    pub async fn retrieve(&self, question: &str) -> Retrieval {
        let vector = match self.embedder.embed_query(question).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "query embedding failed");
                return Retrieval::Degraded(format!("{:#}", e));
            }
        };

        let dims = self.index.schema().dims;
        if vector.len() != dims {
            let reason = format!(
                "query vector has {} dimensions, collection expects {}",
                vector.len(),
                dims
            );
            warn!(%reason, "query embedding rejected");
            return Retrieval::Degraded(reason);
        }

        match self.index.search(&vector, TOP_K).await {
            Ok(hits) if hits.is_empty() => {
                info!("retrieval matched nothing");
                Retrieval::Empty
            }
            Ok(hits) => {
                info!(hits = hits.len(), "retrieved passages");
                Retrieval::Passages(hits.into_iter().map(Passage::from).collect())
            }
            Err(e) => {
                warn!(error = %format!("{:#}", e), "vector search failed");
                Retrieval::Degraded(format!("{:#}", e))
            }
        }
    }
}

#[async_trait]
impl Stage for Retriever {
    fn name(&self) -> &'static str {
        "retrieve"
    }

    async fn run(&self, state: &PipelineState, _ctx: &RunContext) -> Result<StateUpdate> {
        let retrieval = self.retrieve(&state.question).await;
        Ok(StateUpdate::documents(retrieval.into_passages()))
    }
}
