//! Offline ingestion pipeline: split → embed → write → flush.
//!
//! All chunks across all input documents are embedded in a single provider
//! call and written as one batch followed by an explicit flush. Any
//! embedding or index failure aborts the run; nothing partial is left
//! staged because the write happens only after every vector is in hand.

use std::sync::Arc;

use tracing::{error, info};

use crate::chunk::RecursiveSplitter;
use crate::embedding::{check_batch, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::models::{Document, NewRecord};
use crate::store::VectorIndex;

/// Turns raw documents into searchable index records.
pub struct IngestionPipeline {
    splitter: RecursiveSplitter,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl IngestionPipeline {
    pub fn new(
        splitter: RecursiveSplitter,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            splitter,
            embedder,
            index,
        }
    }

    /// Ingest `documents` and return the number of vectors written.
    ///
    /// # Errors
    ///
    /// - [`RagError::Embedding`] if the provider fails or returns a batch of
    ///   the wrong shape.
    /// - [`RagError::Index`] if creating the collection, inserting, or
    ///   flushing fails (schema violations included).
    pub async fn run(&self, documents: &[Document]) -> Result<usize> {
        info!(documents = documents.len(), "starting ingestion");

        let mut texts = Vec::new();
        let mut sources = Vec::new();
        for doc in documents {
            for chunk in self.splitter.split_document(doc) {
                texts.push(chunk.text);
                sources.push(chunk.source);
            }
        }
        info!(chunks = texts.len(), "split documents");

        if texts.is_empty() {
            return Ok(0);
        }

        let vectors = self.embedder.embed_documents(&texts).await.map_err(|e| {
            error!(error = %e, "embedding failed during ingestion");
            RagError::embedding(e)
        })?;
        check_batch(&vectors, texts.len(), self.embedder.dims()).map_err(RagError::embedding)?;

        let records: Vec<NewRecord> = texts
            .into_iter()
            .zip(sources)
            .zip(vectors)
            .map(|((text, source), vector)| NewRecord {
                text,
                source,
                vector,
            })
            .collect();

        self.index.ensure_collection().await.map_err(RagError::index)?;
        let written = self.index.insert(records).await.map_err(|e| {
            error!(error = %e, "index insert failed during ingestion");
            RagError::index(e)
        })?;
        self.index.flush().await.map_err(RagError::index)?;

        info!(vectors = written, "ingestion complete");
        Ok(written)
    }
}
