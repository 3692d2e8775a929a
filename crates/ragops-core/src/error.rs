//! Error taxonomy for the answer and ingestion pipelines.
//!
//! Provider and index traits return `anyhow::Result`; the stage boundaries
//! classify those failures into a [`RagError`] so callers (CLI, HTTP layer)
//! can map them to user-visible outcomes.

use thiserror::Error;

/// Errors surfaced by the core pipelines.
#[derive(Debug, Error)]
pub enum RagError {
    /// The embedding provider failed or returned an unusable response.
    #[error("embedding provider error: {0}")]
    Embedding(String),

    /// The vector index was unreachable, misconfigured, or rejected a write.
    #[error("vector index error: {0}")]
    Index(String),

    /// A record violated the collection schema.
    #[error("schema violation: {0}")]
    Schema(String),

    /// The chat model call failed.
    #[error("language model error: {0}")]
    Model(String),

    /// The relevance grader returned something other than a yes/no score.
    #[error("malformed relevance grade: {raw}")]
    MalformedGrade { raw: String },

    /// Answer generation failed; fatal for the request.
    #[error("answer generation failed: {0}")]
    Generation(String),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// A stage broke an orchestrator invariant.
    #[error("pipeline error: {0}")]
    Pipeline(String),
}

impl RagError {
    pub(crate) fn embedding(err: anyhow::Error) -> Self {
        RagError::Embedding(format!("{:#}", err))
    }

    pub(crate) fn index(err: anyhow::Error) -> Self {
        RagError::Index(format!("{:#}", err))
    }
}

/// A convenience result type for core pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;
