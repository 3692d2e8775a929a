//! # RAG Ops Core
//!
//! Runtime-agnostic logic for RAG Ops: data models, the recursive text
//! splitter, the embedding / vector index / chat model traits, an in-memory
//! partitioned vector index, the ingestion pipeline, and the online
//! retrieve → grade → generate answer pipeline.
//!
//! This crate contains no tokio, sqlx, HTTP clients, or filesystem I/O.
//! Concrete providers and the durable index live in the `ragops` app crate
//! and are injected as `Arc<dyn …>` trait objects.
//!
//! ```text
//!  Documents ──▶ RecursiveSplitter ──▶ EmbeddingProvider ──▶ VectorIndex
//!                                                               │
//!  question ──▶ Retriever ──▶ RelevanceGrader ──▶ AnswerGenerator
//!                   ▲                                 │
//!                   └──────── PipelineState ──────────┘
//! ```

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod store;

pub use error::RagError;
