//! # RAGOps
//!
//! A retrieval-augmented question answering service with relevance grading
//! and A/B tracking of answer strategies.
//!
//! Documents are split into overlapping chunks, embedded, and stored in a
//! SQLite-backed vector collection. Each question runs through a three-stage
//! pipeline (retrieve, grade, generate) built in [`ragops_core`]. Every
//! tracked answer is recorded as a run so user feedback can be attached to
//! it and the two prompt strategies compared.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Documents  │──▶│ Chunk+Embed │──▶│    SQLite    │
//! │ files/sample│   │             │   │ records+IVF  │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │
//!                         ┌──────────────────┤
//!                         ▼                  ▼
//!                 ┌──────────────┐    ┌────────────┐
//!                 │ retrieve →   │    │ runs +     │
//!                 │ grade →      │───▶│ feedback   │
//!                 │ generate     │    └────────────┘
//!                 └──────┬───────┘
//!                ┌───────┴───────┐
//!                ▼               ▼
//!           ┌────────┐     ┌──────────┐
//!           │  CLI   │     │   HTTP   │
//!           └────────┘     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ragops init                       # create database
//! ragops ingest --sample            # load the sample documents
//! ragops ingest ./docs              # ingest *.md and *.txt files
//! ragops ask "What is the backend stack?"
//! ragops serve                      # start HTTP server
//! ragops runs                       # A/B readout
//! ragops eval                       # quality gate
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_index`] | Durable vector collection |
//! | [`embedding`] | Embedding providers |
//! | [`llm`] | Chat model providers |
//! | [`app`] | Pipeline and tracker wiring |
//! | [`tracking`] | Runs, feedback, and strategy summaries |
//! | [`ingest`] | Document loading and ingestion |
//! | [`search`] | Raw search and one-shot answers |
//! | [`server`] | HTTP server |
//! | [`eval`] | Offline evaluation |

pub mod app;
pub mod config;
pub mod db;
pub mod embedding;
pub mod eval;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod migrate;
pub mod sample;
pub mod search;
pub mod server;
pub mod sqlite_index;
pub mod tracking;
