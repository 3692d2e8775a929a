//! TOML configuration loading and validation.
//!
//! Every section except `[db]` is optional and falls back to the defaults
//! of the original deployment (`rag_knowledge_base`, 1536-dim
//! `text-embedding-3-small`, `gpt-4o-mini`, experiment `agentic_rag_v1`).
//! API keys are read from the environment, never from the file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use ragops_core::chunk::RecursiveSplitter;
use ragops_core::store::{CollectionSchema, IndexParams, Metric};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    pub db: DbConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub experiment: ExperimentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_project_name")]
    pub project_name: String,
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            environment: default_environment(),
        }
    }
}

fn default_project_name() -> String {
    "RAG Ops System".to_string()
}
fn default_environment() -> String {
    "development".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    #[serde(default = "default_collection_name")]
    pub name: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default = "default_nlist")]
    pub nlist: usize,
    #[serde(default = "default_nprobe")]
    pub nprobe: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            name: default_collection_name(),
            dims: default_dims(),
            metric: default_metric(),
            nlist: default_nlist(),
            nprobe: default_nprobe(),
        }
    }
}

fn default_collection_name() -> String {
    "rag_knowledge_base".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_metric() -> String {
    "l2".to_string()
}
fn default_nlist() -> usize {
    128
}
fn default_nprobe() -> usize {
    10
}

impl CollectionConfig {
    pub fn schema(&self) -> CollectionSchema {
        CollectionSchema::new(self.name.clone(), self.dims)
    }

    pub fn index_params(&self) -> Result<IndexParams> {
        let metric: Metric = self.metric.parse()?;
        Ok(IndexParams {
            metric,
            nlist: self.nlist,
            nprobe: self.nprobe,
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    1000
}
fn default_overlap_chars() -> usize {
    200
}

impl ChunkingConfig {
    pub fn splitter(&self) -> Result<RecursiveSplitter> {
        Ok(RecursiveSplitter::new(self.max_chars, self.overlap_chars)?)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn model_or_default(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| "text-embedding-3-small".to_string())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Model used by the relevance grader. Defaults to `model`.
    #[serde(default)]
    pub grader_model: Option<String>,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            grader_model: None,
            base_url: default_llm_base_url(),
            max_retries: default_llm_max_retries(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_llm_max_retries() -> u32 {
    3
}
fn default_llm_timeout_secs() -> u64 {
    60
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_prefix: default_api_prefix(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExperimentConfig {
    #[serde(default = "default_experiment_name")]
    pub name: String,
    /// Probability that a request is served with strategy B.
    #[serde(default = "default_split")]
    pub split: f64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            name: default_experiment_name(),
            split: default_split(),
        }
    }
}

fn default_experiment_name() -> String {
    "agentic_rag_v1".to_string()
}
fn default_split() -> f64 {
    0.5
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Collection
    if config.collection.dims == 0 {
        bail!("collection.dims must be > 0");
    }
    if config.collection.nlist == 0 {
        bail!("collection.nlist must be >= 1");
    }
    if config.collection.nprobe == 0 {
        bail!("collection.nprobe must be >= 1");
    }
    config.collection.index_params()?;

    // Chunking
    if config.chunking.max_chars == 0 {
        bail!("chunking.max_chars must be > 0");
    }
    // Zero overlap is allowed and disables the shared window.
    config.chunking.splitter()?;

    // Embedding
    match config.embedding.provider.as_str() {
        "openai" | "ollama" | "hash" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be openai, ollama, hash, or local.",
            other
        ),
    }
    if let Some(dims) = config.embedding.dims {
        if dims != config.collection.dims {
            bail!(
                "embedding.dims ({}) must match collection.dims ({})",
                dims,
                config.collection.dims
            );
        }
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    // LLM
    match config.llm.provider.as_str() {
        "openai" | "disabled" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be openai or disabled.",
            other
        ),
    }

    // Experiment
    if !(0.0..=1.0).contains(&config.experiment.split) {
        bail!("experiment.split must be in [0.0, 1.0]");
    }

    // Server
    if !config.server.api_prefix.starts_with('/') {
        bail!("server.api_prefix must start with '/'");
    }

    Ok(())
}
