//! Application wiring: builds the index, providers, answer pipeline and run
//! tracker from a [`Config`], and runs one tracked answer request.

use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

use ragops_core::embedding::EmbeddingProvider;
use ragops_core::ingest::IngestionPipeline;
use ragops_core::llm::ChatModel;
use ragops_core::models::Passage;
use ragops_core::pipeline::{AnswerGenerator, Pipeline, RelevanceGrader, Retriever, Strategy};

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::llm::{create_chat_models, ChatModels};
use crate::migrate;
use crate::sqlite_index::SqliteIndex;
use crate::tracking::RunTracker;

/// The answer to one tracked request.
#[derive(Debug, Clone)]
pub struct Answer {
    pub run_id: String,
    pub strategy: Strategy,
    pub answer: String,
    /// Passages that survived grading, in retrieval order.
    pub documents: Vec<Passage>,
}

impl Answer {
    pub fn rendered_documents(&self) -> Vec<String> {
        self.documents.iter().map(Passage::render).collect()
    }
}

/// Open the configured collection without building any chat model.
pub async fn open_index(config: &Config) -> Result<Arc<SqliteIndex>> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    Ok(Arc::new(SqliteIndex::new(
        pool,
        config.collection.schema(),
        config.collection.index_params()?,
    )))
}

/// Long-lived application state shared by the CLI and the HTTP server.
pub struct RagApp {
    pub config: Config,
    pub index: Arc<SqliteIndex>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub pipeline: Pipeline,
    pub tracker: RunTracker,
    /// The grader model, reused by `ragops eval --judge`.
    pub judge: Arc<dyn ChatModel>,
}

impl RagApp {
    /// Open the database and build every provider from configuration.
    pub async fn open(config: &Config) -> Result<Self> {
        let embedder = create_embedder(config)?;
        let models = create_chat_models(&config.llm)?;
        let pool = db::connect(config).await?;
        Self::assemble(config, pool, embedder, models).await
    }

    /// Like [`RagApp::open`] but with caller-supplied providers.
    pub async fn open_with(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        models: ChatModels,
    ) -> Result<Self> {
        let pool = db::connect(config).await?;
        Self::assemble(config, pool, embedder, models).await
    }

    async fn assemble(
        config: &Config,
        pool: SqlitePool,
        embedder: Arc<dyn EmbeddingProvider>,
        models: ChatModels,
    ) -> Result<Self> {
        migrate::apply(&pool).await?;

        let index = Arc::new(SqliteIndex::new(
            pool.clone(),
            config.collection.schema(),
            config.collection.index_params()?,
        ));
        let judge = models.grader.clone();
        let pipeline = Pipeline::new(
            Retriever::new(embedder.clone(), index.clone()),
            RelevanceGrader::new(models.grader),
            AnswerGenerator::new(models.answer),
        );
        let tracker = RunTracker::new(pool, &config.experiment);

        Ok(Self {
            config: config.clone(),
            index,
            embedder,
            pipeline,
            tracker,
            judge,
        })
    }

    pub fn ingestion(&self) -> Result<IngestionPipeline> {
        Ok(IngestionPipeline::new(
            self.config.chunking.splitter()?,
            self.embedder.clone(),
            self.index.clone(),
        ))
    }

    /// Answer `question` and record the run.
    ///
    /// With `strategy = None` the strategy is drawn from the experiment split.
    /// Pipeline failures are returned as [`ragops_core::RagError`] inside the
    /// `anyhow::Error` so callers can classify them.
    pub async fn answer(&self, question: &str, strategy: Option<Strategy>) -> Result<Answer> {
        let strategy = strategy.unwrap_or_else(|| self.tracker.choose_strategy());
        let ctx = self.tracker.start_run(strategy);
        info!(run_id = %ctx.run_id, %strategy, "answer request");

        let state = self.pipeline.invoke(question, &ctx).await?;
        let answer = state.generation.unwrap_or_default();

        self.tracker
            .record_run(&ctx, question, &answer, state.documents.len())
            .await?;

        Ok(Answer {
            run_id: ctx.run_id,
            strategy,
            answer,
            documents: state.documents,
        })
    }
}
