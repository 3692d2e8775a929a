//! End-to-end answer pipeline scenarios with stub chat models.

use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use ragops::app::RagApp;
use ragops::config::Config;
use ragops::llm::ChatModels;
use ragops::sample::sample_documents;
use ragops::tracking::FeedbackOutcome;
use ragops_core::embedding::HashEmbedder;
use ragops_core::ingest::IngestionPipeline;
use ragops_core::llm::{ChatModel, ChatRequest};
use ragops_core::models::{Document, Passage, NO_RESULTS_TEXT};
use ragops_core::pipeline::generate::{EMPTY_CONTEXT_TEXT, INSUFFICIENT_CONTEXT_ANSWER};
use ragops_core::pipeline::{
    AnswerGenerator, Pipeline, RelevanceGrader, Retriever, RunContext, Strategy,
};
use ragops_core::store::memory::InMemoryIndex;
use ragops_core::store::{CollectionSchema, IndexParams};

const DIMS: usize = 64;

/// Replies with the prompt it was given.
struct EchoModel;

#[async_trait]
impl ChatModel for EchoModel {
    fn model_name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, request: ChatRequest) -> anyhow::Result<String> {
        Ok(request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default())
    }
}

struct BlankModel;

#[async_trait]
impl ChatModel for BlankModel {
    fn model_name(&self) -> &str {
        "blank"
    }

    async fn complete(&self, _request: ChatRequest) -> anyhow::Result<String> {
        Ok("   ".to_string())
    }
}

/// Grades a document relevant when it mentions `keyword`.
struct KeywordGrader {
    keyword: &'static str,
}

#[async_trait]
impl ChatModel for KeywordGrader {
    fn model_name(&self) -> &str {
        "keyword-grader"
    }

    async fn complete(&self, request: ChatRequest) -> anyhow::Result<String> {
        let user = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let document = user.split("User question:").next().unwrap_or_default();
        let score = if document.contains(self.keyword) { "yes" } else { "no" };
        Ok(format!(r#"{{"score": "{}"}}"#, score))
    }
}

struct FailingGrader;

#[async_trait]
impl ChatModel for FailingGrader {
    fn model_name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ChatRequest) -> anyhow::Result<String> {
        anyhow::bail!("grader unavailable")
    }
}

fn test_config(tmp: &TempDir) -> Config {
    let text = format!(
        r#"[db]
path = "{}/ragops.sqlite"

[collection]
name = "e2e"
dims = {}

[embedding]
provider = "hash"

[llm]
provider = "disabled"
"#,
        tmp.path().display(),
        DIMS
    );
    let config: Config = toml::from_str(&text).unwrap();
    ragops::config::validate(&config).unwrap();
    config
}

async fn open_app(tmp: &TempDir, answer: Arc<dyn ChatModel>, grader: Arc<dyn ChatModel>) -> RagApp {
    RagApp::open_with(
        &test_config(tmp),
        Arc::new(HashEmbedder::new(DIMS)),
        ChatModels { answer, grader },
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_persona_strategy_uses_only_graded_context() {
    let tmp = TempDir::new().unwrap();
    let app = open_app(
        &tmp,
        Arc::new(EchoModel),
        Arc::new(KeywordGrader { keyword: "Docker" }),
    )
    .await;
    let written = app.ingestion().unwrap().run(&sample_documents()).await.unwrap();
    assert_eq!(written, 3);

    let answer = app
        .answer("What is the tech stack for the backend?", Some(Strategy::B))
        .await
        .unwrap();

    assert_eq!(answer.strategy, Strategy::B);
    assert_eq!(answer.documents.len(), 1);
    assert!(answer.rendered_documents()[0].contains("Source: tech_stack_requirements.txt"));
    assert!(answer.answer.contains("Dani-Bot"));
    assert!(answer.answer.contains("FastAPI"));
    assert!(!answer.answer.contains("user_profile_2025.txt"));
    assert!(answer
        .answer
        .ends_with("Question: What is the tech stack for the backend?\nAnswer:"));
}

#[tokio::test]
async fn test_baseline_strategy_and_feedback_summary() {
    let tmp = TempDir::new().unwrap();
    let app = open_app(
        &tmp,
        Arc::new(EchoModel),
        Arc::new(KeywordGrader { keyword: "ADHD" }),
    )
    .await;
    app.ingestion().unwrap().run(&sample_documents()).await.unwrap();

    let answer = app
        .answer("What are Dani's medical conditions?", Some(Strategy::A))
        .await
        .unwrap();
    assert!(answer.answer.starts_with("You are a helpful assistant."));
    assert!(!answer.answer.contains("Dani-Bot"));
    assert!(answer.answer.contains("Bipolar"));

    assert_eq!(
        app.tracker.record_feedback(&answer.run_id, 1).await.unwrap(),
        FeedbackOutcome::Recorded
    );
    assert_eq!(
        app.tracker.record_feedback("missing-run", 0).await.unwrap(),
        FeedbackOutcome::UnknownRun
    );

    let summary = app.tracker.summary().await.unwrap();
    let a = summary.iter().find(|s| s.strategy == Strategy::A).unwrap();
    let b = summary.iter().find(|s| s.strategy == Strategy::B).unwrap();
    assert_eq!((a.runs, a.feedback, a.mean_score), (1, 1, Some(1.0)));
    assert_eq!((b.runs, b.feedback, b.mean_score), (0, 0, None));
}

#[tokio::test]
async fn test_single_profile_document_answers_medical_question() {
    let tmp = TempDir::new().unwrap();
    let app = open_app(
        &tmp,
        Arc::new(EchoModel),
        Arc::new(KeywordGrader { keyword: "Bipolar" }),
    )
    .await;
    let profile = Document::new("Dani has Type 1 Bipolar Disorder and ADHD.", "user_profile.txt");
    assert_eq!(app.ingestion().unwrap().run(&[profile]).await.unwrap(), 1);

    let answer = app
        .answer("What are Dani's medical conditions?", Some(Strategy::A))
        .await
        .unwrap();

    assert_eq!(
        answer.documents,
        vec![Passage::Hit {
            text: "Dani has Type 1 Bipolar Disorder and ADHD.".to_string(),
            source: "user_profile.txt".to_string(),
        }]
    );
    assert!(answer.rendered_documents()[0]
        .contains("Content: Dani has Type 1 Bipolar Disorder and ADHD."));
    assert!(answer.answer.contains("Bipolar"));
    assert!(answer.answer.contains("ADHD"));
}

#[tokio::test]
async fn test_empty_collection_passes_no_results_passage() {
    let tmp = TempDir::new().unwrap();
    let app = open_app(
        &tmp,
        Arc::new(EchoModel),
        Arc::new(KeywordGrader { keyword: "No relevant" }),
    )
    .await;

    let answer = app.answer("Anything there?", Some(Strategy::A)).await.unwrap();
    assert_eq!(answer.documents, vec![Passage::NoResults]);
    assert!(answer.answer.contains(NO_RESULTS_TEXT));
}

#[tokio::test]
async fn test_grader_failures_leave_empty_context() {
    let tmp = TempDir::new().unwrap();
    let app = open_app(&tmp, Arc::new(EchoModel), Arc::new(FailingGrader)).await;
    app.ingestion().unwrap().run(&sample_documents()).await.unwrap();

    let answer = app.answer("What is latency?", Some(Strategy::B)).await.unwrap();
    assert!(answer.documents.is_empty());
    assert!(answer.answer.contains(EMPTY_CONTEXT_TEXT));
}

#[tokio::test]
async fn test_blank_generation_becomes_admission() {
    let tmp = TempDir::new().unwrap();
    let app = open_app(
        &tmp,
        Arc::new(BlankModel),
        Arc::new(KeywordGrader { keyword: "RAG" }),
    )
    .await;
    app.ingestion().unwrap().run(&sample_documents()).await.unwrap();

    let answer = app.answer("What does RAG need?", Some(Strategy::A)).await.unwrap();
    assert_eq!(answer.answer, INSUFFICIENT_CONTEXT_ANSWER);
}

#[tokio::test]
async fn test_each_answer_gets_a_new_run_id() {
    let tmp = TempDir::new().unwrap();
    let app = open_app(
        &tmp,
        Arc::new(EchoModel),
        Arc::new(KeywordGrader { keyword: "Docker" }),
    )
    .await;

    let first = app.answer("q1", None).await.unwrap();
    let second = app.answer("q2", None).await.unwrap();
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.run_id.len(), 36);
}

#[tokio::test]
async fn test_in_memory_pipeline() {
    let embedder = Arc::new(HashEmbedder::new(DIMS));
    let index = Arc::new(InMemoryIndex::new(
        CollectionSchema::new("mem", DIMS),
        IndexParams::default(),
    ));
    let ingestion = IngestionPipeline::new(Default::default(), embedder.clone(), index.clone());
    assert_eq!(ingestion.run(&sample_documents()).await.unwrap(), 3);

    let pipeline = Pipeline::new(
        Retriever::new(embedder, index),
        RelevanceGrader::new(Arc::new(KeywordGrader { keyword: "MLflow" })),
        AnswerGenerator::new(Arc::new(EchoModel)),
    );
    let ctx = RunContext::new("mem-run", Strategy::A);
    let state = pipeline.invoke("Where is MLflow used?", &ctx).await.unwrap();

    assert_eq!(state.documents.len(), 1);
    assert!(state.documents[0].render().contains("MLflow"));
    assert!(state.generation.unwrap().contains("Question: Where is MLflow used?"));
}

#[tokio::test]
async fn test_eval_with_judge_reports_faithfulness() {
    let tmp = TempDir::new().unwrap();
    let app = open_app(
        &tmp,
        Arc::new(EchoModel),
        Arc::new(KeywordGrader { keyword: "Dani" }),
    )
    .await;
    app.ingestion().unwrap().run(&sample_documents()).await.unwrap();

    let items = ragops::eval::golden_dataset();
    let judge: &dyn ChatModel = &KeywordGrader { keyword: "Bipolar" };
    let report = ragops::eval::evaluate(&app, &items, Strategy::A, Some(judge))
        .await
        .unwrap();

    assert_eq!(report.rows.len(), 3);
    assert!(report.rows.iter().all(|r| r.faithfulness.is_some()));
    // The profile passage survives grading for every question.
    assert_eq!(report.mean_faithfulness, Some(1.0));

    let plain = ragops::eval::evaluate(&app, &items, Strategy::A, None)
        .await
        .unwrap();
    assert!(plain.mean_faithfulness.is_none());
    assert!(plain.rows.iter().all(|r| r.faithfulness.is_none()));
}
