//! Offline evaluation harness (`ragops eval`).
//!
//! Runs the answer pipeline over a golden dataset of question /
//! ground-truth pairs and scores each answer with two lexical metrics:
//!
//! - `answer_recall`: fraction of the ground truth's content words that
//!   appear in the generated answer.
//! - `context_recall`: fraction of the ground truth's content words that
//!   appear in the passages that survived grading.
//!
//! With `--judge`, the grader model also scores `faithfulness`: whether the
//! answer is supported by the surviving passages (1.0 yes, 0.0 no).
//!
//! The command fails (non-zero exit) when any mean falls below the
//! threshold, so it can gate a CI pipeline. Eval runs are not recorded in
//! the experiment tables.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::path::Path;

use ragops_core::embedding::tokenize;
use ragops_core::llm::{ChatMessage, ChatModel, ChatRequest};
use ragops_core::pipeline::grade::parse_grade;
use ragops_core::pipeline::{RunContext, Strategy};

use crate::app::RagApp;
use crate::config::Config;

pub const DEFAULT_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GoldenItem {
    pub question: String,
    pub ground_truth: String,
}

pub fn golden_dataset() -> Vec<GoldenItem> {
    [
        (
            "What are Dani's medical conditions?",
            "Dani has Type 1 Bipolar Disorder and ADHD.",
        ),
        (
            "What are the priorities for MLOps?",
            "The priorities are model drift detection, automated dashboards, data pipelines, and distributed systems.",
        ),
        (
            "What is the tech stack for the backend?",
            "The backend uses Python, FastAPI, Docker/Kubernetes, and MLflow.",
        ),
    ]
    .into_iter()
    .map(|(question, ground_truth)| GoldenItem {
        question: question.to_string(),
        ground_truth: ground_truth.to_string(),
    })
    .collect()
}

pub fn load_dataset(path: &Path) -> Result<Vec<GoldenItem>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset: {}", path.display()))?;
    let items: Vec<GoldenItem> =
        serde_json::from_str(&content).with_context(|| "Failed to parse dataset JSON")?;
    if items.is_empty() {
        anyhow::bail!("dataset {} is empty", path.display());
    }
    Ok(items)
}

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "in", "is",
    "it", "of", "on", "or", "the", "to", "uses", "was", "were", "with",
];

fn content_words(text: &str) -> HashSet<String> {
    tokenize(text)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// Fraction of `reference`'s content words found in `candidate`.
/// A reference without content words scores 1.0.
pub fn word_recall(reference: &str, candidate: &str) -> f64 {
    let wanted = content_words(reference);
    if wanted.is_empty() {
        return 1.0;
    }
    let have = content_words(candidate);
    wanted.iter().filter(|w| have.contains(*w)).count() as f64 / wanted.len() as f64
}

const FAITHFULNESS_PROMPT: &str = "You are grading whether an answer is faithful to the retrieved context. \n \
Answer 'yes' if every claim in the answer is supported by the context, or the answer admits the context is missing. \n \
Answer 'no' if the answer states anything the context does not support.";

/// Build the faithfulness judgement request for one answer.
pub fn faithfulness_request(context: &str, answer: &str) -> ChatRequest {
    ChatRequest::new(vec![
        ChatMessage::system(FAITHFULNESS_PROMPT),
        ChatMessage::user(format!(
            "Retrieved context: \n\n {} \n\n Answer: {}",
            context, answer
        )),
    ])
    .with_temperature(0.0)
    .with_json_schema(
        "grade_faithfulness",
        json!({
            "type": "object",
            "properties": {
                "score": { "type": "string", "enum": ["yes", "no"] }
            },
            "required": ["score"],
            "additionalProperties": false
        }),
    )
}

/// Ask `judge` whether `answer` is supported by `context`.
pub async fn judge_faithfulness(judge: &dyn ChatModel, context: &str, answer: &str) -> Result<f64> {
    let raw = judge
        .complete(faithfulness_request(context, answer))
        .await
        .context("faithfulness judge failed")?;
    Ok(if parse_grade(&raw)? { 1.0 } else { 0.0 })
}

#[derive(Debug, Clone)]
pub struct EvalRow {
    pub question: String,
    pub answer: String,
    pub answer_recall: f64,
    pub context_recall: f64,
    /// Set only when a judge model was used.
    pub faithfulness: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct EvalReport {
    pub rows: Vec<EvalRow>,
    pub mean_answer_recall: f64,
    pub mean_context_recall: f64,
    pub mean_faithfulness: Option<f64>,
}

impl EvalReport {
    pub fn passed(&self, threshold: f64) -> bool {
        self.mean_answer_recall >= threshold
            && self.mean_context_recall >= threshold
            && self.mean_faithfulness.map_or(true, |m| m >= threshold)
    }
}

/// Run every item through the pipeline with the given strategy. When
/// `judge` is given, each answer is also scored for faithfulness.
pub async fn evaluate(
    app: &RagApp,
    items: &[GoldenItem],
    strategy: Strategy,
    judge: Option<&dyn ChatModel>,
) -> Result<EvalReport> {
    let mut rows = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let ctx = RunContext::new(format!("eval-{}", i), strategy);
        let state = app.pipeline.invoke(&item.question, &ctx).await?;
        let answer = state.generation.unwrap_or_default();
        let context = state
            .documents
            .iter()
            .map(|d| d.render())
            .collect::<Vec<_>>()
            .join("\n");

        let faithfulness = match judge {
            Some(judge) => Some(judge_faithfulness(judge, &context, &answer).await?),
            None => None,
        };

        rows.push(EvalRow {
            question: item.question.clone(),
            answer_recall: word_recall(&item.ground_truth, &answer),
            context_recall: word_recall(&item.ground_truth, &context),
            faithfulness,
            answer,
        });
    }

    let n = rows.len().max(1) as f64;
    let mean_answer_recall = rows.iter().map(|r| r.answer_recall).sum::<f64>() / n;
    let mean_context_recall = rows.iter().map(|r| r.context_recall).sum::<f64>() / n;
    let mean_faithfulness = judge.map(|_| rows.iter().filter_map(|r| r.faithfulness).sum::<f64>() / n);
    Ok(EvalReport {
        rows,
        mean_answer_recall,
        mean_context_recall,
        mean_faithfulness,
    })
}

/// `ragops eval`. Returns whether the quality gate passed.
pub async fn run_eval(
    config: &Config,
    threshold: f64,
    dataset: Option<&Path>,
    strategy: Strategy,
    use_judge: bool,
) -> Result<bool> {
    let items = match dataset {
        Some(path) => load_dataset(path)?,
        None => golden_dataset(),
    };
    let app = RagApp::open(config).await?;

    println!("eval {} cases (strategy {})", items.len(), strategy);
    let judge = use_judge.then(|| app.judge.as_ref());
    let report = evaluate(&app, &items, strategy, judge).await?;

    for row in &report.rows {
        let faithfulness = row
            .faithfulness
            .map(|f| format!(" faithfulness={:.2}", f))
            .unwrap_or_default();
        println!(
            "  answer_recall={:.2} context_recall={:.2}{}  {}",
            row.answer_recall, row.context_recall, faithfulness, row.question
        );
    }
    println!();
    println!(
        "  mean answer_recall: {:.2} | mean context_recall: {:.2}",
        report.mean_answer_recall, report.mean_context_recall
    );
    if let Some(mean) = report.mean_faithfulness {
        println!("  mean faithfulness: {:.2}", mean);
    }

    let passed = report.passed(threshold);
    if passed {
        println!("PASSED: quality metrics met threshold {}", threshold);
    } else {
        println!("FAILED: quality metrics below threshold {}", threshold);
    }
    Ok(passed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_recall() {
        let truth = "Dani has Type 1 Bipolar Disorder and ADHD.";
        assert_eq!(word_recall(truth, truth), 1.0);
        assert_eq!(word_recall(truth, "nothing relevant"), 0.0);
        // content words: dani, type, 1, bipolar, disorder, adhd
        let partial = word_recall(truth, "Dani has ADHD");
        assert!((partial - 2.0 / 6.0).abs() < 1e-9);
        assert_eq!(word_recall("the and of", "anything"), 1.0);
    }

    #[test]
    fn test_golden_dataset_shape() {
        let items = golden_dataset();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| !i.ground_truth.is_empty()));
    }

    #[test]
    fn test_load_dataset() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("golden.json");
        std::fs::write(&path, r#"[{"question":"q","ground_truth":"t"}]"#).unwrap();
        assert_eq!(load_dataset(&path).unwrap().len(), 1);
        std::fs::write(&path, "[]").unwrap();
        assert!(load_dataset(&path).is_err());
    }

    #[test]
    fn test_report_gate() {
        let mut report = EvalReport {
            rows: Vec::new(),
            mean_answer_recall: 0.7,
            mean_context_recall: 0.59,
            mean_faithfulness: None,
        };
        assert!(!report.passed(DEFAULT_THRESHOLD));
        assert!(report.passed(0.5));

        report.mean_faithfulness = Some(0.4);
        assert!(!report.passed(0.5));
    }

    struct FixedJudge(&'static str);

    #[async_trait::async_trait]
    impl ChatModel for FixedJudge {
        fn model_name(&self) -> &str {
            "judge"
        }

        async fn complete(&self, request: ChatRequest) -> anyhow::Result<String> {
            assert_eq!(request.temperature, Some(0.0));
            assert!(request.messages[1].content.contains("Answer: Python"));
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_judge_faithfulness() {
        let context = "Content: The backend uses Python.\nSource: stack.txt";
        let yes = judge_faithfulness(&FixedJudge(r#"{"score":"yes"}"#), context, "Python")
            .await
            .unwrap();
        assert_eq!(yes, 1.0);
        let no = judge_faithfulness(&FixedJudge(r#"{"score":"no"}"#), context, "Python")
            .await
            .unwrap();
        assert_eq!(no, 0.0);
        assert!(judge_faithfulness(&FixedJudge("unsure"), context, "Python")
            .await
            .is_err());
    }
}
