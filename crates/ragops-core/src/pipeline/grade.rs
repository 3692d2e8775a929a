//! Relevance filter: grade each retrieved passage yes/no against the
//! question and keep only the relevant ones.
//!
//! Passages are graded concurrently and joined in input order, so the
//! output is always an order-preserving subsequence of the input.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::{RagError, Result};
use crate::llm::{ChatMessage, ChatModel, ChatRequest};
use crate::models::Passage;

use super::{PipelineState, RunContext, Stage, StateUpdate};

/// System instruction for the relevance grader.
pub const GRADER_SYSTEM_PROMPT: &str = "You are a grader assessing relevance of a retrieved document to a user question. \n \
If the document contains keyword(s) or semantic meaning related to the question, grade it as relevant. \n \
Give a binary score 'yes' or 'no' score to indicate whether the document is relevant to the question.";

/// Result of grading one passage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GradeOutcome {
    Relevant,
    Irrelevant,
    /// The model call failed or its reply could not be parsed.
    Failed(String),
}

#[derive(Debug, Deserialize)]
struct Grade {
    score: String,
}

/// Parse the grader's structured reply into relevant (`true`) or not.
///
/// Accepts `{"score": "yes"}` / `{"score": "no"}`, case-insensitive, and
/// tolerates a surrounding markdown code fence.
pub fn parse_grade(raw: &str) -> Result<bool> {
    let body = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let grade: Grade = serde_json::from_str(body).map_err(|_| RagError::MalformedGrade {
        raw: raw.to_string(),
    })?;
    match grade.score.trim().to_ascii_lowercase().as_str() {
        "yes" => Ok(true),
        "no" => Ok(false),
        _ => Err(RagError::MalformedGrade {
            raw: raw.to_string(),
        }),
    }
}

/// Build the grading request for one rendered passage.
pub fn grade_request(question: &str, document: &str) -> ChatRequest {
    ChatRequest::new(vec![
        ChatMessage::system(GRADER_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Retrieved document: \n\n {} \n\n User question: {}",
            document, question
        )),
    ])
    .with_temperature(0.0)
    .with_json_schema(
        "grade_documents",
        json!({
            "type": "object",
            "properties": {
                "score": {
                    "type": "string",
                    "enum": ["yes", "no"],
                    "description": "Documents are relevant to the question, 'yes' or 'no'"
                }
            },
            "required": ["score"],
            "additionalProperties": false
        }),
    )
}

pub struct RelevanceGrader {
    model: Arc<dyn ChatModel>,
}

impl RelevanceGrader {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Grade a single passage.
    pub async fn grade_one(&self, question: &str, passage: &Passage) -> GradeOutcome {
        let request = grade_request(question, &passage.render());
        let raw = match self.model.complete(request).await {
            Ok(raw) => raw,
            Err(e) => return GradeOutcome::Failed(RagError::Model(format!("{:#}", e)).to_string()),
        };
        match parse_grade(&raw) {
            Ok(true) => GradeOutcome::Relevant,
            Ok(false) => GradeOutcome::Irrelevant,
            Err(e) => GradeOutcome::Failed(e.to_string()),
        }
    }

    /// Keep the passages graded relevant, in input order.
    pub async fn grade(&self, question: &str, documents: &[Passage]) -> Vec<Passage> {
        let outcomes = join_all(documents.iter().map(|p| self.grade_one(question, p))).await;

        let mut kept = Vec::new();
        for (position, (passage, outcome)) in documents.iter().zip(outcomes).enumerate() {
            match outcome {
                GradeOutcome::Relevant => {
                    info!(position, "graded relevant");
                    kept.push(passage.clone());
                }
                GradeOutcome::Irrelevant => info!(position, "graded not relevant"),
                GradeOutcome::Failed(reason) => {
                    warn!(position, %reason, "grading failed, dropping passage")
                }
            }
        }
        kept
    }
}

#[async_trait]
impl Stage for RelevanceGrader {
    fn name(&self) -> &'static str {
        "grade"
    }

    async fn run(&self, state: &PipelineState, _ctx: &RunContext) -> Result<StateUpdate> {
        let kept = self.grade(&state.question, &state.documents).await;
        Ok(StateUpdate::documents(kept))
    }
}
