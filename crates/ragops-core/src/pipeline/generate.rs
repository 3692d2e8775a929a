//! Answer generation: render the strategy's prompt template over the
//! surviving passages and ask the chat model for the answer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::error::{RagError, Result};
use crate::llm::{ChatMessage, ChatModel, ChatRequest};
use crate::models::Passage;

use super::{PipelineState, RunContext, Stage, StateUpdate, Strategy};

/// Baseline prompt (strategy A).
pub const BASELINE_TEMPLATE: &str = "You are a helpful assistant. Use the context to answer the question.\n\
Context: {context}\n\
Question: {question}\n\
Answer:";

/// Persona prompt (strategy B).
pub const PERSONA_TEMPLATE: &str = "You are a Senior MLOps Engineer named 'Dani-Bot'. \n\
You speak in a professional, direct, and technical tone. \n\
Use the retrieved context to provide a concise, production-ready answer.\n\
If the context is missing, admit it immediately.\n\
\n\
Context: {context}\n\
Question: {question}\n\
Answer:";

/// Context line used when no passage survived grading.
pub const EMPTY_CONTEXT_TEXT: &str = "No relevant context was found for this question.";

/// Answer returned when the model replies with blank text.
pub const INSUFFICIENT_CONTEXT_ANSWER: &str =
    "I don't have enough context to answer that question.";

pub fn template(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::A => BASELINE_TEMPLATE,
        Strategy::B => PERSONA_TEMPLATE,
    }
}

/// Passages rendered and separated by blank lines.
pub fn render_context(documents: &[Passage]) -> String {
    if documents.is_empty() {
        return EMPTY_CONTEXT_TEXT.to_string();
    }
    documents
        .iter()
        .map(Passage::render)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fill `{context}` and `{question}` in a single pass, so placeholder-like
/// text inside the inserted values is left alone.
pub fn render_prompt(strategy: Strategy, question: &str, documents: &[Passage]) -> String {
    let context = render_context(documents);
    let mut out = String::new();
    let mut rest = template(strategy);
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        if let Some(after) = tail.strip_prefix("{context}") {
            out.push_str(&context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{question}") {
            out.push_str(question);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

pub struct AnswerGenerator {
    model: Arc<dyn ChatModel>,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Produce the final answer. Never returns an empty string.
    ///
    /// # Errors
    ///
    /// [`RagError::Generation`] when the model call fails.
    pub async fn generate(
        &self,
        question: &str,
        documents: &[Passage],
        strategy: Strategy,
    ) -> Result<String> {
        let prompt = render_prompt(strategy, question, documents);
        let request = ChatRequest::new(vec![ChatMessage::user(prompt)]);

        let answer = self.model.complete(request).await.map_err(|e| {
            error!(error = %format!("{:#}", e), "answer generation failed");
            RagError::Generation(format!("{:#}", e))
        })?;

        let answer = answer.trim();
        if answer.is_empty() {
            info!(%strategy, "model returned a blank answer");
            return Ok(INSUFFICIENT_CONTEXT_ANSWER.to_string());
        }
        info!(%strategy, chars = answer.chars().count(), "answer generated");
        Ok(answer.to_string())
    }
}

#[async_trait]
impl Stage for AnswerGenerator {
    fn name(&self) -> &'static str {
        "generate"
    }

    async fn run(&self, state: &PipelineState, ctx: &RunContext) -> Result<StateUpdate> {
        let answer = self
            .generate(&state.question, &state.documents, ctx.strategy)
            .await?;
        Ok(StateUpdate::generation(answer))
    }
}
