//! Online answer pipeline: Retrieve → Grade → Generate.
//!
//! A [`Pipeline`] owns a fixed, linear list of [`Stage`]s. Each stage reads
//! the shared [`PipelineState`] and returns a partial [`StateUpdate`]; the
//! orchestrator merges updates between transitions and checks the state
//! invariants:
//!
//! - `generation` stays `None` until the generate stage completes.
//! - Once documents have been retrieved, later stages may only shrink the
//!   set, never grow it.
//!
//! Every invocation visits every stage in order. There is no retry edge.
//! The response strategy is chosen by the caller and threaded through a
//! [`RunContext`], so concurrent requests never share it.

pub mod generate;
pub mod grade;
pub mod retrieve;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, Instrument};

use crate::error::{RagError, Result};
use crate::models::Passage;

pub use generate::AnswerGenerator;
pub use grade::RelevanceGrader;
pub use retrieve::{Retrieval, Retriever};

/// Response-generation strategy under experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Strategy {
    /// Baseline helpful-assistant prompt.
    #[default]
    A,
    /// Persona prompt.
    B,
}

impl Strategy {
    pub const ALL: [Strategy; 2] = [Strategy::A, Strategy::B];

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::A => "A",
            Strategy::B => "B",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = RagError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Strategy::A),
            "B" | "b" => Ok(Strategy::B),
            other => Err(RagError::Config(format!(
                "unknown strategy '{}'. Must be A or B.",
                other
            ))),
        }
    }
}

/// Per-request execution context, fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: String,
    pub strategy: Strategy,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            run_id: run_id.into(),
            strategy,
        }
    }
}

/// Mutable record threaded through the stages of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineState {
    pub question: String,
    pub documents: Vec<Passage>,
    pub generation: Option<String>,
}

impl PipelineState {
    /// Entry state: question set, no documents, no generation.
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            documents: Vec::new(),
            generation: None,
        }
    }
}

/// Partial state returned by a stage. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateUpdate {
    pub documents: Option<Vec<Passage>>,
    pub generation: Option<String>,
}

impl StateUpdate {
    pub fn documents(documents: Vec<Passage>) -> Self {
        Self {
            documents: Some(documents),
            generation: None,
        }
    }

    pub fn generation(generation: String) -> Self {
        Self {
            documents: None,
            generation: Some(generation),
        }
    }
}

/// One step of the answer pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Short stage name used in logs (`"retrieve"`, `"grade"`, `"generate"`).
    fn name(&self) -> &'static str;

    async fn run(&self, state: &PipelineState, ctx: &RunContext) -> Result<StateUpdate>;
}

/// The retrieve → grade → generate state machine.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(retriever: Retriever, grader: RelevanceGrader, generator: AnswerGenerator) -> Self {
        Self {
            stages: vec![Box::new(retriever), Box::new(grader), Box::new(generator)],
        }
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run the full pipeline for `question` and return the final state.
    ///
    /// # Errors
    ///
    /// - [`RagError::Generation`] if the answer model fails.
    /// - [`RagError::Pipeline`] if a stage breaks a state invariant or the
    ///   run ends without a generation.
    pub async fn invoke(&self, question: &str, ctx: &RunContext) -> Result<PipelineState> {
        let span = info_span!("pipeline", run_id = %ctx.run_id, strategy = %ctx.strategy);
        self.run_stages(question, ctx).instrument(span).await
    }

    async fn run_stages(&self, question: &str, ctx: &RunContext) -> Result<PipelineState> {
        info!("answer pipeline started");
        let mut state = PipelineState::new(question);
        let mut retrieved = false;

        for stage in &self.stages {
            debug!(stage = stage.name(), "entering stage");
            let update = stage.run(&state, ctx).await?;
            retrieved |= merge(&mut state, update, retrieved, stage.name())?;
            debug!(
                stage = stage.name(),
                documents = state.documents.len(),
                "stage complete"
            );
        }

        if state.generation.is_none() {
            return Err(RagError::Pipeline(
                "pipeline finished without a generation".to_string(),
            ));
        }
        info!(documents = state.documents.len(), "answer pipeline finished");
        Ok(state)
    }
}

/// Apply `update` to `state`. Returns whether documents were set.
fn merge(
    state: &mut PipelineState,
    update: StateUpdate,
    retrieved: bool,
    stage: &str,
) -> Result<bool> {
    let mut set_documents = false;
    if let Some(documents) = update.documents {
        if retrieved && documents.len() > state.documents.len() {
            return Err(RagError::Pipeline(format!(
                "stage '{}' grew documents from {} to {}",
                stage,
                state.documents.len(),
                documents.len()
            )));
        }
        if retrieved && !is_subsequence(&documents, &state.documents) {
            return Err(RagError::Pipeline(format!(
                "stage '{}' replaced retrieved documents",
                stage
            )));
        }
        state.documents = documents;
        set_documents = true;
    }
    if let Some(generation) = update.generation {
        state.generation = Some(generation);
    }
    Ok(set_documents)
}

/// Whether `kept` appears in `all` in the same relative order.
fn is_subsequence(kept: &[Passage], all: &[Passage]) -> bool {
    let mut rest = all.iter();
    kept.iter().all(|p| rest.any(|q| q == p))
}
