//! Experiment run tracking and user feedback.
//!
//! Each answer request is recorded as a run tagged with the experiment name
//! and the strategy that served it. Feedback attaches a binary score to a
//! recorded run. `ragops runs` reads both back as the A/B readout.

use anyhow::{bail, Result};
use rand::Rng;
use sqlx::{Row, SqlitePool};
use tracing::info;

use ragops_core::pipeline::{RunContext, Strategy};

use crate::config::{Config, ExperimentConfig};
use crate::{db, migrate};

/// Result of recording feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackOutcome {
    Recorded,
    UnknownRun,
}

/// Per-strategy aggregate for one experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategySummary {
    pub strategy: Strategy,
    pub runs: i64,
    pub feedback: i64,
    /// Mean feedback score, `None` without feedback.
    pub mean_score: Option<f64>,
}

#[derive(Clone)]
pub struct RunTracker {
    pool: SqlitePool,
    experiment: String,
    split: f64,
}

impl RunTracker {
    pub fn new(pool: SqlitePool, experiment: &ExperimentConfig) -> Self {
        Self {
            pool,
            experiment: experiment.name.clone(),
            split: experiment.split,
        }
    }

    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    /// Draw a strategy: B with probability `split`, otherwise A.
    pub fn choose_strategy(&self) -> Strategy {
        if rand::thread_rng().gen_bool(self.split) {
            Strategy::B
        } else {
            Strategy::A
        }
    }

    /// Open a new run context with a fresh id.
    pub fn start_run(&self, strategy: Strategy) -> RunContext {
        RunContext::new(uuid::Uuid::new_v4().to_string(), strategy)
    }

    pub async fn record_run(
        &self,
        ctx: &RunContext,
        question: &str,
        answer: &str,
        document_count: usize,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO runs (run_id, experiment, strategy, question, answer, document_count, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&ctx.run_id)
        .bind(&self.experiment)
        .bind(ctx.strategy.as_str())
        .bind(question)
        .bind(answer)
        .bind(document_count as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        info!(run_id = %ctx.run_id, strategy = %ctx.strategy, "run recorded");
        Ok(())
    }

    /// Attach a score (0 or 1) to a recorded run.
    pub async fn record_feedback(&self, run_id: &str, score: i64) -> Result<FeedbackOutcome> {
        if score != 0 && score != 1 {
            bail!("score must be 0 or 1, got {}", score);
        }

        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM runs WHERE run_id = ?")
            .bind(run_id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Ok(FeedbackOutcome::UnknownRun);
        }

        sqlx::query("INSERT INTO feedback (run_id, score, created_at) VALUES (?, ?, ?)")
            .bind(run_id)
            .bind(score)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        info!(%run_id, score, "feedback recorded");
        Ok(FeedbackOutcome::Recorded)
    }

    /// Run counts and mean feedback per strategy for this experiment.
    pub async fn summary(&self) -> Result<Vec<StrategySummary>> {
        let mut out = Vec::new();
        for strategy in Strategy::ALL {
            let row = sqlx::query(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM runs WHERE experiment = ?1 AND strategy = ?2) AS runs,
                    COUNT(f.id) AS feedback,
                    AVG(f.score) AS mean_score
                FROM feedback f
                JOIN runs r ON r.run_id = f.run_id
                WHERE r.experiment = ?1 AND r.strategy = ?2
                "#,
            )
            .bind(&self.experiment)
            .bind(strategy.as_str())
            .fetch_one(&self.pool)
            .await?;

            out.push(StrategySummary {
                strategy,
                runs: row.get("runs"),
                feedback: row.get("feedback"),
                mean_score: row.get("mean_score"),
            });
        }
        Ok(out)
    }
}

/// `ragops runs`: print the per-strategy experiment readout.
pub async fn run_runs_report(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let tracker = RunTracker::new(pool, &config.experiment);
    let summary = tracker.summary().await?;

    println!("experiment {}", tracker.experiment());
    for s in summary {
        let mean = s
            .mean_score
            .map(|m| format!("{:.2}", m))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  strategy {}: runs={} feedback={} mean_score={}",
            s.strategy, s.runs, s.feedback, mean
        );
    }
    Ok(())
}
