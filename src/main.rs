//! # RAGOps CLI (`ragops`)
//!
//! The `ragops` binary is the primary interface for RAGOps. It provides
//! commands for database initialization, ingestion, search, answering,
//! the HTTP server, the A/B readout, and offline evaluation.
//!
//! ## Usage
//!
//! ```bash
//! ragops --config ./config/ragops.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragops init` | Create the SQLite database and run schema migrations |
//! | `ragops ingest [paths] [--sample]` | Chunk, embed, and store documents |
//! | `ragops search "<query>"` | Show raw nearest chunks |
//! | `ragops ask "<question>"` | Run the answer pipeline once and record the run |
//! | `ragops serve` | Start the HTTP server |
//! | `ragops runs` | Per-strategy run and feedback summary |
//! | `ragops eval` | Score the pipeline against a golden dataset |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ragops::{config, eval, ingest, logging, migrate, search, server, tracking};
use ragops_core::pipeline::Strategy;

/// RAGOps CLI: retrieval-augmented answers with graded context and an A/B
/// prompt experiment.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ragops.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ragops",
    about = "Retrieval-augmented question answering with graded context and A/B tracking",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragops.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. Running it
    /// more than once is safe.
    Init,

    /// Chunk, embed, and store documents.
    ///
    /// Files are ingested as-is; directories are walked for `*.md` and
    /// `*.txt` files.
    Ingest {
        /// Files or directories to ingest.
        paths: Vec<PathBuf>,

        /// Also ingest the built-in sample documents.
        #[arg(long)]
        sample: bool,
    },

    /// Show the nearest chunks for a query without grading or generation.
    Search {
        query: String,

        /// Maximum number of results (defaults to the pipeline's top-k).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer a question through the full pipeline and record the run.
    Ask {
        question: String,

        /// Force a prompt strategy (`A` or `B`) instead of the random split.
        #[arg(long)]
        strategy: Option<Strategy>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Print per-strategy run counts and mean feedback.
    Runs,

    /// Score the pipeline against a golden dataset.
    ///
    /// Exits with status 1 when a mean metric is below the threshold.
    Eval {
        /// Minimum mean score for both metrics.
        #[arg(long, default_value_t = eval::DEFAULT_THRESHOLD)]
        threshold: f64,

        /// JSON file with `[{"question", "ground_truth"}]` items.
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Prompt strategy used for every item.
        #[arg(long, default_value = "A")]
        strategy: Strategy,

        /// Also score faithfulness with the grader model.
        #[arg(long)]
        judge: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { paths, sample } => {
            ingest::run_ingest(&cfg, &paths, sample).await?;
        }
        Commands::Search { query, limit } => {
            search::run_search(&cfg, &query, limit).await?;
        }
        Commands::Ask { question, strategy } => {
            search::run_ask(&cfg, &question, strategy).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Runs => {
            tracking::run_runs_report(&cfg).await?;
        }
        Commands::Eval {
            threshold,
            dataset,
            strategy,
            judge,
        } => {
            if !eval::run_eval(&cfg, threshold, dataset.as_deref(), strategy, judge).await? {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
