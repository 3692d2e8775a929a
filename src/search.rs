//! `ragops search` and `ragops ask`.
//!
//! `search` shows the raw ranked hits for a query without grading or
//! generation. `ask` runs the full tracked answer pipeline once.

use anyhow::{Context, Result};

use ragops_core::pipeline::retrieve::TOP_K;
use ragops_core::pipeline::Strategy;
use ragops_core::store::VectorIndex;

use crate::app::{open_index, RagApp};
use crate::config::Config;
use crate::embedding::create_embedder;

pub async fn run_search(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        anyhow::bail!("query must not be empty");
    }
    let embedder = create_embedder(config)?;
    let index = open_index(config).await?;

    let vector = embedder
        .embed_query(query)
        .await
        .context("Failed to embed query")?;
    let hits = index.search(&vector, limit.unwrap_or(TOP_K)).await?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{}: {:.4}] {}",
            i + 1,
            index.metric(),
            hit.score,
            hit.source
        );
        println!("    id: {}", hit.id);
        println!("    {}", snippet(&hit.text, 160));
        println!();
    }
    Ok(())
}

pub async fn run_ask(config: &Config, question: &str, strategy: Option<Strategy>) -> Result<()> {
    if question.trim().is_empty() {
        anyhow::bail!("question must not be empty");
    }
    let app = RagApp::open(config).await?;
    let answer = app.answer(question, strategy).await?;

    println!("{}", answer.answer);
    println!();
    println!("  run_id: {}", answer.run_id);
    println!("  strategy: {}", answer.strategy);
    println!("  documents: {}", answer.documents.len());
    for doc in answer.rendered_documents() {
        for line in doc.lines() {
            println!("    {}", line);
        }
    }
    Ok(())
}

fn snippet(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}…", cut)
}
