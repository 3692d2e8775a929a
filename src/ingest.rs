//! `ragops ingest`: load documents from files, directories, or the built-in
//! sample set and run them through the ingestion pipeline.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use ragops_core::ingest::IngestionPipeline;
use ragops_core::models::Document;
use ragops_core::store::VectorIndex;

use crate::app::open_index;
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::sample::sample_documents;

const INCLUDE_GLOBS: [&str; 2] = ["**/*.md", "**/*.txt"];
const EXCLUDE_GLOBS: [&str; 3] = ["**/.git/**", "**/target/**", "**/node_modules/**"];

pub async fn run_ingest(config: &Config, paths: &[PathBuf], sample: bool) -> Result<()> {
    let mut documents = Vec::new();
    if sample {
        documents.extend(sample_documents());
    }
    documents.extend(load_documents(paths)?);
    if documents.is_empty() {
        bail!("nothing to ingest: pass file or directory paths, or --sample");
    }

    let embedder = create_embedder(config)?;
    let index = open_index(config).await?;
    let pipeline = IngestionPipeline::new(config.chunking.splitter()?, embedder, index.clone());

    let written = pipeline.run(&documents).await?;
    let total = index.count().await?;

    println!("ingest {}", config.collection.name);
    println!("  documents: {}", documents.len());
    println!("  vectors written: {}", written);
    println!("  collection size: {}", total);
    println!("ok");
    Ok(())
}

/// Read every path. Files are taken as-is; directories are walked for
/// `*.md` and `*.txt` files. The source of each document is its file name.
pub fn load_documents(paths: &[PathBuf]) -> Result<Vec<Document>> {
    let include_set = build_globset(&INCLUDE_GLOBS)?;
    let exclude_set = build_globset(&EXCLUDE_GLOBS)?;

    let mut documents = Vec::new();
    for path in paths {
        if path.is_file() {
            documents.push(read_document(path)?);
        } else if path.is_dir() {
            let mut found = Vec::new();
            for entry in WalkDir::new(path) {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let file = entry.path();
                let relative = file.strip_prefix(path).unwrap_or(file);
                let rel_str = relative.to_string_lossy().to_string();

                if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
                    continue;
                }
                found.push(file.to_path_buf());
            }
            // Sort for deterministic ordering
            found.sort();
            for file in found {
                documents.push(read_document(&file)?);
            }
        } else {
            bail!("path does not exist: {}", path.display());
        }
    }
    Ok(documents)
}

fn read_document(path: &Path) -> Result<Document> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Document::new(text, source))
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
