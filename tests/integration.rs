use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const GAMMA: &str = "Gamma plain text file.\n\nContains notes about deployment and infrastructure.\n\nKubernetes and Docker are mentioned here.";

fn ragops_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ragops");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(files_dir.join("nested")).unwrap();
    fs::write(
        files_dir.join("alpha.md"),
        "# Alpha Document\n\nThis is the alpha document about Rust programming.\n\nIt contains information about cargo and crates.",
    )
    .unwrap();
    fs::write(
        files_dir.join("beta.md"),
        "# Beta Document\n\nThis document discusses Python and machine learning.\n\nDeep learning frameworks like PyTorch are covered.",
    )
    .unwrap();
    fs::write(files_dir.join("nested/gamma.txt"), GAMMA).unwrap();
    fs::write(files_dir.join("logo.png"), [0u8, 159, 146, 150]).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/ragops.sqlite"

[collection]
name = "test_kb"
dims = 64

[embedding]
provider = "hash"

[llm]
provider = "disabled"
"#,
        root.display()
    );

    let config_path = config_dir.join("ragops.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_ragops(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ragops_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ragops binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn files_dir(config_path: &Path) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("files")
        .to_string_lossy()
        .to_string()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ragops(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/ragops.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_ragops(&config_path, &["init"]);
    assert!(success1, "First init failed");
    let (_, stderr, success2) = run_ragops(&config_path, &["init"]);
    assert!(success2, "Second init failed: {}", stderr);
}

#[test]
fn test_ingest_sample() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ragops(&config_path, &["ingest", "--sample"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("ingest test_kb"));
    assert!(stdout.contains("documents: 3"));
    assert!(stdout.contains("vectors written: 3"));
    assert!(stdout.contains("collection size: 3"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_ingest_accumulates() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_ragops(&config_path, &["ingest", "--sample"]);
    assert!(success, "{}", stderr);
    let (stdout, stderr, success) = run_ragops(&config_path, &["ingest", "--sample"]);
    assert!(success, "{}", stderr);
    assert!(stdout.contains("vectors written: 3"));
    assert!(stdout.contains("collection size: 6"));
}

#[test]
fn test_ingest_directory_skips_other_extensions() {
    let (_tmp, config_path) = setup_test_env();
    let files = files_dir(&config_path);

    let (stdout, stderr, success) = run_ragops(&config_path, &["ingest", &files]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("documents: 3"), "stdout: {}", stdout);
    assert!(stdout.contains("vectors written: 3"));
}

#[test]
fn test_ingest_without_input_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_ragops(&config_path, &["ingest"]);
    assert!(!success);
    assert!(stderr.contains("nothing to ingest"), "stderr: {}", stderr);
}

#[test]
fn test_ingest_missing_path_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_ragops(&config_path, &["ingest", "/nonexistent/ragops/docs"]);
    assert!(!success);
    assert!(stderr.contains("path does not exist"), "stderr: {}", stderr);
}

#[test]
fn test_search_finds_exact_document_first() {
    let (_tmp, config_path) = setup_test_env();
    let files = files_dir(&config_path);
    let (_, stderr, success) = run_ragops(&config_path, &["ingest", &files]);
    assert!(success, "{}", stderr);

    let (stdout, stderr, success) = run_ragops(&config_path, &["search", GAMMA]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    let first = stdout.lines().next().unwrap_or_default();
    assert!(first.starts_with("1. [l2: "), "first line: {}", first);
    assert!(first.ends_with("gamma.txt"), "first line: {}", first);
    assert!(stdout.contains("3. ["));
}

#[test]
fn test_search_limit() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_ragops(&config_path, &["ingest", "--sample"]);
    assert!(success, "{}", stderr);

    let (stdout, _, success) = run_ragops(&config_path, &["search", "backend stack", "--limit", "1"]);
    assert!(success);
    assert!(stdout.contains("1. ["));
    assert!(!stdout.contains("2. ["));
}

#[test]
fn test_search_empty_collection() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ragops(&config_path, &["search", "anything"]);
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_ask_with_disabled_llm_fails() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_ragops(&config_path, &["ingest", "--sample"]);
    assert!(success, "{}", stderr);

    let (_, stderr, success) =
        run_ragops(&config_path, &["ask", "What is the backend stack?", "--strategy", "A"]);
    assert!(!success);
    assert!(stderr.contains("disabled"), "stderr: {}", stderr);
}

#[test]
fn test_runs_report_on_fresh_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ragops(&config_path, &["runs"]);
    assert!(success, "runs failed: {}", stderr);
    assert!(stdout.contains("agentic_rag_v1"), "stdout: {}", stdout);
}

#[test]
fn test_invalid_strategy_rejected() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success) = run_ragops(&config_path, &["ask", "q", "--strategy", "C"]);
    assert!(!success);
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");

    let (_, stderr, success) = run_ragops(&missing, &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_fails() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad.toml");
    fs::write(
        &path,
        "[db]\npath = \"x.sqlite\"\n[experiment]\nsplit = 1.5\n",
    )
    .unwrap();

    let (_, stderr, success) = run_ragops(&path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("experiment.split"), "stderr: {}", stderr);
}
