//! HTTP server tests against a live listener on an ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

use ragops::app::RagApp;
use ragops::config::Config;
use ragops::llm::ChatModels;
use ragops::sample::sample_documents;
use ragops::server;
use ragops_core::embedding::HashEmbedder;
use ragops_core::llm::{ChatModel, ChatRequest};

struct FixedModel(&'static str);

#[async_trait]
impl ChatModel for FixedModel {
    fn model_name(&self) -> &str {
        "fixed"
    }

    async fn complete(&self, _request: ChatRequest) -> anyhow::Result<String> {
        Ok(self.0.to_string())
    }
}

struct DownModel;

#[async_trait]
impl ChatModel for DownModel {
    fn model_name(&self) -> &str {
        "down"
    }

    async fn complete(&self, _request: ChatRequest) -> anyhow::Result<String> {
        anyhow::bail!("upstream returned 503")
    }
}

async fn start(tmp: &TempDir, answer: Arc<dyn ChatModel>) -> SocketAddr {
    let text = format!(
        "[app]\nenvironment = \"test\"\n\n[db]\npath = \"{}/server.sqlite\"\n\n[collection]\ndims = 32\n\n[embedding]\nprovider = \"hash\"\n",
        tmp.path().display()
    );
    let config: Config = toml::from_str(&text).unwrap();
    let app = RagApp::open_with(
        &config,
        Arc::new(HashEmbedder::new(32)),
        ChatModels {
            answer,
            grader: Arc::new(FixedModel(r#"{"score": "yes"}"#)),
        },
    )
    .await
    .unwrap();
    app.ingestion().unwrap().run(&sample_documents()).await.unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve(Arc::new(app), listener));
    addr
}

fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{}{}", addr, path)
}

#[tokio::test]
async fn test_health() {
    let tmp = TempDir::new().unwrap();
    let addr = start(&tmp, Arc::new(FixedModel("ok"))).await;

    let resp = reqwest::get(url(addr, "/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["environment"], "test");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_chat_then_feedback() {
    let tmp = TempDir::new().unwrap();
    let addr = start(&tmp, Arc::new(FixedModel("  Python and FastAPI.  "))).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(url(addr, "/api/v1/chat"))
        .json(&json!({ "question": "What is the backend stack?", "thread_id": "t-1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["answer"], "Python and FastAPI.");
    assert_eq!(body["documents"].as_array().unwrap().len(), 3);
    let strategy = body["strategy"].as_str().unwrap();
    assert!(strategy == "A" || strategy == "B");
    let run_id = body["run_id"].as_str().unwrap().to_string();

    let resp = client
        .post(url(addr, "/api/v1/feedback"))
        .json(&json!({ "run_id": run_id, "score": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "recorded");
}

#[tokio::test]
async fn test_chat_rejects_blank_question() {
    let tmp = TempDir::new().unwrap();
    let addr = start(&tmp, Arc::new(FixedModel("unused"))).await;

    let resp = reqwest::Client::new()
        .post(url(addr, "/api/v1/chat"))
        .json(&json!({ "question": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_generation_failure_is_bad_gateway() {
    let tmp = TempDir::new().unwrap();
    let addr = start(&tmp, Arc::new(DownModel)).await;

    let resp = reqwest::Client::new()
        .post(url(addr, "/api/v1/chat"))
        .json(&json!({ "question": "What is latency?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "generation_failed");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("upstream returned 503"));
}

#[tokio::test]
async fn test_feedback_errors() {
    let tmp = TempDir::new().unwrap();
    let addr = start(&tmp, Arc::new(FixedModel("ok"))).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(url(addr, "/api/v1/feedback"))
        .json(&json!({ "run_id": "no-such-run", "score": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");

    let resp = client
        .post(url(addr, "/api/v1/feedback"))
        .json(&json!({ "run_id": "no-such-run", "score": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let tmp = TempDir::new().unwrap();
    let addr = start(&tmp, Arc::new(FixedModel("ok"))).await;

    let resp = reqwest::Client::new()
        .get(url(addr, "/health"))
        .header("Origin", "http://localhost:3000")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn test_malformed_bodies_use_error_contract() {
    let tmp = TempDir::new().unwrap();
    let addr = start(&tmp, Arc::new(FixedModel("ok"))).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(url(addr, "/api/v1/chat"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    let resp = client
        .post(url(addr, "/api/v1/feedback"))
        .json(&json!({ "run_id": "r-1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(!body["error"]["message"].as_str().unwrap().is_empty());
}
