//! Chat model clients.
//!
//! [`OpenAIChatModel`] talks to any OpenAI-compatible `POST /chat/completions`
//! endpoint and shares the embedding providers' retry policy.
//! [`DisabledChatModel`] fails every call; it lets `search` and `ingest` run
//! without credentials, and makes `ask`/`serve` report a clear error.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use ragops_core::llm::{ChatModel, ChatRequest};

use crate::config::LlmConfig;
use crate::embedding::post_json_with_retry;

pub struct OpenAIChatModel {
    model: String,
    url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIChatModel {
    /// # Errors
    ///
    /// Returns an error if `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &LlmConfig, model: &str) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: model.to_string(),
            url: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }
}

/// Build the chat completions request body.
fn request_body(model: &str, request: &ChatRequest) -> Value {
    let mut body = json!({
        "model": model,
        "messages": request.messages,
    });
    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(format) = &request.response_format {
        body["response_format"] = json!({
            "type": "json_schema",
            "json_schema": {
                "name": format.name,
                "schema": format.schema,
                "strict": true,
            }
        });
    }
    body
}

fn parse_completion(json: &Value) -> Result<String> {
    let content = json
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing choices[0].message.content"))?;
    Ok(content.to_string())
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let body = request_body(&self.model, &request);
        let json = post_json_with_retry(
            &self.client,
            &self.url,
            Some(&self.api_key),
            &body,
            self.max_retries,
            "OpenAI chat",
        )
        .await?;
        parse_completion(&json)
    }
}

/// A chat model that always fails. Used when `llm.provider = "disabled"`.
pub struct DisabledChatModel;

#[async_trait]
impl ChatModel for DisabledChatModel {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _request: ChatRequest) -> Result<String> {
        bail!("Language model provider is disabled")
    }
}

/// The answer model and the grader model named by `[llm]`.
pub struct ChatModels {
    pub answer: Arc<dyn ChatModel>,
    pub grader: Arc<dyn ChatModel>,
}

/// Create the chat models for the answer generator and the relevance grader.
pub fn create_chat_models(config: &LlmConfig) -> Result<ChatModels> {
    match config.provider.as_str() {
        "disabled" => {
            let model: Arc<dyn ChatModel> = Arc::new(DisabledChatModel);
            Ok(ChatModels {
                answer: model.clone(),
                grader: model,
            })
        }
        "openai" => {
            let answer: Arc<dyn ChatModel> = Arc::new(OpenAIChatModel::new(config, &config.model)?);
            let grader: Arc<dyn ChatModel> = match &config.grader_model {
                Some(name) if name != &config.model => {
                    Arc::new(OpenAIChatModel::new(config, name)?)
                }
                _ => answer.clone(),
            };
            Ok(ChatModels { answer, grader })
        }
        other => bail!("Unknown llm provider: {}", other),
    }
}
