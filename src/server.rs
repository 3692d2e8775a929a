//! HTTP server for the answer pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `{api_prefix}/chat` | Answer a question with a randomly assigned strategy |
//! | `POST` | `{api_prefix}/feedback` | Attach a 0/1 score to a previous run |
//! | `GET`  | `/health` | Health check (status, environment, version) |
//!
//! `api_prefix` defaults to `/api/v1`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Malformed or incomplete JSON bodies are `bad_request` as well.
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `generation_failed` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use ragops_core::RagError;

use crate::app::RagApp;
use crate::config::Config;
use crate::tracking::FeedbackOutcome;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    app: Arc<RagApp>,
}

/// Starts the HTTP server on `[server].bind`.
///
/// Runs until the process is terminated, or returns an error if binding
/// fails.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let app = Arc::new(RagApp::open(config).await?);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("{} listening on http://{}", config.app.project_name, listener.local_addr()?);
    serve(app, listener).await
}

/// Serve `app` on an already bound listener.
pub async fn serve(app: Arc<RagApp>, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "server started");
    axum::serve(listener, router(app)).await?;
    Ok(())
}

/// Build the router with all routes and the CORS layer.
pub fn router(app: Arc<RagApp>) -> Router {
    let prefix = app.config.server.api_prefix.trim_end_matches('/').to_string();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(&format!("{}/chat", prefix), post(handle_chat))
        .route(&format!("{}/feedback", prefix), post(handle_feedback))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { app })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn bad_body(rejection: JsonRejection) -> AppError {
    bad_request(rejection.body_text())
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

/// Map a pipeline failure to an HTTP error. Answer generation failures are
/// upstream model errors (502); everything else is internal.
fn classify_error(err: anyhow::Error) -> AppError {
    error!(error = %format!("{:#}", err), "request failed");
    match err.downcast_ref::<RagError>() {
        Some(RagError::Generation(message)) => AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "generation_failed",
            message: message.clone(),
        },
        _ => internal(format!("{:#}", err)),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    environment: String,
    version: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        environment: state.app.config.app.environment.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    question: String,
    /// Accepted for client compatibility; conversations are stateless.
    #[serde(default)]
    #[allow(dead_code)]
    thread_id: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    answer: String,
    documents: Vec<String>,
    run_id: String,
    strategy: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(req) = payload.map_err(bad_body)?;
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let answer = state
        .app
        .answer(&req.question, None)
        .await
        .map_err(classify_error)?;

    Ok(Json(ChatResponse {
        documents: answer.rendered_documents(),
        answer: answer.answer,
        run_id: answer.run_id,
        strategy: answer.strategy.to_string(),
    }))
}

// ============ POST /feedback ============

#[derive(Deserialize)]
struct FeedbackRequest {
    run_id: String,
    score: i64,
}

async fn handle_feedback(
    State(state): State<AppState>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Json(req) = payload.map_err(bad_body)?;
    if req.score != 0 && req.score != 1 {
        return Err(bad_request(format!(
            "score must be 0 or 1, got {}",
            req.score
        )));
    }

    match state
        .app
        .tracker
        .record_feedback(&req.run_id, req.score)
        .await
        .map_err(|e| internal(format!("{:#}", e)))?
    {
        FeedbackOutcome::Recorded => Ok(Json(serde_json::json!({ "status": "recorded" }))),
        FeedbackOutcome::UnknownRun => Err(not_found(format!("no run with id: {}", req.run_id))),
    }
}
