//! HTTP JSON API over a shared [`Session`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/status` | Loaded document and model |
//! | `POST` | `/ingest` | Load a document: `{file_name, content_base64}` |
//! | `POST` | `/search` | Rank chunks without calling the model: `{query, top_k?}` |
//! | `POST` | `/answer` | Answer a question: `{query, history?}` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_ready", "message": "no document is loaded" } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `bad_request` | 400 |
//! | `unsupported_format` | 415 |
//! | `extraction_failed` | 422 |
//! | `not_ready` | 409 |
//! | `no_relevant_result` | 404 |
//! | `upstream_error` | 502 |
//! | `upstream_not_configured` | 503 |
//! | `internal` | 500 |

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::completion::ChatMessage;
use crate::config::Config;
use crate::error::{AnswerError, ExtractError, IngestError, UpstreamError};
use crate::session::{IngestReport, Session, SessionStatus};

#[derive(Clone)]
struct AppState {
    session: Arc<Session>,
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config, session: Arc<Session>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(session);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(bind = %bind_addr, "server listening");
    println!("docchat server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the API router around `session`.
pub fn router(session: Arc<Session>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .route("/ingest", post(handle_ingest))
        .route("/search", post(handle_search))
        .route("/answer", post(handle_answer))
        .layer(cors)
        .with_state(AppState { session })
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

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
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
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn internal(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        let message = err.to_string();
        match err {
            IngestError::Extract(ExtractError::UnsupportedFormat(_)) => {
                AppError::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_format", message)
            }
            IngestError::Extract(ExtractError::ExtractionFailure { .. }) => {
                AppError::new(StatusCode::UNPROCESSABLE_ENTITY, "extraction_failed", message)
            }
            IngestError::Io { .. } => internal(message),
        }
    }
}

impl From<AnswerError> for AppError {
    fn from(err: AnswerError) -> Self {
        let message = err.to_string();
        match err {
            AnswerError::NotReady => AppError::new(StatusCode::CONFLICT, "not_ready", message),
            AnswerError::NoRelevantResult => {
                AppError::new(StatusCode::NOT_FOUND, "no_relevant_result", message)
            }
            AnswerError::Upstream(UpstreamError::NotConfigured) => AppError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "upstream_not_configured",
                message,
            ),
            AnswerError::Upstream(_) => {
                AppError::new(StatusCode::BAD_GATEWAY, "upstream_error", message)
            }
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /status ============

async fn handle_status(State(state): State<AppState>) -> Json<SessionStatus> {
    Json(state.session.status())
}

// ============ POST /ingest ============

#[derive(Deserialize)]
struct IngestRequest {
    file_name: String,
    content_base64: String,
}

#[derive(Serialize)]
struct IngestResponse {
    status: String,
    report: IngestReport,
}

async fn handle_ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(req.content_base64.trim())
        .map_err(|e| bad_request(format!("content_base64 is not valid base64: {}", e)))?;

    let session = state.session.clone();
    let report = tokio::task::spawn_blocking(move || session.ingest_bytes(&req.file_name, bytes))
        .await
        .map_err(|e| internal(format!("ingest task failed: {}", e)))??;

    Ok(Json(IngestResponse {
        status: report.to_string(),
        report,
    }))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct SearchResultItem {
    index: usize,
    score: f64,
    oversized: bool,
    text: String,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchResultItem>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let mut params = state.session.settings().ranking;
    if let Some(top_k) = req.top_k {
        if top_k == 0 {
            return Err(bad_request("top_k must be >= 1"));
        }
        params.top_k = top_k;
    }

    let ranked = state.session.retrieve_with(&req.query, params)?;
    let results = ranked
        .into_iter()
        .map(|r| SearchResultItem {
            index: r.chunk.index,
            score: r.score,
            oversized: r.chunk.oversized,
            text: r.chunk.text,
        })
        .collect();
    Ok(Json(SearchResponse { results }))
}

// ============ POST /answer ============

#[derive(Deserialize)]
struct AnswerRequest {
    query: String,
    #[serde(default)]
    history: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct AnswerResponse {
    answer: String,
}

async fn handle_answer(
    State(state): State<AppState>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let answer = state.session.answer(&req.query, &req.history).await?;
    Ok(Json(AnswerResponse { answer }))
}
