//! HTTP server for the news archive.
//!
//! Exposes the archive tools, single-document conversion and streamed
//! question answering as a small JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/articles` | Article file names |
//! | `GET`  | `/articles/{name}` | One article's full text |
//! | `GET`  | `/search?q=` | Keyword search with snippets |
//! | `GET`  | `/latest?limit=` | Most recently modified articles |
//! | `POST` | `/convert` | Clean one HTML document |
//! | `POST` | `/ask` | Answer a question, streamed as `text/plain` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! `/ask` streams tokens as they arrive. A client that disconnects drops the
//! response body, which cancels the upstream completion request.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::answer::AnswerStreamer;
use crate::archive::{self, ArchiveError, ArticleSummary, SearchHit};
use crate::completion::OllamaClient;
use crate::config::Config;
use crate::convert::{convert_html, ConvertError};
use crate::extract::{create_extractor, Extractor};
use crate::models::{ExtractOptions, OutputFormat};

const DEFAULT_LATEST: usize = 5;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    corpus_dir: PathBuf,
    answers: AnswerStreamer,
    extractor: Arc<dyn Extractor>,
    extract: ExtractOptions,
}

impl AppState {
    pub fn new(
        corpus_dir: PathBuf,
        answers: AnswerStreamer,
        extractor: Arc<dyn Extractor>,
        extract: ExtractOptions,
    ) -> Self {
        Self {
            corpus_dir,
            answers,
            extractor,
            extract,
        }
    }

    /// State wired from configuration: the configured extractor and an
    /// Ollama client for answers.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = Arc::new(OllamaClient::new(&config.completion)?);
        let answers = AnswerStreamer::new(
            config.corpus.dir.clone(),
            client,
            config.completion.max_context_chars,
        );
        Ok(Self::new(
            config.corpus.dir.clone(),
            answers,
            Arc::from(create_extractor(&config.extractor)?),
            config.cleaner.extract_options()?,
        ))
    }
}

/// Build the router. Separate from [`run_server`] so tests can bind their
/// own listener.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/articles", get(handle_list))
        .route("/articles/{name}", get(handle_get))
        .route("/search", get(handle_search))
        .route("/latest", get(handle_latest))
        .route("/convert", post(handle_convert))
        .route("/ask", post(handle_ask))
        .layer(cors)
        .with_state(state)
}

/// Serve on `[server].bind` until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "news server listening");
    println!("News server listening on http://{}", config.server.bind);

    axum::serve(listener, app).await?;
    Ok(())
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

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<ArchiveError> for AppError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::NotFound(_) => not_found(err.to_string()),
            ArchiveError::AccessDenied(_) => bad_request(err.to_string()),
            ArchiveError::Other(e) => internal(format!("{:#}", e)),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        internal(format!("{:#}", err))
    }
}

/// Run archive file I/O on the blocking pool.
async fn blocking<T, E, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| internal(format!("archive task failed: {}", e)))?
        .map_err(Into::into)
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

// ============ Archive ============

#[derive(Serialize)]
struct ListResponse {
    articles: Vec<String>,
}

async fn handle_list(State(state): State<AppState>) -> Result<Json<ListResponse>, AppError> {
    let articles = blocking(move || archive::list_articles(&state.corpus_dir)).await?;
    Ok(Json(ListResponse { articles }))
}

#[derive(Serialize)]
struct ArticleResponse {
    name: String,
    content: String,
}

async fn handle_get(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ArticleResponse>, AppError> {
    let lookup = name.clone();
    let content = blocking(move || archive::get_article(&state.corpus_dir, &lookup)).await?;
    Ok(Json(ArticleResponse { name, content }))
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    results: Vec<SearchHit>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    if params.q.trim().is_empty() {
        return Err(bad_request("q must not be empty"));
    }
    let query = params.q.clone();
    let results = blocking(move || archive::search_articles(&state.corpus_dir, &query)).await?;
    Ok(Json(SearchResponse {
        query: params.q,
        results,
    }))
}

#[derive(Deserialize)]
struct LatestParams {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct LatestResponse {
    articles: Vec<ArticleSummary>,
}

async fn handle_latest(
    State(state): State<AppState>,
    Query(params): Query<LatestParams>,
) -> Result<Json<LatestResponse>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LATEST);
    let articles = blocking(move || archive::latest_articles(&state.corpus_dir, limit)).await?;
    Ok(Json(LatestResponse { articles }))
}

// ============ POST /convert ============

#[derive(Deserialize)]
struct ConvertRequest {
    html: String,
    #[serde(default)]
    output_format: Option<String>,
    #[serde(default)]
    include_tables: Option<bool>,
    #[serde(default)]
    include_comments: Option<bool>,
}

#[derive(Serialize)]
struct ConvertResponse {
    output_format: OutputFormat,
    extracted_chars: usize,
    text: String,
}

async fn handle_convert(
    State(state): State<AppState>,
    Json(req): Json<ConvertRequest>,
) -> Result<Json<ConvertResponse>, AppError> {
    let mut options = state.extract;
    if let Some(format) = &req.output_format {
        options.output_format = format
            .parse()
            .map_err(|e: anyhow::Error| bad_request(e.to_string()))?;
    }
    if let Some(tables) = req.include_tables {
        options.include_tables = tables;
    }
    if let Some(comments) = req.include_comments {
        options.include_comments = comments;
    }

    let text = convert_html(state.extractor.as_ref(), &req.html, &options)
        .await
        .map_err(|e| match e {
            ConvertError::ExtractionEmpty => bad_request(e.to_string()),
            other => internal(other.to_string()),
        })?;

    Ok(Json(ConvertResponse {
        output_format: options.output_format,
        extracted_chars: text.chars().count(),
        text,
    }))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Response, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    info!(question = %req.question, "ask");
    let tokens = state
        .answers
        .stream_answer(&req.question)
        .map(Ok::<_, Infallible>);

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(tokens),
    )
        .into_response())
}
