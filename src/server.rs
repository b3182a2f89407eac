//! HTTP server for document Q&A and dashboards.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (version and model) |
//! | `POST`   | `/api/dociq/upload` | Upload a document (multipart `file`) |
//! | `GET`    | `/api/dociq/documents` | List uploaded documents |
//! | `DELETE` | `/api/dociq/documents/{id}` | Delete one document |
//! | `POST`   | `/api/dociq/clear` | Delete all documents and the conversation |
//! | `POST`   | `/api/dociq/chat` | Ask a question (`{"message": "..."}`) |
//! | `GET`    | `/api/dociq/summary` | Summarize uploaded documents |
//! | `POST`   | `/api/viziq/upload` | Upload a table (multipart `file`) |
//! | `POST`   | `/api/viziq/clear` | Drop the active dataset |
//! | `GET`    | `/api/viziq/data` | Active dataset and dashboard |
//! | `POST`   | `/api/chat` | Assistant chat (`{"message": "...", "search": false}`) |
//! | `POST`   | `/api/chat/edit` | Edit a user message and regenerate (`{"index": 0, "content": "..."}`) |
//! | `POST`   | `/api/chat/reset` | Forget the assistant chat |
//! | `POST`   | `/api/search` | Web search (`{"query": "...", "summarize": false}`) |
//! | `POST`   | `/api/speech` | Text to MP3 (`{"text": "..."}`) |
//!
//! Every request belongs to the session named by the `x-session-id`
//! header, or `default` when it is absent.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "No file provided" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `payload_too_large` (413),
//! `extraction_failed` (422), `internal` (500), `speech_failed` (502),
//! `unavailable` (503).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! can be served from anywhere.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use docviz_core::store::memory::InMemorySessionStore;
use docviz_core::store::SessionStore;

use crate::chat::{self, ChatError, ChatTurnReply, EditReply, SearchReply};
use crate::config::{Config, StoreBackend};
use crate::dociq::{self, ChatReply, DocumentSummary, SummaryReply};
use crate::extract::ExtractError;
use crate::llm::{create_completer, Completer};
use crate::migrate::create_schema;
use crate::speech::{create_synthesizer, Synthesizer};
use crate::sqlite_store::SqliteSessionStore;
use crate::table::TabularError;
use crate::viziq::{self, DataReply, UploadReply};
use crate::websearch::{create_searcher, Searcher};

/// Header carrying the session id.
pub const SESSION_HEADER: &str = "x-session-id";

const DEFAULT_SESSION: &str = "default";

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn SessionStore>,
    pub completer: Arc<dyn Completer>,
    pub searcher: Arc<dyn Searcher>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

/// Open the session store selected by `[store].backend`.
///
/// The SQLite schema is created when missing, so `serve` works on a
/// fresh database file.
pub async fn create_store(config: &Config) -> anyhow::Result<Arc<dyn SessionStore>> {
    match config.store.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemorySessionStore::new())),
        StoreBackend::Sqlite => {
            let store = SqliteSessionStore::connect(config).await?;
            create_schema(store.pool()).await?;
            Ok(Arc::new(store))
        }
    }
}

/// All routes with CORS, request tracing, and the upload size limit.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = state.config.server.max_upload_bytes;

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/dociq/upload", post(handle_dociq_upload))
        .route("/api/dociq/documents", get(handle_dociq_list))
        .route("/api/dociq/documents/{id}", delete(handle_dociq_delete))
        .route("/api/dociq/clear", post(handle_dociq_clear))
        .route("/api/dociq/chat", post(handle_dociq_chat))
        .route("/api/dociq/summary", get(handle_dociq_summary))
        .route("/api/viziq/upload", post(handle_viziq_upload))
        .route("/api/viziq/clear", post(handle_viziq_clear))
        .route("/api/viziq/data", get(handle_viziq_data))
        .route("/api/chat", post(handle_chat))
        .route("/api/chat/edit", post(handle_chat_edit))
        .route("/api/chat/reset", post(handle_chat_reset))
        .route("/api/search", post(handle_search))
        .route("/api/speech", post(handle_speech))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
        store: create_store(config).await?,
        completer: create_completer(&config.llm)?,
        searcher: create_searcher(&config.search)?,
        synthesizer: create_synthesizer(&config.speech)?,
    };
    info!(
        backend = ?config.store.backend,
        model = state.completer.model_name(),
        search = state.searcher.name(),
        speech = state.synthesizer.name(),
        "session store and collaborators ready"
    );

    let app = build_router(state);

    info!("docviz listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SESSION)
        .to_string()
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
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

fn app_error(status: StatusCode, code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code: code.to_string(),
        message: message.into(),
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    app_error(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    app_error(StatusCode::NOT_FOUND, "not_found", message)
}

fn extraction_failed(message: impl Into<String>) -> AppError {
    app_error(StatusCode::UNPROCESSABLE_ENTITY, "extraction_failed", message)
}

/// Store and other unexpected failures. Details go to the log only.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        error!(error = %format!("{:#}", err), "request failed");
        app_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "internal server error",
        )
    }
}

impl From<ExtractError> for AppError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::UnsupportedFormat(_) => {
                bad_request("File type not supported. Use PDF, DOC, DOCX, or TXT.")
            }
            other => extraction_failed(other.to_string()),
        }
    }
}

impl From<TabularError> for AppError {
    fn from(err: TabularError) -> Self {
        match err {
            TabularError::UnsupportedFormat(detail) => bad_request(format!(
                "Unsupported file type ({}). Use CSV, XLSX, or JSON.",
                detail
            )),
            TabularError::Empty => bad_request("No data found in file"),
            other => extraction_failed(other.to_string()),
        }
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Store(e) => e.into(),
            other => bad_request(other.to_string()),
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        let status = err.status();
        let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "payload_too_large"
        } else {
            "bad_request"
        };
        app_error(status, code, err.body_text())
    }
}

/// The `file` field of a multipart upload: `(filename, bytes)`.
async fn read_upload(mut multipart: Multipart) -> Result<(String, Vec<u8>), AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(bad_request("No file selected"));
        }
        let bytes = field.bytes().await?;
        return Ok((filename, bytes.to_vec()));
    }
    Err(bad_request("No file provided"))
}

#[derive(Serialize)]
struct Success<T: Serialize> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

fn success<T: Serialize>(body: T) -> Json<Success<T>> {
    Json(Success {
        success: true,
        body,
    })
}

#[derive(Serialize)]
struct Message {
    message: &'static str,
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    model: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.completer.model_name().to_string(),
    })
}

// ============ /api/dociq ============

#[derive(Serialize)]
struct UploadedDocument {
    document: DocumentSummary,
}

async fn handle_dociq_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<Success<UploadedDocument>>, AppError> {
    let session = session_id(&headers);
    let (filename, bytes) = read_upload(multipart).await?;

    let chunking = state.config.chunking;
    // pdf-extract is CPU-bound.
    let doc = tokio::task::spawn_blocking(move || {
        dociq::ingest_document(&filename, &bytes, &chunking)
    })
    .await
    .map_err(anyhow::Error::from)??;

    let summary = DocumentSummary::from(&doc);
    dociq::add_document(state.store.as_ref(), &session, doc).await?;

    Ok(success(UploadedDocument { document: summary }))
}

#[derive(Serialize)]
struct DocumentList {
    documents: Vec<DocumentSummary>,
}

async fn handle_dociq_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DocumentList>, AppError> {
    let documents = dociq::list_documents(state.store.as_ref(), &session_id(&headers)).await?;
    Ok(Json(DocumentList { documents }))
}

async fn handle_dociq_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Success<Message>>, AppError> {
    let deleted =
        dociq::delete_document(state.store.as_ref(), &session_id(&headers), &id).await?;
    if !deleted {
        return Err(not_found("Document not found"));
    }
    Ok(success(Message {
        message: "Document deleted",
    }))
}

async fn handle_dociq_clear(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Success<Message>>, AppError> {
    dociq::clear(state.store.as_ref(), &session_id(&headers)).await?;
    Ok(success(Message {
        message: "All documents cleared",
    }))
}

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
}

async fn handle_dociq_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, AppError> {
    if req.message.trim().is_empty() {
        return Err(bad_request("No message provided"));
    }

    let reply = dociq::answer(
        state.store.as_ref(),
        state.completer.as_ref(),
        &state.config.retrieval,
        &session_id(&headers),
        &req.message,
    )
    .await?;
    Ok(Json(reply))
}

async fn handle_dociq_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SummaryReply>, AppError> {
    let summary = dociq::summarize(
        state.store.as_ref(),
        state.completer.as_ref(),
        &state.config.retrieval,
        &session_id(&headers),
    )
    .await?;
    summary
        .map(Json)
        .ok_or_else(|| bad_request("No documents uploaded"))
}

// ============ /api/viziq ============

async fn handle_viziq_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<Success<UploadReply>>, AppError> {
    let session = session_id(&headers);
    let (filename, bytes) = read_upload(multipart).await?;

    let stored = tokio::task::spawn_blocking(move || viziq::build_dashboard(&filename, &bytes))
        .await
        .map_err(anyhow::Error::from)??;

    let reply = UploadReply::from(&stored);
    viziq::replace_dashboard(state.store.as_ref(), &session, stored).await?;

    Ok(success(reply))
}

#[derive(Serialize)]
struct Empty {}

async fn handle_viziq_clear(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Success<Empty>>, AppError> {
    viziq::clear(state.store.as_ref(), &session_id(&headers)).await?;
    Ok(success(Empty {}))
}

async fn handle_viziq_data(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DataReply>, AppError> {
    viziq::current(state.store.as_ref(), &session_id(&headers))
        .await?
        .map(Json)
        .ok_or_else(|| not_found("No data loaded"))
}

// ============ /api/chat, /api/search, /api/speech ============

#[derive(Deserialize)]
struct AssistantRequest {
    #[serde(default)]
    message: String,
    #[serde(default)]
    search: bool,
}

async fn handle_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AssistantRequest>,
) -> Result<Json<ChatTurnReply>, AppError> {
    if req.message.trim().is_empty() {
        return Err(bad_request("No message provided"));
    }

    let reply = chat::send(
        state.store.as_ref(),
        state.completer.as_ref(),
        state.searcher.as_ref(),
        &session_id(&headers),
        &req.message,
        req.search,
    )
    .await?;
    Ok(Json(reply))
}

#[derive(Deserialize)]
struct EditRequest {
    index: Option<usize>,
    #[serde(default)]
    content: String,
}

async fn handle_chat_edit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<EditRequest>,
) -> Result<Json<EditReply>, AppError> {
    let index = req
        .index
        .ok_or_else(|| bad_request("Invalid index - index is missing"))?;
    if req.content.trim().is_empty() {
        return Err(bad_request("No content provided"));
    }

    let reply = chat::edit(
        state.store.as_ref(),
        state.completer.as_ref(),
        &session_id(&headers),
        index,
        &req.content,
    )
    .await?;
    Ok(Json(reply))
}

async fn handle_chat_reset(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Success<Message>>, AppError> {
    chat::reset(state.store.as_ref(), &session_id(&headers)).await?;
    Ok(success(Message {
        message: "Conversation reset",
    }))
}

#[derive(Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: String,
    #[serde(default)]
    summarize: bool,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchReply>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("No query provided"));
    }
    let reply = chat::web_search(
        state.searcher.as_ref(),
        state.completer.as_ref(),
        &req.query,
        req.summarize,
    )
    .await;
    Ok(Json(reply))
}

#[derive(Deserialize)]
struct SpeechRequest {
    #[serde(default)]
    text: String,
}

async fn handle_speech(
    State(state): State<AppState>,
    Json(req): Json<SpeechRequest>,
) -> Result<Response, AppError> {
    if req.text.trim().is_empty() {
        return Err(bad_request("No text provided"));
    }

    match state.synthesizer.synthesize(&req.text).await {
        Ok(Some(audio)) => Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response()),
        Ok(None) => Err(app_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "unavailable",
            "Speech generation failed: no speech provider configured",
        )),
        Err(e) => {
            warn!(error = %e, synthesizer = state.synthesizer.name(), "speech synthesis failed");
            Err(app_error(
                StatusCode::BAD_GATEWAY,
                "speech_failed",
                "Speech generation failed",
            ))
        }
    }
}
