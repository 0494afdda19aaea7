use crate::{
    app::{
        errors::AppError,
        session::{BatchReport, FileError, Session, SessionStats, Upload},
    },
    config::Theme,
    documents::{DocumentMetadata, SearchResult},
    images::SUPPORTED_FORMATS,
    processor::ProcessingMode,
};
use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{fmt::Debug, sync::Arc};
use tokio::signal;
use tower_http::set_header::SetResponseHeaderLayer;

const INDEX_HTML: &str = include_str!("assets/index.html");

#[derive(Clone)]
struct SharedState {
    session: Arc<Session>,
}

pub fn router(session: Arc<Session>) -> Router {
    let body_limit = session.config().upload.max_request_bytes();
    let shared_state = Arc::new(SharedState { session });

    Router::new()
        .route("/", get(index))
        .route("/api/config", get(get_config))
        .route("/api/documents", get(list_documents))
        .route("/api/documents/upload", post(upload))
        .route("/api/documents/samples", post(load_samples))
        .route("/api/documents/:id/thumbnail", get(thumbnail))
        .route("/api/search", post(search))
        .route("/api/clear", post(clear))
        .route("/api/stats", get(stats))
        .route("/api/settings/api_key", post(set_api_key))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

async fn start_app(session: Arc<Session>, addr: String) -> anyhow::Result<()> {
    async fn shutdown_signal() {
        let ctrl_c = async {
            if let Err(err) = signal::ctrl_c().await {
                log::error!("failed to install Ctrl+C handler: {err}");
            }
        };

        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(err) => {
                    log::error!("failed to install signal handler: {err}");
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }

        log::warn!("shutting down, session data is discarded");
    }

    let app = router(session);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn start_daemon(session: Session, addr: &str) -> anyhow::Result<()> {
    let session = Arc::new(session);
    let addr = addr.to_string();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async { start_app(session, addr).await })
}

#[derive(Debug)]
struct HttpError(AppError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0 {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) | AppError::Base64(_) => {
                log::warn!("{self:?}");
                StatusCode::BAD_REQUEST
            }
            AppError::Search(_) | AppError::IO(_) | AppError::Other(_) => {
                log::error!("{self:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Settings the UI needs to render itself.
#[derive(Debug, Serialize, Deserialize)]
pub struct UiConfigResponse {
    pub page_title: String,
    pub theme: Theme,
    pub max_upload_size_mb: u64,
    pub max_files_per_batch: usize,
    pub accepted_formats: Vec<String>,
    pub supported_formats: Vec<String>,
    pub example_queries: Vec<String>,
    pub default_top_k: usize,
    pub mode: ProcessingMode,
}

async fn get_config(State(state): State<Arc<SharedState>>) -> Json<UiConfigResponse> {
    let session = state.session.clone();
    let mode = tokio::task::block_in_place(move || session.mode());
    let config = state.session.config();

    Json(UiConfigResponse {
        page_title: config.ui.page_title.clone(),
        theme: config.ui.theme,
        max_upload_size_mb: config.upload.max_upload_size_mb,
        max_files_per_batch: config.upload.max_files_per_batch,
        accepted_formats: config.upload.accepted_formats.clone(),
        supported_formats: SUPPORTED_FORMATS.iter().map(|f| f.to_string()).collect(),
        example_queries: config.ui.example_queries.clone(),
        default_top_k: config.search.default_top_k,
        mode,
    })
}

#[derive(Deserialize, Serialize)]
pub struct UploadFile {
    pub filename: String,
    pub image_b64: String,
}

impl Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "UploadFile {{ filename: {:?}, image_b64: [REDUCTED] }}",
            self.filename
        )
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UploadRequest {
    pub files: Vec<UploadFile>,
}

async fn upload(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<UploadRequest>,
) -> Result<Json<BatchReport>, HttpError> {
    log::debug!("payload: {payload:?}");

    let session = state.session.clone();

    tokio::task::block_in_place(move || {
        let mut uploads = Vec::with_capacity(payload.files.len());
        let mut rejected = Vec::new();

        for file in payload.files {
            match STANDARD.decode(file.image_b64.trim()) {
                Ok(data) => uploads.push(Upload::new(file.filename, data)),
                Err(err) => {
                    log::warn!("failed to decode {}: {err}", file.filename);
                    rejected.push(FileError {
                        filename: file.filename,
                        error: AppError::Base64(err).to_string(),
                    });
                }
            }
        }

        Ok(session.ingest_with_rejected(uploads, rejected)?.into())
    })
}

async fn load_samples(
    State(state): State<Arc<SharedState>>,
) -> Result<Json<BatchReport>, HttpError> {
    let session = state.session.clone();
    tokio::task::block_in_place(move || Ok(session.load_samples()?.into()))
}

async fn list_documents(State(state): State<Arc<SharedState>>) -> Json<Vec<DocumentMetadata>> {
    let session = state.session.clone();
    Json(tokio::task::block_in_place(move || session.documents()))
}

async fn thumbnail(
    State(state): State<Arc<SharedState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let session = state.session.clone();
    let data = tokio::task::block_in_place(move || session.thumbnail(&id))?;
    Ok(([(header::CONTENT_TYPE, "image/webp")], data))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: Option<usize>,
}

async fn search(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<Vec<SearchResult>>, HttpError> {
    log::debug!("payload: {payload:?}");

    let session = state.session.clone();
    tokio::task::block_in_place(move || {
        session
            .search(&payload.query, payload.top_k)
            .map(Into::into)
            .map_err(Into::into)
    })
}

async fn clear(State(state): State<Arc<SharedState>>) -> Json<SessionStats> {
    let session = state.session.clone();
    tokio::task::block_in_place(move || {
        session.clear();
        Json(session.stats())
    })
}

async fn stats(State(state): State<Arc<SharedState>>) -> Json<SessionStats> {
    let session = state.session.clone();
    Json(tokio::task::block_in_place(move || session.stats()))
}

#[derive(Deserialize, Serialize)]
pub struct ApiKeyRequest {
    /// `null` drops the session key
    pub api_key: Option<String>,
}

impl Debug for ApiKeyRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ApiKeyRequest {{ api_key: {} }}",
            if self.api_key.is_some() { "[REDUCTED]" } else { "None" }
        )
    }
}

async fn set_api_key(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<ApiKeyRequest>,
) -> Result<Json<SessionStats>, HttpError> {
    log::debug!("payload: {payload:?}");

    let session = state.session.clone();
    tokio::task::block_in_place(move || {
        session.set_api_key(payload.api_key)?;
        Ok(Json(session.stats()))
    })
}
