//! HTTP service.
//!
//! | Method | Path                | Body                           | Response |
//! |--------|---------------------|--------------------------------|----------|
//! | GET    | `/health`           |                                | `{status, externalToolAvailable, timestamp}` |
//! | POST   | `/convert`          | `{markdown, filename?, folder?}` | `{success, filename, folder, message}` |
//! | POST   | `/convert-pdf-only` | `{markdown, filename?}`        | `application/pdf` attachment |
//! | POST   | `/preview`          | `{markdown, title?}`           | `text/html` |
//! | GET    | `/folders`          |                                | `{success, folders}` |
//!
//! Every failure is a JSON body `{success: false, error, details?, instructions?}`
//! with a status chosen from the error's category.
//!
//! The [`ConversionConfig`] is built once at startup and shared by all
//! handlers through router state.

use crate::config::ConversionConfig;
use crate::convert::{convert_and_upload, convert_to_bytes, render_preview};
use crate::error::{ErrorCategory, RemarkdownError};
use crate::output::ConversionRequest;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
struct AppState {
    config: Arc<ConversionConfig>,
}

// ── Request / response bodies ────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConvertBody {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    folder: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PreviewBody {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    external_tool_available: bool,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct ConvertResponse {
    success: bool,
    filename: String,
    folder: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct FoldersResponse {
    success: bool,
    folders: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,
}

// ── Error mapping ────────────────────────────────────────────────────────

/// HTTP status for a library error.
pub fn status_for(err: &RemarkdownError) -> StatusCode {
    match err {
        RemarkdownError::RenderTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        RemarkdownError::ToolNotInstalled { .. } | RemarkdownError::ToolNotAuthenticated { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        RemarkdownError::UploadRejected { .. } | RemarkdownError::ToolFailed { .. } => StatusCode::BAD_GATEWAY,
        other => match other.category() {
            ErrorCategory::Input => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

/// Wrapper that renders a [`RemarkdownError`] as the JSON error body.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl From<RemarkdownError> for ApiError {
    fn from(err: RemarkdownError) -> Self {
        let text = err.to_string();
        let mut lines = text.lines();
        let headline = lines.next().unwrap_or_default().to_string();
        let rest = lines.collect::<Vec<_>>().join("\n");
        Self {
            status: status_for(&err),
            body: ErrorBody {
                success: false,
                error: headline,
                details: (!rest.is_empty()).then_some(rest),
                instructions: err.instructions(),
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            body: ErrorBody {
                success: false,
                error: "Invalid JSON request body".into(),
                details: Some(rejection.body_text()),
                instructions: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{} {}", self.status, self.body.error);
        } else {
            warn!("{} {}", self.status, self.body.error);
        }
        (self.status, Json(self.body)).into_response()
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let available = state.config.resolve_uploader().is_available().await;
    Json(HealthResponse {
        status: "ok",
        external_tool_available: available,
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn convert(
    State(state): State<AppState>,
    body: Result<Json<ConvertBody>, JsonRejection>,
) -> Result<Json<ConvertResponse>, ApiError> {
    let Json(body) = body?;
    let request = ConversionRequest::new(body.markdown.unwrap_or_default(), body.filename.unwrap_or_default());
    let receipt = convert_and_upload(&request, body.folder.as_deref(), &state.config).await?;
    Ok(Json(ConvertResponse {
        success: true,
        filename: receipt.filename,
        folder: receipt.folder,
        message: receipt.message,
    }))
}

async fn convert_pdf_only(
    State(state): State<AppState>,
    body: Result<Json<ConvertBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let request = ConversionRequest::new(body.markdown.unwrap_or_default(), body.filename.unwrap_or_default());
    let pdf = convert_to_bytes(&request, &state.config).await?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", pdf.filename))
        .map_err(|e| RemarkdownError::Internal(format!("content-disposition: {e}")))?;
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf.bytes,
    )
        .into_response())
}

async fn preview(body: Result<Json<PreviewBody>, JsonRejection>) -> Result<Html<String>, ApiError> {
    let Json(body) = body?;
    let request = ConversionRequest::new(body.markdown.unwrap_or_default(), body.title.unwrap_or_default());
    Ok(Html(render_preview(&request)?))
}

async fn folders(State(state): State<AppState>) -> Result<Json<FoldersResponse>, ApiError> {
    let listed = state.config.resolve_uploader().list_folders().await?;
    let mut folders = vec!["/".to_string(), state.config.default_folder.clone()];
    for folder in listed {
        if !folders.contains(&folder) {
            folders.push(folder);
        }
    }
    Ok(Json(FoldersResponse { success: true, folders }))
}

// ── Router & server ──────────────────────────────────────────────────────

/// Build the application router around a shared configuration.
pub fn build_router(config: ConversionConfig) -> Router {
    let body_limit = config.max_body_bytes;
    let state = AppState {
        config: Arc::new(config),
    };
    Router::new()
        .route("/health", get(health))
        .route("/convert", post(convert))
        .route("/convert-pdf-only", post(convert_pdf_only))
        .route("/preview", post(preview))
        .route("/folders", get(folders))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Probe the upload collaborator once and log what a user would need to fix.
pub async fn log_readiness(config: &ConversionConfig) {
    let uploader = config.resolve_uploader();
    match uploader.ensure_ready().await {
        Ok(()) => info!("{} is installed and authenticated", uploader.name()),
        Err(e) => {
            warn!("Uploads will fail until this is fixed: {}", e);
            if let Some(hint) = e.instructions() {
                warn!("{}", hint);
            }
        }
    }
}

/// Serve until Ctrl-C.
pub async fn serve(config: ConversionConfig, addr: SocketAddr) -> Result<(), RemarkdownError> {
    log_readiness(&config).await;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| RemarkdownError::Internal(format!("cannot bind {addr}: {e}")))?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, build_router(config))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RemarkdownError::Internal(format!("server error: {e}")))?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Could not listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
