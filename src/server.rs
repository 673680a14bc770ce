//! HTTP surface.
//!
//! Routes:
//! - `POST /api/process` - multipart upload in, ZIP of renditions out
//! - `GET /health` - liveness check
//!
//! The pipeline is CPU-bound, so handlers hand it to the blocking pool and
//! only do request parsing and response mapping on the async runtime.
//!
//! Error bodies are always JSON `{ "error": "..." }`. Client errors carry the
//! reason; server errors carry a fixed message and the detail goes to the log.

use crate::config::PipelineConfig;
use crate::imaging::{PreferredFormat, RustCodec};
use crate::pipeline::{PipelineError, process_upload};
use crate::validate::{InputError, UploadedImage};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Room for multipart boundaries, part headers and the small text fields on
/// top of the image itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

const FILE_FIELDS: [&str; 2] = ["file", "image"];

#[derive(Clone)]
struct AppState {
    config: Arc<PipelineConfig>,
    codec: Arc<RustCodec>,
}

/// Build the router for a validated pipeline configuration.
pub fn create_router(config: PipelineConfig) -> Router {
    let body_limit = config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);
    let state = AppState {
        codec: Arc::new(config.codec()),
        config: Arc::new(config),
    };

    Router::new()
        .route("/api/process", post(process_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(bind: SocketAddr, config: PipelineConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, create_router(config))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "cannot listen for ctrl-c, running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn process_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut multipart = multipart?;
    let form = read_form(&mut multipart, state.config.max_upload_bytes).await?;
    info!(
        bytes = form.upload.bytes.len(),
        file_name = form.upload.file_name.as_deref().unwrap_or("-"),
        "upload received"
    );

    let config = match form.format {
        Some(format) => state.config.with_preferred_format(format),
        None => PipelineConfig::clone(&state.config),
    };
    let codec = Arc::clone(&state.codec);
    let upload = form.upload;
    let archive = tokio::task::spawn_blocking(move || process_upload(&*codec, &upload, &config))
        .await
        .map_err(|err| ApiError::Internal(format!("pipeline task failed: {err}")))??;

    let disposition = format!("attachment; filename=\"{}\"", archive.filename);
    Ok((
        [
            (header::CONTENT_TYPE, archive.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        archive.bytes,
    )
        .into_response())
}

struct UploadForm {
    upload: UploadedImage,
    format: Option<PreferredFormat>,
}

/// Pull the image and the optional `format` field out of the form. The image
/// is buffered chunk by chunk and abandoned as soon as it passes `limit`.
async fn read_form(multipart: &mut Multipart, limit: usize) -> Result<UploadForm, ApiError> {
    let mut upload: Option<UploadedImage> = None;
    let mut format = None;

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if FILE_FIELDS.contains(&name.as_str()) {
            if upload.is_some() {
                return Err(InputError::InvalidField {
                    field: name,
                    reason: "only one image per request".into(),
                }
                .into());
            }
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);

            let mut bytes = Vec::new();
            while let Some(chunk) = field.chunk().await? {
                let size = bytes.len() + chunk.len();
                if size > limit {
                    return Err(InputError::TooLarge { size, limit }.into());
                }
                bytes.extend_from_slice(&chunk);
            }
            upload = Some(UploadedImage {
                bytes,
                content_type,
                file_name,
            });
        } else if name == "format" {
            let text = field.text().await?;
            let parsed = text
                .parse::<PreferredFormat>()
                .map_err(|reason| InputError::InvalidField {
                    field: name,
                    reason,
                })?;
            format = Some(parsed);
        } else {
            debug!(field = %name, "ignoring unknown form field");
        }
    }

    let upload = upload.ok_or_else(|| InputError::MissingField("file".into()))?;
    Ok(UploadForm { upload, format })
}

/// Everything a handler can fail with, already sorted into client and server
/// faults.
#[derive(Debug)]
enum ApiError {
    Rejected { status: StatusCode, reason: String },
    Internal(String),
}

fn input_status(err: &InputError) -> StatusCode {
    if err.is_too_large() {
        StatusCode::PAYLOAD_TOO_LARGE
    } else if err.is_unsupported_media() {
        StatusCode::UNSUPPORTED_MEDIA_TYPE
    } else {
        StatusCode::BAD_REQUEST
    }
}

impl From<InputError> for ApiError {
    fn from(err: InputError) -> Self {
        ApiError::Rejected {
            status: input_status(&err),
            reason: err.to_string(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidInput(input) => input.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        let status = err.status();
        if status.is_server_error() {
            ApiError::Internal(err.body_text())
        } else {
            ApiError::Rejected {
                status,
                reason: err.body_text(),
            }
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            reason: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Rejected { status, reason } => {
                warn!(status = status.as_u16(), %reason, "request rejected");
                (status, Json(json!({ "error": reason }))).into_response()
            }
            ApiError::Internal(detail) => {
                error!(%detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}
