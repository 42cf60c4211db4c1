//! HTTP surface: routes, form parsing and response mapping.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `POST /convert` | [`convert_handler`] |
//! | `GET /list-pdfs` | [`list_handler`] |
//! | `GET /files/{name}` | static artifact retrieval (`ServeDir`) |
//! | `GET /health` | liveness |

use crate::convert::Converter;
use crate::error::ServiceError;
use crate::output::{ArtifactListing, ConvertedDocument, EncryptionStatus};
use crate::pipeline::upload::{parse_flag, ConvertOptions, Upload};
use axum::body::Body;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

/// `applied` or `skipped`; present only when encryption was requested.
pub const ENCRYPTION_STATUS_HEADER: &str = "x-encryption-status";

/// Machine-readable reason encryption was skipped.
pub const FALLBACK_REASON_HEADER: &str = "x-encryption-fallback-reason";

/// Build the service router.
pub fn router(converter: Arc<Converter>) -> Router {
    let artifact_dir = converter.artifacts().path().to_path_buf();
    let prefix = converter.artifacts().public_prefix().to_string();
    let upload_limit = converter.config().max_upload_bytes;

    Router::new()
        .route("/health", get(health))
        .route(
            "/convert",
            post(convert_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/list-pdfs", get(list_handler))
        .nest_service(&prefix, ServeDir::new(artifact_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(converter)
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            debug!(error = %self, "Request rejected");
        }
        let body = ErrorBody {
            detail: self.client_message(),
        };
        (status, Json(body)).into_response()
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /convert
///
/// Multipart fields: `file` (required), `encryption` (optional bool),
/// `password` (required when `encryption` is true).
pub async fn convert_handler(
    State(converter): State<Arc<Converter>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ServiceError> {
    let multipart = multipart.map_err(|e| {
        ServiceError::invalid_input(format!("Expected a multipart/form-data body: {}", e))
    })?;
    let limit = converter.config().max_upload_bytes;
    let (upload, options) = read_form(multipart, limit).await?;
    let document = converter.convert(upload, options).await?;
    document_response(&document).await
}

/// GET /list-pdfs
pub async fn list_handler(State(converter): State<Arc<Converter>>) -> Json<ArtifactListing> {
    let pdfs = match converter.artifacts().list().await {
        Ok(pdfs) => pdfs,
        Err(e) => {
            warn!("Listing artifacts failed, returning empty list: {}", e);
            Vec::new()
        }
    };
    Json(ArtifactListing { pdfs })
}

async fn read_form(
    mut multipart: Multipart,
    limit: usize,
) -> Result<(Upload, ConvertOptions), ServiceError> {
    let mut upload = None;
    let mut options = ConvertOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| form_error(e, limit))?
    {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().map(str::to_string).ok_or_else(|| {
                    ServiceError::invalid_input("The 'file' field must carry a filename.")
                })?;
                let bytes = field.bytes().await.map_err(|e| form_error(e, limit))?;
                upload = Some(Upload::new(filename, bytes));
            }
            Some("encryption") => {
                let value = field.text().await.map_err(|e| form_error(e, limit))?;
                options.encrypt = parse_flag("encryption", &value)?;
            }
            Some("password") => {
                let value = field.text().await.map_err(|e| form_error(e, limit))?;
                options.password = Some(value);
            }
            other => debug!("Ignoring form field {:?}", other),
        }
    }

    let upload = upload.ok_or_else(|| ServiceError::invalid_input("Missing 'file' field."))?;
    Ok((upload, options))
}

fn form_error(e: MultipartError, limit: usize) -> ServiceError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge { limit }
    } else {
        ServiceError::invalid_input(format!("Malformed multipart form: {}", e.body_text()))
    }
}

async fn document_response(document: &ConvertedDocument) -> Result<Response, ServiceError> {
    let bytes = tokio::fs::read(&document.path)
        .await
        .map_err(|e| ServiceError::io("Failed to read converted artifact", e))?;

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", document.filename),
        )
        .header(header::CONTENT_LENGTH, bytes.len());

    if let Some(status) = document.encryption.header_value() {
        builder = builder.header(ENCRYPTION_STATUS_HEADER, status);
    }
    if let EncryptionStatus::Skipped { ref reason, .. } = document.encryption {
        builder = builder.header(FALLBACK_REASON_HEADER, reason.as_str());
    }

    builder
        .body(Body::from(bytes))
        .map_err(|e| ServiceError::Internal(format!("Response build failed: {}", e)))
}
