//! Error types for the edgequake-docx2pdf service.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ServiceError`]: **Fatal** for the request: the upload is invalid or the
//!   document could not be converted. Mapped to a 4xx/5xx response.
//!
//! * [`EncryptionError`]: **Non-fatal**: the PDF exists but the encryption
//!   service could not protect it. The request still succeeds with the
//!   unencrypted PDF and a fallback marker; this error never becomes a
//!   [`ServiceError`].

use axum::http::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// All request-fatal errors returned by the conversion pipeline.
#[derive(Debug, Error)]
pub enum ServiceError {
    // ── Client errors ─────────────────────────────────────────────────────
    /// The upload or form fields were rejected before any work started.
    #[error("{message}")]
    InvalidInput { message: String },

    /// The request body exceeded the configured upload limit.
    #[error("Upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The renderer exited non-zero, timed out, or produced no output file.
    #[error("Conversion failed: {message}")]
    ConversionFailed { message: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// A filesystem operation in the workspace or artifact directory failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn conversion_failed(message: impl Into<String>) -> Self {
        Self::ConversionFailed {
            message: message.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// HTTP status the error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            ServiceError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::ConversionFailed { .. }
            | ServiceError::Io { .. }
            | ServiceError::InvalidConfig(_)
            | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client.
    ///
    /// Conversion failures carry the renderer's diagnostics; anything
    /// unexpected is reduced to a generic message and logged instead.
    pub fn client_message(&self) -> String {
        match self {
            ServiceError::InvalidInput { .. }
            | ServiceError::PayloadTooLarge { .. }
            | ServiceError::ConversionFailed { .. } => self.to_string(),
            ServiceError::Io { .. } | ServiceError::InvalidConfig(_) | ServiceError::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

/// A recoverable failure of the remote encryption service.
///
/// Every variant means "encryption unavailable": the caller falls back to the
/// unencrypted artifact.
#[derive(Debug, Error)]
pub enum EncryptionError {
    /// The service could not be reached (DNS, connect, TLS, reset).
    #[error("Encryption service unreachable at '{url}': {reason}")]
    Transport { url: String, reason: String },

    /// The service did not answer within the configured timeout.
    #[error("Encryption service timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The service answered with a non-success status.
    #[error("Encryption service returned HTTP {status}")]
    Status { status: u16 },

    /// The service answered 2xx with an empty body.
    #[error("Encryption service returned an empty body")]
    EmptyResponse,

    /// Reading the PDF to send failed locally.
    #[error("Failed to read '{path}' for encryption: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The encrypted bytes could not be written to the artifact directory.
    #[error("Failed to store encrypted artifact: {0}")]
    Store(#[source] ServiceError),
}

impl EncryptionError {
    /// Machine-readable reason, sent in the fallback header.
    pub fn reason_code(&self) -> &'static str {
        match self {
            EncryptionError::Transport { .. } => "unreachable",
            EncryptionError::Timeout { .. } => "timeout",
            EncryptionError::Status { .. } => "service_error",
            EncryptionError::EmptyResponse => "empty_response",
            EncryptionError::Io { .. } | EncryptionError::Store(_) => "io_error",
        }
    }
}
