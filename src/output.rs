//! Result types returned by the conversion pipeline and the listing endpoint.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What happened to an encryption request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EncryptionStatus {
    /// The client did not ask for encryption.
    NotRequested,
    /// The returned artifact is the encrypted copy.
    Applied,
    /// Encryption was requested but the service was unavailable; the returned
    /// artifact is the unencrypted PDF.
    Skipped {
        /// Machine-readable reason (see [`crate::error::EncryptionError::reason_code`]).
        reason: String,
        /// Human-readable detail.
        detail: String,
    },
}

impl EncryptionStatus {
    /// Header value for `X-Encryption-Status`, if encryption was requested.
    pub fn header_value(&self) -> Option<&'static str> {
        match self {
            EncryptionStatus::NotRequested => None,
            EncryptionStatus::Applied => Some("applied"),
            EncryptionStatus::Skipped { .. } => Some("skipped"),
        }
    }
}

/// A finished conversion, ready to be sent back to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertedDocument {
    /// Artifact to return (encrypted copy when encryption was applied).
    pub path: PathBuf,
    /// Download filename for `Content-Disposition`.
    pub filename: String,
    /// Unencrypted PDF in the artifact directory.
    pub converted_path: PathBuf,
    /// Encryption outcome.
    pub encryption: EncryptionStatus,
    /// Time spent in the renderer.
    pub render_duration_ms: u64,
    /// Wall-clock time for the whole request.
    pub total_duration_ms: u64,
}

/// One row of the artifact listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub name: String,
    pub url: String,
}

/// Body of `GET /list-pdfs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactListing {
    pub pdfs: Vec<ArtifactEntry>,
}
