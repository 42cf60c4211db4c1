//! Encryption client: hand a finished PDF to the encryption service.
//!
//! The service takes a multipart form `{password, file}` and answers with the
//! encrypted PDF as the response body. Every failure here is recoverable: the
//! caller keeps the unencrypted PDF and reports why encryption was skipped.
//! One attempt per request, no retries.

use crate::artifacts::ArtifactDirectory;
use crate::config::{ServiceConfig, ENCRYPTED_PREFIX};
use crate::error::{EncryptionError, ServiceError};
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// HTTP client for the encryption service.
#[derive(Debug, Clone)]
pub struct EncryptionClient {
    client: reqwest::Client,
    url: String,
    timeout_secs: u64,
}

impl EncryptionClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
            timeout_secs: timeout.as_secs(),
        })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, ServiceError> {
        Self::new(
            config.encryption_url.clone(),
            Duration::from_secs(config.encryption_timeout_secs),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Name of the encrypted copy of `pdf_name`.
    pub fn encrypted_name(pdf_name: &str) -> String {
        format!("{}{}", ENCRYPTED_PREFIX, pdf_name)
    }

    /// Encrypt `pdf` with `password` and store the result next to it in the
    /// artifact directory as `encrypted_<name>`.
    ///
    /// The caller guarantees `password` is non-empty.
    pub async fn encrypt(
        &self,
        pdf: &Path,
        password: &str,
        artifacts: &ArtifactDirectory,
    ) -> Result<PathBuf, EncryptionError> {
        let pdf_name = pdf
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.pdf")
            .to_string();

        let bytes = tokio::fs::read(pdf).await.map_err(|e| EncryptionError::Io {
            path: pdf.to_path_buf(),
            source: e,
        })?;

        info!("Encrypting {} via {}", pdf_name, self.url);

        let part = Part::bytes(bytes)
            .file_name(pdf_name.clone())
            .mime_str("application/pdf")
            .map_err(|e| self.classify(e))?;
        let form = Form::new()
            .text("password", password.to_string())
            .part("file", part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !response.status().is_success() {
            return Err(EncryptionError::Status {
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        if body.is_empty() {
            return Err(EncryptionError::EmptyResponse);
        }
        debug!("Encryption service returned {} bytes", body.len());

        artifacts
            .publish_bytes(&Self::encrypted_name(&pdf_name), body)
            .await
            .map_err(EncryptionError::Store)
    }

    fn classify(&self, e: reqwest::Error) -> EncryptionError {
        if e.is_timeout() {
            EncryptionError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            EncryptionError::Transport {
                url: self.url.clone(),
                reason: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypted_name_is_prefixed() {
        assert_eq!(EncryptionClient::encrypted_name("report.pdf"), "encrypted_report.pdf");
    }

    #[tokio::test]
    async fn unreadable_source_is_io_error() {
        let root = tempfile::tempdir().unwrap();
        let artifacts = ArtifactDirectory::new(root.path(), "/files");
        let client =
            EncryptionClient::new("http://127.0.0.1:1/encrypt", Duration::from_secs(1)).unwrap();

        let err = client
            .encrypt(&root.path().join("missing.pdf"), "pw", &artifacts)
            .await
            .unwrap_err();
        assert_eq!(err.reason_code(), "io_error");
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let root = tempfile::tempdir().unwrap();
        let pdf = root.path().join("report.pdf");
        std::fs::write(&pdf, b"%PDF-1.7").unwrap();
        let artifacts = ArtifactDirectory::new(root.path(), "/files");
        let client =
            EncryptionClient::new("http://127.0.0.1:1/encrypt", Duration::from_secs(5)).unwrap();

        let err = client.encrypt(&pdf, "pw", &artifacts).await.unwrap_err();
        assert_eq!(err.reason_code(), "unreachable", "got: {err}");
        assert!(!root.path().join("encrypted_report.pdf").exists());
    }
}
