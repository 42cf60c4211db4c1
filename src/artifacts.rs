//! The artifact directory: where finished PDFs live and are served from.
//!
//! Writes are atomic per file: content goes to a hidden `.partial` file in the
//! same directory and is renamed into place, so readers only ever see a
//! complete PDF or the previous one. There is no locking between requests;
//! two requests producing the same name race and the later rename wins.

use crate::config::TARGET_EXTENSION;
use crate::error::ServiceError;
use crate::output::ArtifactEntry;
use bytes::Bytes;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Shared, persistent output location.
#[derive(Debug, Clone)]
pub struct ArtifactDirectory {
    dir: PathBuf,
    public_prefix: String,
}

impl ArtifactDirectory {
    pub fn new(dir: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            public_prefix: public_prefix.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    /// Create the directory if it does not exist yet.
    pub async fn ensure_exists(&self) -> Result<(), ServiceError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            ServiceError::io(
                format!("Failed to create artifact directory '{}'", self.dir.display()),
                e,
            )
        })?;
        info!("Artifact directory: {}", self.dir.display());
        Ok(())
    }

    /// Retrieval URL for an artifact name.
    pub fn url_for(&self, name: &str) -> String {
        format!("{}/{}", self.public_prefix, encode_path_segment(name))
    }

    /// Copy `src` into the directory as `name`, replacing any previous file.
    pub async fn publish_file(&self, src: &Path, name: &str) -> Result<PathBuf, ServiceError> {
        let src = src.to_path_buf();
        self.write_atomic(name, move |out| {
            let mut input = std::fs::File::open(&src)?;
            std::io::copy(&mut input, out)?;
            Ok(())
        })
        .await
    }

    /// Write `bytes` into the directory as `name`, replacing any previous file.
    pub async fn publish_bytes(&self, name: &str, bytes: Bytes) -> Result<PathBuf, ServiceError> {
        self.write_atomic(name, move |out| out.write_all(&bytes)).await
    }

    async fn write_atomic<F>(&self, name: &str, fill: F) -> Result<PathBuf, ServiceError>
    where
        F: FnOnce(&mut std::fs::File) -> std::io::Result<()> + Send + 'static,
    {
        let dir = self.dir.clone();
        let target = self.dir.join(name);
        let dest = target.clone();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&dir)?;
            let mut tmp = tempfile::Builder::new()
                .prefix(".")
                .suffix(".partial")
                .tempfile_in(&dir)?;
            fill(tmp.as_file_mut())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&dest).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| ServiceError::Internal(format!("Publish task panicked: {}", e)))?
        .map_err(|e| ServiceError::io(format!("Failed to publish '{}'", name), e))?;

        debug!("Published {}", target.display());
        Ok(target)
    }

    /// List finished artifacts, sorted by name.
    ///
    /// A missing directory lists as empty.
    pub async fn list(&self) -> Result<Vec<ArtifactEntry>, ServiceError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ServiceError::io("Failed to read artifact directory", e)),
        };

        let suffix = format!(".{}", TARGET_EXTENSION);
        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ServiceError::io("Failed to read artifact directory", e))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') || !name.ends_with(&suffix) {
                continue;
            }
            match entry.file_type().await {
                Ok(ft) if ft.is_file() => names.push(name),
                _ => continue,
            }
        }
        names.sort();

        Ok(names
            .into_iter()
            .map(|name| ArtifactEntry {
                url: self.url_for(&name),
                name,
            })
            .collect())
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn encode_path_segment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
