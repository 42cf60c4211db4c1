//! Per-request scratch directories.
//!
//! A [`Workspace`] owns a uniquely named directory for exactly one request.
//! The normal path calls [`Workspace::release`], which removes the tree and
//! reports failures. Every other path (early `?` return, panic, a request
//! future dropped mid-flight) falls through to the inner `TempDir`'s `Drop`,
//! which removes it as well.

use crate::error::ServiceError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

const WORKSPACE_PREFIX: &str = "docx2pdf-";

/// A private, per-request temporary directory.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a new empty workspace under `root`, creating `root` if needed.
    pub async fn acquire(root: &Path) -> Result<Self, ServiceError> {
        let root = root.to_path_buf();
        let dir = tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&root).map_err(|e| {
                ServiceError::io(
                    format!("Failed to create workspace root '{}'", root.display()),
                    e,
                )
            })?;
            tempfile::Builder::new()
                .prefix(WORKSPACE_PREFIX)
                .tempdir_in(&root)
                .map_err(|e| ServiceError::io("Failed to create workspace", e))
        })
        .await
        .map_err(|e| ServiceError::Internal(format!("Workspace task panicked: {}", e)))??;
        debug!("Acquired workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write the uploaded bytes to `<workspace>/<name>`.
    ///
    /// `name` must already be sanitized to a single path component.
    pub async fn stage(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, ServiceError> {
        let path = self.dir.path().join(name);
        if path.parent() != Some(self.dir.path()) {
            return Err(ServiceError::Internal(format!(
                "Refusing to stage '{}' outside the workspace",
                name
            )));
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ServiceError::io("Failed to stage upload", e))?;
        debug!("Staged {} bytes at {}", bytes.len(), path.display());
        Ok(path)
    }

    /// Create (or reuse) a sub-directory of the workspace.
    pub async fn scratch_dir(&self, name: &str) -> Result<PathBuf, ServiceError> {
        let path = self.dir.path().join(name);
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| ServiceError::io("Failed to create scratch directory", e))?;
        Ok(path)
    }

    /// Remove the workspace and everything in it.
    pub async fn release(self) -> Result<(), ServiceError> {
        let path = self.dir.path().to_path_buf();
        let dir = self.dir;
        tokio::task::spawn_blocking(move || dir.close())
            .await
            .map_err(|e| ServiceError::Internal(format!("Workspace task panicked: {}", e)))?
            .map_err(|e| {
                warn!("Failed to remove workspace {}: {}", path.display(), e);
                ServiceError::io(format!("Failed to remove workspace '{}'", path.display()), e)
            })?;
        debug!("Released workspace {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn release_removes_directory_tree() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::acquire(root.path()).await.unwrap();
        let path = ws.path().to_path_buf();

        ws.stage("input.docx", b"PK\x03\x04").await.unwrap();
        let scratch = ws.scratch_dir("out").await.unwrap();
        std::fs::write(scratch.join("input.pdf"), b"%PDF").unwrap();

        assert!(path.exists());
        ws.release().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let ws = Workspace::acquire(root.path()).await.unwrap();
            ws.stage("input.docx", b"data").await.unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn workspaces_are_distinct() {
        let root = tempfile::tempdir().unwrap();
        let a = Workspace::acquire(root.path()).await.unwrap();
        let b = Workspace::acquire(root.path()).await.unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(WORKSPACE_PREFIX));
    }

    #[tokio::test]
    async fn stage_rejects_nested_names() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::acquire(root.path()).await.unwrap();
        assert!(ws.stage("../escape.docx", b"x").await.is_err());
        assert!(ws.stage("a/b.docx", b"x").await.is_err());
    }

    #[tokio::test]
    async fn acquire_creates_missing_root() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("deeper/still");
        let ws = Workspace::acquire(&nested).await.unwrap();
        assert!(ws.path().starts_with(&nested));
    }
}
