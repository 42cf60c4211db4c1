//! Request orchestration: one upload in, one PDF out.
//!
//! [`Converter`] is built once at startup from a [`ServiceConfig`] and shared
//! by every request. [`Converter::convert`] runs the full sequence for one
//! upload and is independent of the HTTP layer.

use crate::artifacts::ArtifactDirectory;
use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::output::{ConvertedDocument, EncryptionStatus};
use crate::pipeline::encrypt::EncryptionClient;
use crate::pipeline::render::{self, Renderer, SofficeRenderer};
use crate::pipeline::upload::{self, ConvertOptions, Upload};
use crate::pipeline::workspace::Workspace;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Shared conversion service state.
pub struct Converter {
    config: ServiceConfig,
    renderer: Arc<dyn Renderer>,
    encryption: EncryptionClient,
    artifacts: ArtifactDirectory,
    render_permits: Semaphore,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .field("encryption", &self.encryption)
            .field("artifacts", &self.artifacts)
            .finish()
    }
}

impl Converter {
    /// Build the converter from a validated configuration.
    pub fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        let renderer = resolve_renderer(&config);
        let encryption = EncryptionClient::from_config(&config)?;
        let artifacts = ArtifactDirectory::new(&config.artifact_dir, config.public_prefix.clone());
        let render_permits = Semaphore::new(config.max_concurrent_renders);
        Ok(Self {
            config,
            renderer,
            encryption,
            artifacts,
            render_permits,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn artifacts(&self) -> &ArtifactDirectory {
        &self.artifacts
    }

    /// Convert one upload.
    ///
    /// # Errors
    /// - `InvalidInput`: bad extension, unusable filename, or encryption
    ///   requested without a password. Nothing is written to disk.
    /// - `ConversionFailed`: the renderer failed; no artifact is published.
    /// - `Io` / `Internal`: unexpected failures.
    ///
    /// Encryption failures are not errors: the result carries
    /// [`EncryptionStatus::Skipped`] and points at the unencrypted PDF.
    pub async fn convert(
        &self,
        upload: Upload,
        options: ConvertOptions,
    ) -> Result<ConvertedDocument, ServiceError> {
        let total_start = Instant::now();

        // ── Step 1: Validate (before any allocation) ─────────────────────────
        let staged_name = upload::validate_filename(&upload.filename)?;
        let password = options.encryption_password()?;
        info!(
            "Converting '{}' ({} bytes, encryption: {})",
            upload.filename,
            upload.bytes.len(),
            options.encrypt
        );

        // ── Step 2: Stage into a private workspace ───────────────────────────
        let workspace = Workspace::acquire(&self.config.workspace_root()).await?;
        let result = self
            .run_in_workspace(&workspace, &staged_name, &upload, password)
            .await;

        // ── Step 5: Cleanup (every branch) ───────────────────────────────────
        // A failed removal is logged by `release`; the request outcome stands.
        // If this future is dropped instead, `Workspace`'s Drop removes it.
        let _ = workspace.release().await;

        let mut document = result?;
        document.total_duration_ms = total_start.elapsed().as_millis() as u64;
        info!(
            "Conversion of '{}' complete in {}ms",
            document.filename, document.total_duration_ms
        );
        Ok(document)
    }

    async fn run_in_workspace(
        &self,
        workspace: &Workspace,
        staged_name: &str,
        upload: &Upload,
        password: Option<&str>,
    ) -> Result<ConvertedDocument, ServiceError> {
        let input = workspace.stage(staged_name, &upload.bytes).await?;

        // ── Step 3: Render into the artifact directory ───────────────────────
        let render_start = Instant::now();
        let converted = render::render_document(
            self.renderer.as_ref(),
            &self.render_permits,
            &input,
            workspace,
            &self.artifacts,
        )
        .await?;
        let render_duration_ms = render_start.elapsed().as_millis() as u64;

        // ── Step 4: Optional encryption ──────────────────────────────────────
        let (path, encryption) = match password {
            None => (converted.clone(), EncryptionStatus::NotRequested),
            Some(password) => self.encrypt_or_fallback(&converted, password).await,
        };

        Ok(ConvertedDocument {
            filename: file_name(&path),
            path,
            converted_path: converted,
            encryption,
            render_duration_ms,
            total_duration_ms: 0,
        })
    }

    async fn encrypt_or_fallback(
        &self,
        converted: &Path,
        password: &str,
    ) -> (PathBuf, EncryptionStatus) {
        match self
            .encryption
            .encrypt(converted, password, &self.artifacts)
            .await
        {
            Ok(encrypted) => (encrypted, EncryptionStatus::Applied),
            Err(e) => {
                warn!(
                    "Encryption skipped for {} ({}): {}",
                    converted.display(),
                    e.reason_code(),
                    e
                );
                (
                    converted.to_path_buf(),
                    EncryptionStatus::Skipped {
                        reason: e.reason_code().to_string(),
                        detail: e.to_string(),
                    },
                )
            }
        }
    }
}

/// Resolve the renderer: a pre-built one from the config wins, otherwise
/// LibreOffice at `config.soffice_path`.
fn resolve_renderer(config: &ServiceConfig) -> Arc<dyn Renderer> {
    if let Some(ref renderer) = config.renderer {
        return Arc::clone(renderer);
    }
    Arc::new(SofficeRenderer::from_config(config))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
