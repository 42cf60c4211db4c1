//! Document rendering: turn a staged `.docx` into a PDF with LibreOffice.
//!
//! ## Why tokio::process?
//!
//! `soffice` runs for anywhere between a fraction of a second and minutes.
//! Driving it through `tokio::process` keeps the wait off the worker threads
//! and ties the process to the request future: when the render times out or
//! the request is dropped, the child is killed together with everything it
//! spawned (`soffice` is only a launcher for `soffice.bin`), and the render
//! permit is released at that same moment. A semaphore caps how many
//! conversions run at once.
//!
//! The renderer writes into a scratch directory inside the request's
//! workspace. Only a complete output file is published to the artifact
//! directory, so a failed conversion never touches an existing artifact.

use crate::artifacts::ArtifactDirectory;
use crate::config::{ServiceConfig, TARGET_EXTENSION};
use crate::error::ServiceError;
use crate::pipeline::workspace::Workspace;
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

const MAX_DIAGNOSTIC_BYTES: usize = 4096;

/// An external document converter.
///
/// Implementations must write `<input stem>.<format>` into `out_dir` on
/// success. The returned future may be dropped at any await point when the
/// request is cancelled; it must not leave work running behind it.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, input: &Path, out_dir: &Path, format: &str) -> Result<(), ServiceError>;
}

/// Renderer backed by the LibreOffice command line.
#[derive(Debug, Clone)]
pub struct SofficeRenderer {
    program: PathBuf,
    leading_args: Vec<String>,
    timeout: Duration,
}

impl SofficeRenderer {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            timeout,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            program: config.soffice_path.clone(),
            leading_args: config.soffice_args.clone(),
            timeout: Duration::from_secs(config.render_timeout_secs),
        }
    }

    /// Arguments placed before the conversion flags.
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Private LibreOffice profile for one invocation.
    ///
    /// soffice locks its user profile; two conversions sharing one fail or
    /// serialize, so each gets a profile next to its output directory.
    async fn profile_url(out_dir: &Path) -> Result<String, ServiceError> {
        let profile = out_dir.parent().unwrap_or(out_dir).join("lo-profile");
        tokio::fs::create_dir_all(&profile)
            .await
            .map_err(|e| ServiceError::io("Failed to create renderer profile", e))?;
        let profile = tokio::fs::canonicalize(&profile)
            .await
            .map_err(|e| ServiceError::io("Failed to resolve renderer profile", e))?;
        reqwest::Url::from_directory_path(&profile)
            .map(|u| u.to_string())
            .map_err(|_| {
                ServiceError::Internal(format!(
                    "Cannot express profile path '{}' as a file URL",
                    profile.display()
                ))
            })
    }
}

#[async_trait]
impl Renderer for SofficeRenderer {
    async fn render(&self, input: &Path, out_dir: &Path, format: &str) -> Result<(), ServiceError> {
        let profile_url = Self::profile_url(out_dir).await?;
        let program = self.program.display().to_string();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .arg("--headless")
            .arg(format!("-env:UserInstallation={}", profile_url))
            .arg("--convert-to")
            .arg(format)
            .arg("--outdir")
            .arg(out_dir)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        debug!("Running renderer: {:?}", cmd);
        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ServiceError::conversion_failed(format!("renderer '{}' not found", program))
            } else {
                ServiceError::conversion_failed(format!(
                    "failed to start renderer '{}': {}",
                    program, e
                ))
            }
        })?;

        // Declared before the wait so it also fires when this future is dropped.
        #[cfg(unix)]
        let _group = ProcessGroupGuard(child.id());

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ServiceError::io("Failed to wait for renderer", e)),
            Err(_) => {
                error!(
                    "Renderer '{}' exceeded {}s, killing it",
                    program,
                    self.timeout.as_secs()
                );
                return Err(ServiceError::conversion_failed(format!(
                    "renderer timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            let diagnostics = if stderr.trim().is_empty() { &stdout } else { &stderr };
            return Err(ServiceError::conversion_failed(format!(
                "'{}' exited with {}: {}",
                program,
                output.status,
                truncate_diagnostics(diagnostics.trim())
            )));
        }

        debug!("Renderer finished: {}", stdout.trim());
        Ok(())
    }
}

/// Kills the renderer's process group on drop.
///
/// The child is started as the leader of a new group, so this reaches the
/// helpers it forked as well as the child itself.
#[cfg(unix)]
struct ProcessGroupGuard(Option<u32>);

#[cfg(unix)]
impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let Some(pgid) = self.0 else {
            return;
        };
        match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
            Ok(()) => debug!("Killed leftover renderer processes in group {}", pgid),
            Err(Errno::ESRCH) => {}
            Err(e) => tracing::warn!("Failed to kill renderer process group {}: {}", pgid, e),
        }
    }
}

fn truncate_diagnostics(s: &str) -> &str {
    if s.len() <= MAX_DIAGNOSTIC_BYTES {
        return s;
    }
    let mut end = MAX_DIAGNOSTIC_BYTES;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Name the renderer is expected to produce for `input`.
pub fn derive_output_name(input: &Path) -> Result<String, ServiceError> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ServiceError::Internal(format!("Input '{}' has no file stem", input.display()))
        })?;
    Ok(format!("{}.{}", stem, TARGET_EXTENSION))
}

/// Convert a staged document and publish the PDF into the artifact directory.
///
/// The render permit is held for exactly as long as the renderer runs,
/// including when the caller drops this future part-way.
///
/// # Returns
/// Path of the published artifact, `<artifact_dir>/<stem>.pdf`.
///
/// # Errors
/// - `ConversionFailed` when the renderer fails or leaves no output file.
/// - `Internal` when the renderer panics.
pub async fn render_document(
    renderer: &dyn Renderer,
    permits: &Semaphore,
    input: &Path,
    workspace: &Workspace,
    artifacts: &ArtifactDirectory,
) -> Result<PathBuf, ServiceError> {
    let output_name = derive_output_name(input)?;
    let out_dir = workspace.scratch_dir("out").await?;

    let permit = permits
        .acquire()
        .await
        .map_err(|e| ServiceError::Internal(format!("Render pool closed: {}", e)))?;

    let started = Instant::now();
    let rendered = AssertUnwindSafe(renderer.render(input, &out_dir, TARGET_EXTENSION))
        .catch_unwind()
        .await;
    drop(permit);

    rendered
        .map_err(|_| ServiceError::Internal("Renderer panicked".to_string()))
        .and_then(|result| result)
        .inspect_err(|e| error!("Rendering {} failed: {}", input.display(), e))?;

    let produced = out_dir.join(&output_name);
    if !tokio::fs::try_exists(&produced).await.unwrap_or(false) {
        error!("Renderer reported success but {} is missing", produced.display());
        return Err(ServiceError::conversion_failed("output missing"));
    }

    info!(
        "Rendered {} in {}ms",
        output_name,
        started.elapsed().as_millis()
    );

    artifacts.publish_file(&produced, &output_name).await
}
