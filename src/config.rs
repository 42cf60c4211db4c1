//! Service configuration.
//!
//! Everything the service reads from its environment lands in a single
//! [`ServiceConfig`], built once at startup via [`ServiceConfigBuilder`] and
//! handed to [`crate::convert::Converter::new`]. Components receive what they
//! need from it; nothing reads ambient global state afterwards.

use crate::error::ServiceError;
use crate::pipeline::render::Renderer;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Extension accepted for uploads (compared case-sensitively).
pub const SOURCE_EXTENSION: &str = "docx";

/// Extension of every artifact the service produces.
pub const TARGET_EXTENSION: &str = "pdf";

/// Prefix prepended to the converted artifact name for its encrypted copy.
pub const ENCRYPTED_PREFIX: &str = "encrypted_";

/// Configuration for the conversion service.
///
/// Built via [`ServiceConfig::builder()`] or using
/// [`ServiceConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_docx2pdf::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .artifact_dir("/var/lib/docx2pdf/files")
///     .encryption_url("http://encryptor:8001/encrypt")
///     .render_timeout_secs(60)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Directory where converted and encrypted PDFs are written and served
    /// from. Default: `./files`.
    pub artifact_dir: PathBuf,

    /// URL path prefix under which artifacts are served. Default: `/files`.
    pub public_prefix: String,

    /// Parent directory for per-request workspaces. If None, uses the system
    /// temp directory.
    pub workspace_root: Option<PathBuf>,

    /// Endpoint of the encryption service (multipart `password` + `file`).
    /// Default: `http://127.0.0.1:8001/encrypt`.
    pub encryption_url: String,

    /// Timeout for the whole encryption call in seconds. Default: 30.
    pub encryption_timeout_secs: u64,

    /// LibreOffice executable. Default: `soffice` (resolved through `PATH`).
    pub soffice_path: PathBuf,

    /// Arguments inserted before the conversion flags on every invocation.
    pub soffice_args: Vec<String>,

    /// Pre-constructed renderer. Takes precedence over `soffice_path`.
    pub renderer: Option<Arc<dyn Renderer>>,

    /// Upper bound on one renderer invocation in seconds. Default: 120.
    pub render_timeout_secs: u64,

    /// Number of conversions allowed to run at once. Default: available
    /// parallelism.
    pub max_concurrent_renders: usize,

    /// Largest accepted request body in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("./files"),
            public_prefix: "/files".to_string(),
            workspace_root: None,
            encryption_url: "http://127.0.0.1:8001/encrypt".to_string(),
            encryption_timeout_secs: 30,
            soffice_path: PathBuf::from("soffice"),
            soffice_args: Vec::new(),
            renderer: None,
            render_timeout_secs: 120,
            max_concurrent_renders: default_render_concurrency(),
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("artifact_dir", &self.artifact_dir)
            .field("public_prefix", &self.public_prefix)
            .field("workspace_root", &self.workspace_root)
            .field("encryption_url", &self.encryption_url)
            .field("encryption_timeout_secs", &self.encryption_timeout_secs)
            .field("soffice_path", &self.soffice_path)
            .field("soffice_args", &self.soffice_args)
            .field("renderer", &self.renderer.as_ref().map(|_| "<dyn Renderer>"))
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("max_concurrent_renders", &self.max_concurrent_renders)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// Workspace parent directory, falling back to the system temp dir.
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

fn default_render_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.artifact_dir = dir.into();
        self
    }

    pub fn public_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.config.public_prefix = prefix.trim_end_matches('/').to_string();
        self
    }

    pub fn workspace_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = Some(dir.into());
        self
    }

    pub fn encryption_url(mut self, url: impl Into<String>) -> Self {
        self.config.encryption_url = url.into();
        self
    }

    pub fn encryption_timeout_secs(mut self, secs: u64) -> Self {
        self.config.encryption_timeout_secs = secs.max(1);
        self
    }

    pub fn soffice_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.soffice_path = path.into();
        self
    }

    pub fn soffice_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.soffice_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.config.renderer = Some(renderer);
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs.max(1);
        self
    }

    pub fn max_concurrent_renders(mut self, n: usize) -> Self {
        self.config.max_concurrent_renders = n.max(1);
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ServiceError> {
        let c = &self.config;
        match reqwest::Url::parse(&c.encryption_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ServiceError::InvalidConfig(format!(
                    "Encryption URL must be http or https, got scheme '{}'",
                    url.scheme()
                )))
            }
            Err(e) => {
                return Err(ServiceError::InvalidConfig(format!(
                    "Invalid encryption URL '{}': {}",
                    c.encryption_url, e
                )))
            }
        }
        if !c.public_prefix.starts_with('/') || c.public_prefix.len() < 2 {
            return Err(ServiceError::InvalidConfig(format!(
                "Public prefix must be a non-root absolute path, got '{}'",
                c.public_prefix
            )));
        }
        if c.max_upload_bytes == 0 {
            return Err(ServiceError::InvalidConfig(
                "Upload limit must be ≥ 1 byte".into(),
            ));
        }
        if c.renderer.is_none() && c.soffice_path.as_os_str().is_empty() {
            return Err(ServiceError::InvalidConfig(
                "soffice path must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build() {
        let config = ServiceConfig::builder().build().unwrap();
        assert_eq!(config.artifact_dir, PathBuf::from("./files"));
        assert_eq!(config.public_prefix, "/files");
        assert_eq!(config.render_timeout_secs, 120);
        assert!(config.max_concurrent_renders >= 1);
        assert!(config.renderer.is_none());
    }

    #[test]
    fn setters_clamp() {
        let config = ServiceConfig::builder()
            .max_concurrent_renders(0)
            .render_timeout_secs(0)
            .encryption_timeout_secs(0)
            .build()
            .unwrap();
        assert_eq!(config.max_concurrent_renders, 1);
        assert_eq!(config.render_timeout_secs, 1);
        assert_eq!(config.encryption_timeout_secs, 1);
    }

    #[test]
    fn trailing_slash_stripped_from_prefix() {
        let config = ServiceConfig::builder()
            .public_prefix("/artifacts/")
            .build()
            .unwrap();
        assert_eq!(config.public_prefix, "/artifacts");
    }

    #[test]
    fn rejects_bad_encryption_url() {
        let err = ServiceConfig::builder()
            .encryption_url("not a url")
            .build()
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidConfig(_)));

        let err = ServiceConfig::builder()
            .encryption_url("ftp://example.com/encrypt")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("ftp"));
    }

    #[test]
    fn rejects_root_prefix() {
        let err = ServiceConfig::builder().public_prefix("/").build().unwrap_err();
        assert!(matches!(err, ServiceError::InvalidConfig(_)));
    }

    #[test]
    fn workspace_root_falls_back_to_temp_dir() {
        let config = ServiceConfig::default();
        assert_eq!(config.workspace_root(), std::env::temp_dir());

        let config = ServiceConfig::builder()
            .workspace_root("/srv/scratch")
            .build()
            .unwrap();
        assert_eq!(config.workspace_root(), PathBuf::from("/srv/scratch"));
    }
}
