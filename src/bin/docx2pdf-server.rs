//! Server binary for edgequake-docx2pdf.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `ServiceConfig` and serves the router.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docx2pdf::{router, Converter, ServiceConfig};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on the default port, artifacts in ./files
  docx2pdf-server

  # Custom artifact directory and encryption service
  docx2pdf-server --artifact-dir /srv/pdfs --encryption-url http://encryptor:8001/encrypt

  # Convert a document
  curl -F file=@report.docx http://localhost:8000/convert -o report.pdf

  # Convert and encrypt
  curl -F file=@report.docx -F encryption=true -F password=s3cret \
       -D - http://localhost:8000/convert -o report.pdf

  # List produced PDFs
  curl http://localhost:8000/list-pdfs

RESPONSE HEADERS (when encryption=true):
  X-Encryption-Status            applied | skipped
  X-Encryption-Fallback-Reason   unreachable | timeout | service_error |
                                 empty_response | io_error   (skipped only)

SETUP:
  LibreOffice must be installed; `soffice` is looked up on PATH unless
  --soffice / DOCX2PDF_SOFFICE points at it.
"#;

/// Convert DOCX uploads to PDF over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "docx2pdf-server",
    version,
    about = "HTTP service converting DOCX uploads to PDF via LibreOffice",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "DOCX2PDF_BIND", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Directory where converted PDFs are stored and served from.
    #[arg(long, env = "DOCX2PDF_ARTIFACT_DIR", default_value = "./files")]
    artifact_dir: PathBuf,

    /// Encryption service endpoint (multipart password + file).
    #[arg(
        long,
        env = "DOCX2PDF_ENCRYPTION_URL",
        default_value = "http://127.0.0.1:8001/encrypt"
    )]
    encryption_url: String,

    /// Parent directory for per-request workspaces (default: system temp dir).
    #[arg(long, env = "DOCX2PDF_WORKSPACE_ROOT")]
    workspace_root: Option<PathBuf>,

    /// LibreOffice executable.
    #[arg(long, env = "DOCX2PDF_SOFFICE", default_value = "soffice")]
    soffice: PathBuf,

    /// Per-document conversion timeout in seconds.
    #[arg(long, env = "DOCX2PDF_RENDER_TIMEOUT", default_value_t = 120)]
    render_timeout: u64,

    /// Encryption service timeout in seconds.
    #[arg(long, env = "DOCX2PDF_ENCRYPTION_TIMEOUT", default_value_t = 30)]
    encryption_timeout: u64,

    /// Conversions allowed to run at once (default: CPU count).
    #[arg(long, env = "DOCX2PDF_MAX_CONCURRENT_RENDERS")]
    max_concurrent_renders: Option<usize>,

    /// Largest accepted upload in MiB.
    #[arg(long, env = "DOCX2PDF_MAX_UPLOAD_MB", default_value_t = 50)]
    max_upload_mb: usize,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCX2PDF_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let config = build_config(&cli)?;
    info!("Starting with {:?}", config);

    let converter = Arc::new(Converter::new(config).context("Failed to initialise converter")?);
    converter
        .artifacts()
        .ensure_exists()
        .await
        .context("Failed to prepare artifact directory")?;

    // ── Serve ────────────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;
    info!("Listening on http://{}", cli.bind);

    axum::serve(listener, router(converter))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shut down");
    Ok(())
}

/// Map CLI args to `ServiceConfig`.
fn build_config(cli: &Cli) -> Result<ServiceConfig> {
    let mut builder = ServiceConfig::builder()
        .artifact_dir(&cli.artifact_dir)
        .encryption_url(&cli.encryption_url)
        .soffice_path(&cli.soffice)
        .render_timeout_secs(cli.render_timeout)
        .encryption_timeout_secs(cli.encryption_timeout)
        .max_upload_bytes(cli.max_upload_mb.saturating_mul(1024 * 1024));

    if let Some(ref root) = cli.workspace_root {
        builder = builder.workspace_root(root);
    }
    if let Some(n) = cli.max_concurrent_renders {
        builder = builder.max_concurrent_renders(n);
    }

    builder.build().context("Invalid configuration")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
