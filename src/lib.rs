//! # edgequake-docx2pdf
//!
//! An HTTP service that converts `.docx` uploads to PDF with LibreOffice and
//! optionally password-protects the result through a separate encryption
//! service.
//!
//! Rendering and encryption both happen outside this crate: `soffice` is
//! driven as a child process and the encryption service is called over HTTP.
//! This crate owns everything around them: upload validation, per-request
//! scratch space, failure mapping, the artifact directory and the listing.
//!
//! ## Request Flow
//!
//! ```text
//! POST /convert
//!  │
//!  ├─ 1. Validate  extension, filename, password (no disk writes yet)
//!  ├─ 2. Stage     write upload into a private workspace
//!  ├─ 3. Render    soffice child process (bounded, killable) → artifact directory
//!  ├─ 4. Encrypt   optional; on failure fall back to the plain PDF
//!  └─ 5. Cleanup   workspace removed on every path
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docx2pdf::{router, Converter, ServiceConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder()
//!         .artifact_dir("./files")
//!         .encryption_url("http://127.0.0.1:8001/encrypt")
//!         .build()?;
//!     let converter = Arc::new(Converter::new(config)?);
//!     converter.artifacts().ensure_exists().await?;
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//!     axum::serve(listener, router(converter)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docx2pdf-server` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifacts;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifacts::ArtifactDirectory;
pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use convert::Converter;
pub use error::{EncryptionError, ServiceError};
pub use output::{ArtifactEntry, ArtifactListing, ConvertedDocument, EncryptionStatus};
pub use pipeline::render::{Renderer, SofficeRenderer};
pub use pipeline::upload::{ConvertOptions, Upload};
pub use server::router;
