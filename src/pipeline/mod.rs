//! Pipeline stages for DOCX-to-PDF conversion.
//!
//! Each submodule implements exactly one step of a request.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ workspace ──▶ render ──▶ encrypt (optional)
//! (validate)  (stage)      (soffice)  (remote service)
//! ```
//!
//! 1. [`upload`]: validate the declared filename and sanitize it
//! 2. [`workspace`]: per-request scratch directory, removed on every exit path
//! 3. [`render`]: run the external renderer as a bounded child process and
//!    publish the PDF into the artifact directory
//! 4. [`encrypt`]: the only stage with network I/O; failures are recoverable

pub mod encrypt;
pub mod render;
pub mod upload;
pub mod workspace;
