//! Upload validation: decide whether a declared filename may be converted
//! and derive the name it is staged under.
//!
//! Validation runs before any workspace is created, so a rejected upload
//! leaves no trace on disk.

use crate::config::SOURCE_EXTENSION;
use crate::error::ServiceError;
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.\-]").unwrap());

/// An uploaded document, owned by the request that received it.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Filename as declared by the client.
    pub filename: String,
    /// Raw document bytes.
    pub bytes: Bytes,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Per-request conversion options taken from the form fields.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Forward the PDF to the encryption service.
    pub encrypt: bool,
    /// Password for the encryption service; required when `encrypt` is set.
    pub password: Option<String>,
}

impl ConvertOptions {
    /// Return the password to encrypt with, or `None` when encryption is
    /// off. Fails when encryption is requested without a password or with an
    /// empty one; whitespace is passed through untouched.
    pub fn encryption_password(&self) -> Result<Option<&str>, ServiceError> {
        if !self.encrypt {
            return Ok(None);
        }
        match self.password.as_deref() {
            Some(p) if !p.is_empty() => Ok(Some(p)),
            _ => Err(ServiceError::invalid_input(
                "Password is required when encryption is enabled.",
            )),
        }
    }
}

/// Check that `name` carries the accepted source extension (case-sensitive).
pub fn has_source_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| ext == SOURCE_EXTENSION)
        .unwrap_or(false)
}

/// Reduce a client-supplied filename to a safe single path component.
///
/// The name is NFKD-decomposed and reduced to ASCII, so accented letters
/// keep their base letter. Path separators become whitespace, whitespace runs
/// become `_`, anything outside `[A-Za-z0-9_.-]` is dropped, and leading or
/// trailing `.`/`_` are stripped. The result may be empty.
pub fn sanitize_filename(name: &str) -> String {
    let ascii: String = name.nfkd().filter(char::is_ascii).collect();
    let separated = ascii.replace(['/', '\\'], " ");
    let joined = separated.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned = UNSAFE_CHARS.replace_all(&joined, "");
    cleaned.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Validate a declared filename and return the sanitized staging name.
pub fn validate_filename(name: &str) -> Result<String, ServiceError> {
    if !has_source_extension(name) {
        return Err(ServiceError::invalid_input(format!(
            "Invalid file format. Only .{} files are allowed.",
            SOURCE_EXTENSION
        )));
    }

    let sanitized = sanitize_filename(name);
    let stem_ok = sanitized
        .rsplit_once('.')
        .map(|(stem, _)| !stem.is_empty())
        .unwrap_or(false);
    if !has_source_extension(&sanitized) || !stem_ok {
        return Err(ServiceError::invalid_input(format!(
            "Invalid file name '{}'.",
            name
        )));
    }

    debug!("Upload '{}' staged as '{}'", name, sanitized);
    Ok(sanitized)
}

/// Parse a boolean form field (`true/false`, `1/0`, `yes/no`, `on/off`).
pub fn parse_flag(field: &str, value: &str) -> Result<bool, ServiceError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(ServiceError::invalid_input(format!(
            "Invalid value '{}' for field '{}': expected true or false.",
            other, field
        ))),
    }
}
