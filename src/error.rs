//! Error types for the xopp2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Xopp2PdfError`] — **Fatal**: the batch cannot run at all (the root
//!   directory is missing, the configuration is invalid). Returned as
//!   `Err(Xopp2PdfError)` from the top-level `convert*` functions.
//!
//! * [`DocumentError`] — **Non-fatal**: a single document failed (corrupt
//!   container, renderer exited non-zero) but every other document is fine.
//!   Stored inside [`crate::output::DocumentResult`] so one broken notebook
//!   never aborts the rest of the batch.
//!
//! "No reference in the document" and "no file with that name anywhere" are
//! not errors at all; they are [`crate::pipeline::repair::RepairOutcome`]
//! variants and the document is simply left as it is.

use std::path::PathBuf;
use thiserror::Error;
use xopp_container::ContainerError;

/// All fatal errors returned by the xopp2pdf library.
///
/// Document-level failures use [`DocumentError`] and are stored in
/// [`crate::output::DocumentResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Xopp2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The search root does not exist.
    #[error("Root directory not found: '{path}'\nCheck the path exists and is readable.")]
    RootNotFound { path: PathBuf },

    /// The search root exists but is a file.
    #[error("'{path}' is not a directory")]
    NotADirectory { path: PathBuf },

    // ── Batch errors ──────────────────────────────────────────────────────
    /// Some documents converted but at least one failed.
    ///
    /// Returned by [`crate::output::BatchOutput::into_result`] when the
    /// caller wants to treat any document failure as an error.
    #[error("{failed}/{total} documents failed during conversion")]
    PartialFailure {
        success: usize,
        failed: usize,
        total: usize,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single document.
///
/// Stored alongside [`crate::output::DocumentResult`] when a document fails.
/// The batch always continues with the next document.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum DocumentError {
    /// The document is not a gzip container, or its payload is not UTF-8 XML.
    #[error("'{path}' is not a valid .xopp container: {detail}")]
    MalformedContainer { path: PathBuf, detail: String },

    /// The document could not be read from disk.
    #[error("Failed to read '{path}': {detail}")]
    ReadFailed { path: PathBuf, detail: String },

    /// The repaired document could not be written back.
    #[error("Failed to write '{path}': {detail}")]
    WriteFailed { path: PathBuf, detail: String },

    /// The renderer executable could not be started at all.
    #[error("Could not start renderer '{program}': {detail}\nIs it installed and on PATH?")]
    RendererSpawnFailed { program: String, detail: String },

    /// The renderer ran and exited unsuccessfully.
    #[error("Renderer exited with {}\n{stderr}", exit_label(*status))]
    ConversionFailed { status: Option<i32>, stderr: String },

    /// The renderer did not finish within the configured timeout.
    #[error("Renderer timed out after {secs}s")]
    ConversionTimeout { secs: u64 },

    /// Unexpected internal failure (e.g. a blocking task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocumentError {
    /// Attach a document path to a container error.
    ///
    /// Content problems become [`DocumentError::MalformedContainer`]; anything
    /// the filesystem refused becomes a read or write failure depending on
    /// which side of the rewrite it happened.
    pub fn from_container(path: &std::path::Path, err: ContainerError, writing: bool) -> Self {
        let detail = err.to_string();
        if err.is_malformed() {
            DocumentError::MalformedContainer {
                path: path.to_path_buf(),
                detail,
            }
        } else if writing {
            DocumentError::WriteFailed {
                path: path.to_path_buf(),
                detail,
            }
        } else {
            DocumentError::ReadFailed {
                path: path.to_path_buf(),
                detail,
            }
        }
    }
}

fn exit_label(status: Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}
