//! # xopp-container
//!
//! Read and rewrite Xournal++ documents (`.xopp`): a UTF-8 XML body wrapped
//! in a single gzip stream.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use xopp_container::{read_document, write_document};
//!
//! let path = Path::new("lecture.xopp");
//! let xml = read_document(path).expect("readable document");
//! let patched = xml.replace("/old/slides.pdf", "/new/slides.pdf");
//! write_document(path, &patched).expect("atomic rewrite");
//! ```
//!
//! ## Guarantees
//!
//! - [`decode`] and [`encode`] round-trip text exactly.
//! - [`write_document`] never leaves a half-written document behind: the
//!   compressed bytes go to a temporary file in the same directory, which is
//!   then renamed over the original. The original file's permissions are
//!   carried over to the replacement.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use thiserror::Error;

/// The two magic bytes that open every gzip member (RFC 1952 §2.3.1).
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by container operations.
#[derive(Error, Debug)]
pub enum ContainerError {
    /// The file could not be read, or its replacement could not be written.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bytes do not start with the gzip magic number.
    #[error("Not a gzip container (first bytes: {magic:02x?})")]
    NotGzip { magic: Vec<u8> },

    /// The gzip stream is truncated or otherwise corrupt.
    #[error("Corrupt gzip stream: {0}")]
    Corrupt(#[source] std::io::Error),

    /// The decompressed payload is not UTF-8 text.
    #[error("Decompressed content is not valid UTF-8: {0}")]
    NotUtf8(#[source] std::string::FromUtf8Error),

    /// gzip compression of the new content failed.
    #[error("Failed to compress document: {0}")]
    Compress(#[source] std::io::Error),
}

impl ContainerError {
    /// `true` when the content itself is bad, as opposed to the filesystem
    /// refusing a read or write.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            ContainerError::NotGzip { .. } | ContainerError::Corrupt(_) | ContainerError::NotUtf8(_)
        )
    }
}

// ── In-memory codec ──────────────────────────────────────────────────────────

/// Decompress a gzip container into its text body.
pub fn decode(bytes: &[u8]) -> Result<String, ContainerError> {
    if bytes.len() < GZIP_MAGIC.len() || bytes[..2] != GZIP_MAGIC {
        return Err(ContainerError::NotGzip {
            magic: bytes.iter().take(4).copied().collect(),
        });
    }

    let mut raw = Vec::with_capacity(bytes.len() * 4);
    GzDecoder::new(bytes)
        .read_to_end(&mut raw)
        .map_err(ContainerError::Corrupt)?;

    String::from_utf8(raw).map_err(ContainerError::NotUtf8)
}

/// Compress a text body into a gzip container.
pub fn encode(text: &str) -> Result<Vec<u8>, ContainerError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(text.len() / 4), Compression::default());
    encoder
        .write_all(text.as_bytes())
        .map_err(ContainerError::Compress)?;
    encoder.finish().map_err(ContainerError::Compress)
}

// ── File helpers ─────────────────────────────────────────────────────────────

/// Read a document from disk and return its decompressed text.
pub fn read_document(path: &Path) -> Result<String, ContainerError> {
    let bytes = fs::read(path).map_err(|e| io_error(path, e))?;
    decode(&bytes)
}

/// Compress `text` and atomically replace the document at `path`.
pub fn write_document(path: &Path, text: &str) -> Result<(), ContainerError> {
    let bytes = encode(text)?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".xopp-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| io_error(path, e))?;

    tmp.write_all(&bytes).map_err(|e| io_error(path, e))?;
    tmp.as_file().sync_all().map_err(|e| io_error(path, e))?;

    if let Ok(meta) = fs::metadata(path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(|e| io_error(path, e))?;
    }

    tmp.persist(path).map_err(|e| io_error(path, e.error))?;
    Ok(())
}

fn io_error(path: &Path, source: std::io::Error) -> ContainerError {
    ContainerError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
