//! # xopp2pdf
//!
//! Relink Xournal++ notebooks to their moved PDF backgrounds, then export
//! them to PDF.
//!
//! ## Why this crate?
//!
//! A Xournal++ notebook (`.xopp`) annotating a PDF stores that PDF's
//! absolute path. Move the folder, sync it to another machine or rename a
//! parent directory, and every notebook opens blank. The PDF is usually
//! still there, just somewhere else under the same tree, sometimes in
//! several copies. This crate finds the copy that best matches the stale
//! path, rewrites the reference in place and exports every notebook to PDF
//! through the `xournalpp` command line.
//!
//! ## Pipeline Overview
//!
//! ```text
//! root/
//!  │
//!  ├─ 1. Discover  walk for *.xopp (autosaves skipped), index every file once
//!  ├─ 2. Extract   first filename="…/name.pdf" in the decompressed XML
//!  ├─ 3. Match     same-name files, longest trailing run of parent folders
//!  ├─ 4. Repair    rewrite + recompress atomically (spawn_blocking)
//!  ├─ 5. Render    xournalpp -p <out> <in>, with timeout, atomic publish
//!  └─ 6. Output    per-document results + batch stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use xopp2pdf::{convert_batch, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .root("lectures")
//!         .output_dir("lectures-pdf")
//!         .build()?;
//!     let output = convert_batch(&config).await?;
//!     eprintln!(
//!         "{} exported, {} relinked, {} failed",
//!         output.stats.converted, output.stats.relinked, output.stats.failed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `xopp2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! xopp2pdf = { version = "0.1", default-features = false }
//! ```
//!
//! ## Known limitation
//!
//! Only the first `filename="…"` reference of a document is repaired.
//! Xournal++ writes the background path once and has later pages clone it,
//! so this covers documents annotating a single PDF.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{convert_batch, convert_batch_sync, convert_document, plan_batch, BatchPlan};
pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use error::{DocumentError, Xopp2PdfError};
pub use output::{BatchOutput, BatchStats, DocumentResult};
pub use pipeline::discover::{find_documents, search_by_name, DocumentWalker, FileIndex};
pub use pipeline::matcher::{find_best_match, Candidate, FileReference, MatchScore};
pub use pipeline::repair::{repair_document, RepairMode, RepairOutcome};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, DocumentStream};
