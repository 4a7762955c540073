//! Eager batch driver: relink and convert every document under a root.
//!
//! Documents are handled strictly one after another. Each goes through
//!
//! ```text
//! repair (spawn_blocking) ──▶ render (subprocess, with timeout)
//! ```
//!
//! and has its own failure boundary: whatever goes wrong is recorded in its
//! [`DocumentResult`] and the batch moves on. Only problems that make the
//! whole run meaningless (missing root, bad configuration) are returned as
//! `Err`. Use [`crate::stream::convert_stream`] to receive results as they
//! complete instead of all at the end.

use crate::config::ConversionConfig;
use crate::error::{DocumentError, Xopp2PdfError};
use crate::output::{BatchOutput, BatchStats, DocumentResult};
use crate::pipeline::discover::{find_documents, FileIndex};
use crate::pipeline::reference::ReferencePattern;
use crate::pipeline::render::{output_path_for, render_document};
use crate::pipeline::repair::{repair_document, RepairMode, RepairOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything discovered up front, shared by every document of a run.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    /// Documents to process, in walk order.
    pub documents: Vec<PathBuf>,
    /// Snapshot of candidate files, taken once.
    pub index: Arc<FileIndex>,
    /// Reference matcher for the configured extension.
    pub pattern: Arc<ReferencePattern>,
}

impl BatchPlan {
    pub fn total(&self) -> usize {
        self.documents.len()
    }
}

/// Validate the root, enumerate documents and index candidate files.
pub async fn plan_batch(config: &ConversionConfig) -> Result<BatchPlan, Xopp2PdfError> {
    let root = config.root.clone();

    // ── Step 1: Validate root ────────────────────────────────────────────
    match tokio::fs::metadata(&root).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(Xopp2PdfError::NotADirectory { path: root }),
        Err(_) => return Err(Xopp2PdfError::RootNotFound { path: root }),
    }

    let pattern = ReferencePattern::new(&config.reference_extension).map_err(|e| {
        Xopp2PdfError::InvalidConfig(format!(
            "Cannot match '.{}' references: {e}",
            config.reference_extension
        ))
    })?;

    // ── Step 2: Walk the tree (blocking) ─────────────────────────────────
    let cfg = config.clone();
    let (documents, index) = tokio::task::spawn_blocking(move || {
        let documents = find_documents(&cfg.root, &cfg);
        let index = FileIndex::build(&cfg.root, Some(cfg.output_dir.as_path()));
        (documents, index)
    })
    .await
    .map_err(|e| Xopp2PdfError::Internal(format!("Discovery task panicked: {}", e)))?;

    let index = index.map_err(|e| {
        Xopp2PdfError::Internal(format!("Cannot resolve '{}': {}", config.root.display(), e))
    })?;

    info!(
        "Found {} documents, indexed {} files under {}",
        documents.len(),
        index.len(),
        config.root.display()
    );
    if index.is_empty() && !config.skip_repair {
        warn!(
            "No files under {}: nothing can be relinked",
            config.root.display()
        );
    }

    Ok(BatchPlan {
        documents,
        index: Arc::new(index),
        pattern: Arc::new(pattern),
    })
}

/// Relink and convert every document under `config.root`.
///
/// # Returns
/// `Ok(BatchOutput)` once every document has been attempted, even if some
/// failed (check `output.stats.failed`, or call
/// [`BatchOutput::into_result`]).
///
/// # Errors
/// Only fatal errors: the root is missing or not a directory, or the
/// reference pattern cannot be built.
pub async fn convert_batch(config: &ConversionConfig) -> Result<BatchOutput, Xopp2PdfError> {
    let total_start = Instant::now();
    info!("Starting batch under {}", config.root.display());

    let plan = plan_batch(config).await?;
    let total = plan.total();

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let mut stats = BatchStats {
        total_documents: total,
        indexed_files: plan.index.len(),
        ..Default::default()
    };
    let mut documents = Vec::with_capacity(total);

    for (i, document) in plan.documents.iter().enumerate() {
        let result = convert_document(document, i + 1, total, &plan, config).await;
        stats.record(&result);
        documents.push(result);
    }

    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Batch complete: {}/{} documents ok, {} relinked, {}ms total",
        stats.succeeded, total, stats.relinked, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, stats.succeeded);
    }

    Ok(BatchOutput { documents, stats })
}

/// Repair then render a single document.
///
/// `position` is 1-based and only used for progress events and the result.
/// Never fails: errors are stored in the returned [`DocumentResult`].
pub async fn convert_document(
    document: &Path,
    position: usize,
    total: usize,
    plan: &BatchPlan,
    config: &ConversionConfig,
) -> DocumentResult {
    let start = Instant::now();
    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_document_start(position, total, document);
    }
    debug!("[{}/{}] {}", position, total, document.display());

    let mut result = DocumentResult {
        index: position,
        document: document.to_path_buf(),
        repair: None,
        output: None,
        duration_ms: 0,
        error: None,
    };

    let outcome = run_document(document, plan, config, &mut result).await;
    result.duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(()) => {
            if let (Some(cb), Some(output)) = (cb, result.output.as_deref()) {
                cb.on_document_complete(position, total, output);
            }
        }
        Err(e) => {
            warn!("{}: {}", document.display(), e);
            if let Some(cb) = cb {
                cb.on_document_error(position, total, &e.to_string());
            }
            result.error = Some(e);
        }
    }

    result
}

async fn run_document(
    document: &Path,
    plan: &BatchPlan,
    config: &ConversionConfig,
    result: &mut DocumentResult,
) -> Result<(), DocumentError> {
    // ── Step 1: Relink ───────────────────────────────────────────────────
    if !config.skip_repair {
        let outcome = repair_blocking(document, plan, config.dry_run).await?;
        if let Some(ref cb) = config.progress_callback {
            cb.on_document_repaired(result.index, plan.total(), &outcome);
        }
        result.repair = Some(outcome);
    }

    if config.dry_run {
        return Ok(());
    }

    // ── Step 2: Render ───────────────────────────────────────────────────
    let output = output_path_for(
        document,
        &config.root,
        &config.output_dir,
        &config.output_extension,
    );
    let rendered = render_document(document, &output, config).await?;
    result.output = Some(rendered.output);
    Ok(())
}

async fn repair_blocking(
    document: &Path,
    plan: &BatchPlan,
    dry_run: bool,
) -> Result<RepairOutcome, DocumentError> {
    let path = document.to_path_buf();
    let index = Arc::clone(&plan.index);
    let pattern = Arc::clone(&plan.pattern);
    let mode = if dry_run {
        RepairMode::DryRun
    } else {
        RepairMode::Apply
    };

    tokio::task::spawn_blocking(move || repair_document(&path, &index, &pattern, mode))
        .await
        .map_err(|e| DocumentError::Internal(format!("Repair task panicked: {}", e)))?
}

/// Synchronous wrapper around [`convert_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_batch_sync(config: &ConversionConfig) -> Result<BatchOutput, Xopp2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Xopp2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_batch(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_root_is_fatal() {
        let dir = tempdir().unwrap();
        let config = ConversionConfig::builder()
            .root(dir.path().join("nope"))
            .build()
            .unwrap();
        let err = convert_batch(&config).await.unwrap_err();
        assert!(matches!(err, Xopp2PdfError::RootNotFound { .. }));
    }

    #[tokio::test]
    async fn file_root_is_fatal() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.xopp");
        fs::write(&file, b"x").unwrap();
        let config = ConversionConfig::builder().root(&file).build().unwrap();
        let err = convert_batch(&config).await.unwrap_err();
        assert!(matches!(err, Xopp2PdfError::NotADirectory { .. }));
    }

    #[tokio::test]
    async fn empty_root_yields_empty_batch() {
        let dir = tempdir().unwrap();
        let config = ConversionConfig::builder()
            .root(dir.path())
            .output_dir(dir.path().join("output"))
            .build()
            .unwrap();
        let plan = plan_batch(&config).await.unwrap();
        assert!(plan.index.is_empty());
        assert_eq!(plan.total(), 0);

        let out = convert_batch(&config).await.unwrap();
        assert!(out.documents.is_empty());
        assert_eq!(out.stats.total_documents, 0);
        assert_eq!(out.stats.indexed_files, 0);
        assert!(out.into_result().is_ok());
    }

    #[tokio::test]
    async fn plan_indexes_everything_but_the_output_dir() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("output/old")).unwrap();
        fs::write(root.join("output/old/a.pdf"), b"%PDF").unwrap();
        fs::write(root.join("a.pdf"), b"%PDF").unwrap();
        fs::write(root.join("a.xopp"), b"x").unwrap();

        let config = ConversionConfig::builder()
            .root(root)
            .output_dir(root.join("output"))
            .build()
            .unwrap();
        let plan = plan_batch(&config).await.unwrap();
        assert!(!plan.index.is_empty());
        assert_eq!(plan.index.len(), 2);
        assert_eq!(plan.documents, vec![root.join("a.xopp")]);
    }

    #[tokio::test]
    async fn dry_run_never_renders() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("notes")).unwrap();
        fs::write(root.join("notes/l.pdf"), b"%PDF").unwrap();
        let doc = root.join("l.xopp");
        let text = r#"<xournal><background type="pdf" filename="/old/notes/l.pdf"/></xournal>"#;
        fs::write(&doc, xopp_container::encode(text).unwrap()).unwrap();
        let before = fs::read(&doc).unwrap();

        let config = ConversionConfig::builder()
            .root(root)
            .output_dir(root.join("output"))
            .renderer("xopp2pdf-no-such-renderer")
            .dry_run(true)
            .build()
            .unwrap();
        let out = convert_batch(&config).await.unwrap();

        assert_eq!(out.stats.failed, 0);
        let doc_result = &out.documents[0];
        assert!(matches!(
            doc_result.repair,
            Some(RepairOutcome::WouldRewrite { .. })
        ));
        assert!(doc_result.output.is_none());
        assert_eq!(fs::read(&doc).unwrap(), before);
        assert!(!root.join("output").exists());
    }

    #[test]
    fn sync_wrapper_runs_outside_a_runtime() {
        let dir = tempdir().unwrap();
        let config = ConversionConfig::builder()
            .root(dir.path())
            .output_dir(dir.path().join("output"))
            .build()
            .unwrap();
        let out = convert_batch_sync(&config).unwrap();
        assert_eq!(out.stats.total_documents, 0);
    }
}
