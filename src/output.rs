//! Result types returned by the batch drivers.
//!
//! Everything here is `Serialize` so the CLI can emit a machine-readable
//! report with `--json`.

use crate::error::{DocumentError, Xopp2PdfError};
use crate::pipeline::repair::RepairOutcome;
use serde::Serialize;
use std::path::PathBuf;

/// What happened to one document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentResult {
    /// 1-based position in the batch.
    pub index: usize,
    /// The document as discovered.
    pub document: PathBuf,
    /// Relink decision. `None` when repair was skipped or failed.
    pub repair: Option<RepairOutcome>,
    /// Exported file. `None` on failure and in dry-run mode.
    pub output: Option<PathBuf>,
    /// Time spent on this document, repair and render together.
    pub duration_ms: u64,
    /// Set when the document failed at any stage.
    pub error: Option<DocumentError>,
}

impl DocumentResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate counters for a batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchStats {
    /// Documents found under the root.
    pub total_documents: usize,
    /// Documents that went through without error.
    pub succeeded: usize,
    /// Documents with an error.
    pub failed: usize,
    /// Documents whose reference was rewritten on disk.
    pub relinked: usize,
    /// Documents exported by the renderer.
    pub converted: usize,
    /// Files in the candidate index.
    pub indexed_files: usize,
    pub total_duration_ms: u64,
}

impl BatchStats {
    /// Fold one document result into the counters.
    pub fn record(&mut self, result: &DocumentResult) {
        if result.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        if result.repair.as_ref().is_some_and(RepairOutcome::rewritten) {
            self.relinked += 1;
        }
        if result.output.is_some() {
            self.converted += 1;
        }
    }
}

/// Everything a batch produced.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutput {
    /// Per-document results, in processing order.
    pub documents: Vec<DocumentResult>,
    pub stats: BatchStats,
}

impl BatchOutput {
    /// Documents that failed.
    pub fn failures(&self) -> impl Iterator<Item = &DocumentResult> {
        self.documents.iter().filter(|d| !d.is_success())
    }

    /// Turn any document failure into [`Xopp2PdfError::PartialFailure`].
    pub fn into_result(self) -> Result<Self, Xopp2PdfError> {
        if self.stats.failed > 0 {
            return Err(Xopp2PdfError::PartialFailure {
                success: self.stats.succeeded,
                failed: self.stats.failed,
                total: self.stats.total_documents,
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(index: usize, repair: Option<RepairOutcome>, error: Option<DocumentError>) -> DocumentResult {
        let output = error
            .is_none()
            .then(|| PathBuf::from(format!("output/{index}.xopp.pdf")));
        DocumentResult {
            index,
            document: PathBuf::from(format!("{index}.xopp")),
            repair,
            output,
            duration_ms: 5,
            error,
        }
    }

    fn batch(documents: Vec<DocumentResult>) -> BatchOutput {
        let mut stats = BatchStats {
            total_documents: documents.len(),
            ..Default::default()
        };
        for d in &documents {
            stats.record(d);
        }
        BatchOutput { documents, stats }
    }

    #[test]
    fn stats_count_relinks_and_failures() {
        let out = batch(vec![
            result(
                1,
                Some(RepairOutcome::Rewritten {
                    from: "/old/a.pdf".into(),
                    to: "/new/a.pdf".into(),
                    score: 0,
                }),
                None,
            ),
            result(2, Some(RepairOutcome::NoReference), None),
            result(
                3,
                None,
                Some(DocumentError::ConversionTimeout { secs: 1 }),
            ),
        ]);
        assert_eq!(out.stats.succeeded, 2);
        assert_eq!(out.stats.failed, 1);
        assert_eq!(out.stats.relinked, 1);
        assert_eq!(out.stats.converted, 2);
        assert_eq!(out.failures().count(), 1);
    }

    #[test]
    fn into_result_reports_partial_failure() {
        let out = batch(vec![
            result(1, None, None),
            result(2, None, Some(DocumentError::Internal("boom".into()))),
        ]);
        match out.into_result() {
            Err(Xopp2PdfError::PartialFailure {
                success,
                failed,
                total,
            }) => assert_eq!((success, failed, total), (1, 1, 2)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn clean_batch_is_ok() {
        assert!(batch(vec![result(1, None, None)]).into_result().is_ok());
        assert!(batch(Vec::new()).into_result().is_ok());
    }

    #[test]
    fn serialises_to_json() {
        let out = batch(vec![result(1, Some(RepairOutcome::NoReference), None)]);
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["stats"]["total_documents"], 1);
        assert_eq!(json["documents"][0]["repair"]["kind"], "no_reference");
    }
}
