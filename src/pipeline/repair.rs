//! Relink the background reference of one document.
//!
//! Read → find the first reference → look up same-name files → pick the best
//! match → rewrite in place. Every "nothing to do" case leaves the file
//! untouched: it is not even reopened for writing, so its bytes and mtime
//! stay as they were.
//!
//! Re-running on an already repaired document is a no-op because the best
//! match is then the path the document already points to
//! ([`RepairOutcome::Unchanged`]).

use crate::error::DocumentError;
use crate::pipeline::discover::FileIndex;
use crate::pipeline::matcher::{best_match, rank_candidates, FileReference};
use crate::pipeline::reference::{replace_first, ReferencePattern};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Whether a repair writes its result back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepairMode {
    #[default]
    Apply,
    /// Decide, log and report, but never write.
    DryRun,
}

/// What the relink step decided for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepairOutcome {
    /// The document embeds no reference with the configured extension.
    NoReference,
    /// No file under the root carries the referenced name.
    NoCandidate { file_name: String },
    /// The best match is already what the document points to.
    Unchanged { path: PathBuf },
    /// The reference was rewritten.
    Rewritten {
        from: PathBuf,
        to: PathBuf,
        score: usize,
    },
    /// Dry run: the reference would have been rewritten.
    WouldRewrite {
        from: PathBuf,
        to: PathBuf,
        score: usize,
    },
}

impl RepairOutcome {
    /// `true` only when the document on disk was modified.
    pub fn rewritten(&self) -> bool {
        matches!(self, RepairOutcome::Rewritten { .. })
    }

    /// One-line human summary, used by the CLI status lines.
    pub fn describe(&self) -> String {
        match self {
            RepairOutcome::NoReference => "no background reference".to_string(),
            RepairOutcome::NoCandidate { file_name } => {
                format!("no file named '{file_name}' found, left as is")
            }
            RepairOutcome::Unchanged { .. } => "reference already up to date".to_string(),
            RepairOutcome::Rewritten { to, score, .. } => {
                format!("relinked to {} (score {score})", to.display())
            }
            RepairOutcome::WouldRewrite { to, score, .. } => {
                format!("would relink to {} (score {score})", to.display())
            }
        }
    }
}

/// Repair the first embedded reference of the document at `path`.
///
/// Blocking: reads, decompresses and possibly rewrites the file. Call it
/// from `spawn_blocking` inside async code.
pub fn repair_document(
    path: &Path,
    index: &FileIndex,
    pattern: &ReferencePattern,
    mode: RepairMode,
) -> Result<RepairOutcome, DocumentError> {
    // ── Step 1: Read ─────────────────────────────────────────────────────
    let text = xopp_container::read_document(path)
        .map_err(|e| DocumentError::from_container(path, e, false))?;

    // ── Step 2: Extract the first reference ──────────────────────────────
    let Some(embedded) = pattern.find_first(&text) else {
        debug!("{}: no reference", path.display());
        return Ok(RepairOutcome::NoReference);
    };
    let reference = FileReference::new(embedded.path.clone());
    let Some(file_name) = reference.file_name() else {
        return Ok(RepairOutcome::NoReference);
    };

    // ── Step 3: Candidates ───────────────────────────────────────────────
    let candidates = index.candidates(file_name);
    let Some(best) = best_match(&reference, &candidates) else {
        debug!(
            "{}: no candidate for {}",
            path.display(),
            reference.path().display()
        );
        return Ok(RepairOutcome::NoCandidate {
            file_name: file_name.to_string_lossy().into_owned(),
        });
    };

    if candidates.len() > 1 {
        for (rank, scored) in rank_candidates(&reference, &candidates).iter().enumerate() {
            debug!(
                "  #{} score={} {}",
                rank + 1,
                scored.score.0,
                scored.candidate.relative.display()
            );
        }
    }

    // ── Step 4: Decide ───────────────────────────────────────────────────
    let resolved = best.candidate.absolute.clone();
    if resolved == reference.path() {
        debug!("{}: reference already resolves", path.display());
        return Ok(RepairOutcome::Unchanged { path: resolved });
    }

    let from = reference.path().to_path_buf();
    let score = best.score.0;

    if mode == RepairMode::DryRun {
        info!(
            "{}: would relink {} → {}",
            path.display(),
            from.display(),
            resolved.display()
        );
        return Ok(RepairOutcome::WouldRewrite {
            from,
            to: resolved,
            score,
        });
    }

    // ── Step 5: Rewrite ──────────────────────────────────────────────────
    let resolved_str = resolved.to_str().ok_or_else(|| DocumentError::WriteFailed {
        path: path.to_path_buf(),
        detail: format!("resolved path {} is not valid UTF-8", resolved.display()),
    })?;
    let patched = replace_first(&text, &embedded, resolved_str);
    xopp_container::write_document(path, &patched)
        .map_err(|e| DocumentError::from_container(path, e, true))?;

    info!(
        "{}: relinked {} → {} (score {})",
        path.display(),
        from.display(),
        resolved.display(),
        score
    );

    Ok(RepairOutcome::Rewritten {
        from,
        to: resolved,
        score,
    })
}
