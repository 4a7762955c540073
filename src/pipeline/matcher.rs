//! Best-match resolution for a dangling file reference.
//!
//! A notebook remembers its PDF background as an absolute path from the
//! machine it was written on, e.g. `/home/ana/uni/shared/notes/lecture1.pdf`.
//! After the folder moved, a file called `lecture1.pdf` usually still exists
//! somewhere under the search root, often more than once. The candidate
//! whose parent directories agree with the reference's parent directories
//! for the longest run, counted from the innermost directory outward, wins:
//!
//! ```text
//! reference   …/shared/notes/lecture1.pdf      parent: [.., shared, notes]
//! candidate   archive/2023/notes/lecture1.pdf  parent: [archive, 2023, notes]  → 1
//! candidate   backup/shared/notes/lecture1.pdf parent: [backup, shared, notes] → 2 ✓
//! ```
//!
//! Candidates are scored on their absolute path, the same path that gets
//! written back, so a reference that was already relinked scores every one of
//! its segments against the file it names. A candidate at exactly the
//! referenced path always wins.
//!
//! The run stops at the first mismatching segment; segments further out are
//! never considered even if they would match again. Equal scores keep input
//! order, so the first candidate seen wins. A score of 0 is still a match:
//! whenever at least one file carries the right name, one is returned.
//!
//! Everything here is pure: no filesystem access, no logging.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// A path found inside a document. It may not exist on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    path: PathBuf,
}

impl FileReference {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The final segment; candidates must carry exactly this name.
    pub fn file_name(&self) -> Option<&OsStr> {
        self.path.file_name()
    }

    /// Directory names leading to the file, outermost first.
    pub fn parent_segments(&self) -> Vec<&OsStr> {
        parent_segments(&self.path)
    }
}

/// A real file whose name matches a [`FileReference`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Path as discovered, relative to the search root.
    pub relative: PathBuf,
    /// Absolute path. Scored, and written into the document when this
    /// candidate wins.
    pub absolute: PathBuf,
}

impl Candidate {
    pub fn new(relative: impl Into<PathBuf>, absolute: impl Into<PathBuf>) -> Self {
        Self {
            relative: relative.into(),
            absolute: absolute.into(),
        }
    }

    /// Build a candidate from a root-relative path and the absolute root.
    pub fn under_root(root: &Path, relative: impl Into<PathBuf>) -> Self {
        let relative = relative.into();
        let absolute = root.join(&relative);
        Self { relative, absolute }
    }

    pub fn parent_segments(&self) -> Vec<&OsStr> {
        parent_segments(&self.absolute)
    }

    /// Whether this candidate is the very file `reference` names.
    pub fn is_exact(&self, reference: &FileReference) -> bool {
        self.absolute == reference.path()
    }
}

/// Number of trailing parent-directory segments a candidate shares with the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MatchScore(pub usize);

/// A candidate paired with its score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredCandidate<'a> {
    pub candidate: &'a Candidate,
    pub score: MatchScore,
}

/// Directory segments of `path`'s parent. Roots, prefixes, `.` and `..` are
/// not segments.
pub fn parent_segments(path: &Path) -> Vec<&OsStr> {
    path.parent()
        .map(|parent| {
            parent
                .components()
                .filter_map(|c| match c {
                    Component::Normal(s) => Some(s),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Length of the common trailing run of `a` and `b`.
///
/// Compares from the last element backwards and stops at the first mismatch
/// or when either slice is exhausted.
pub fn trailing_run<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Score one candidate against the reference.
pub fn score(reference: &FileReference, candidate: &Candidate) -> MatchScore {
    MatchScore(trailing_run(
        &reference.parent_segments(),
        &candidate.parent_segments(),
    ))
}

/// Highest-scoring candidate together with its score; first seen wins ties.
///
/// A candidate at exactly the referenced path is returned before any other.
/// Returns `None` only when `candidates` is empty.
pub fn best_match<'a>(
    reference: &FileReference,
    candidates: &'a [Candidate],
) -> Option<ScoredCandidate<'a>> {
    let target = reference.parent_segments();

    if let Some(candidate) = candidates.iter().find(|c| c.is_exact(reference)) {
        return Some(ScoredCandidate {
            candidate,
            score: MatchScore(target.len()),
        });
    }

    let mut best: Option<ScoredCandidate<'a>> = None;
    for candidate in candidates {
        let candidate_score = MatchScore(trailing_run(&target, &candidate.parent_segments()));
        match best {
            Some(current) if current.score >= candidate_score => {}
            _ => {
                best = Some(ScoredCandidate {
                    candidate,
                    score: candidate_score,
                })
            }
        }
    }

    best
}

/// The candidate a dangling reference should be relinked to.
///
/// Returns `None` only when `candidates` is empty; callers normally filter
/// to same-name files first and treat an empty set as "nothing to do".
pub fn find_best_match<'a>(
    reference: &FileReference,
    candidates: &'a [Candidate],
) -> Option<&'a Candidate> {
    best_match(reference, candidates).map(|s| s.candidate)
}

/// All candidates, best first, in the order [`best_match`] prefers them.
/// Equal scores keep their input order.
pub fn rank_candidates<'a>(
    reference: &FileReference,
    candidates: &'a [Candidate],
) -> Vec<ScoredCandidate<'a>> {
    let target = reference.parent_segments();
    let mut ranked: Vec<ScoredCandidate<'a>> = candidates
        .iter()
        .map(|candidate| ScoredCandidate {
            candidate,
            score: MatchScore(trailing_run(&target, &candidate.parent_segments())),
        })
        .collect();
    // sort_by is stable
    ranked.sort_by(|a, b| {
        b.candidate
            .is_exact(reference)
            .cmp(&a.candidate.is_exact(reference))
            .then(b.score.cmp(&a.score))
    });
    ranked
}
