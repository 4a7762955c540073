//! Directory enumeration: which documents to process, and which real files
//! can stand in for a dangling reference.
//!
//! Both walks are deterministic: directory entries are visited in file-name
//! order, so candidate order (and with it the matcher's first-seen tie-break)
//! is the same on every run. Entries that cannot be read are logged and
//! skipped rather than aborting the walk.
//!
//! [`FileIndex`] is a one-shot snapshot of the tree, taken once per batch.
//! Documents appearing or disappearing mid-run are not noticed.

use crate::config::ConversionConfig;
use crate::pipeline::matcher::Candidate;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Lazy iterator over the documents under a root.
///
/// Yields regular files with the configured extension whose name does not
/// end with the autosave suffix. Paths are the root joined with the entry's
/// relative path.
pub struct DocumentWalker {
    inner: walkdir::IntoIter,
    extension: OsString,
    autosave_suffix: String,
}

impl DocumentWalker {
    pub fn new(root: &Path, config: &ConversionConfig) -> Self {
        Self {
            inner: walker(root).into_iter(),
            extension: OsString::from(&config.document_extension),
            autosave_suffix: config.autosave_suffix.clone(),
        }
    }

    fn accepts(&self, entry: &DirEntry) -> bool {
        if !is_file_like(entry) {
            return false;
        }
        let path = entry.path();
        if path.extension() != Some(self.extension.as_os_str()) {
            return false;
        }
        !is_autosave(entry.file_name(), &self.autosave_suffix)
    }
}

impl Iterator for DocumentWalker {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            match self.inner.next()? {
                Ok(entry) if self.accepts(&entry) => return Some(entry.into_path()),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable entry: {}", e),
            }
        }
    }
}

/// Whether `file_name` marks an autosave copy.
pub fn is_autosave(file_name: &OsStr, autosave_suffix: &str) -> bool {
    !autosave_suffix.is_empty() && file_name.to_string_lossy().ends_with(autosave_suffix)
}

/// All documents under `root`, in walk order.
pub fn find_documents(root: &Path, config: &ConversionConfig) -> Vec<PathBuf> {
    let documents: Vec<PathBuf> = DocumentWalker::new(root, config).collect();
    debug!("Found {} documents under {}", documents.len(), root.display());
    documents
}

/// Snapshot of every regular file under a root, keyed by exact file name.
#[derive(Debug, Clone)]
pub struct FileIndex {
    root: PathBuf,
    by_name: HashMap<OsString, Vec<PathBuf>>,
    file_count: usize,
}

impl FileIndex {
    /// Walk `root` once and record every file.
    ///
    /// `exclude` (typically the output directory) is pruned from the walk when
    /// it lies inside the root.
    pub fn build(root: &Path, exclude: Option<&Path>) -> std::io::Result<Self> {
        let root = absolute_path(root)?;
        let exclude = exclude.map(absolute_path).transpose()?;

        let mut by_name: HashMap<OsString, Vec<PathBuf>> = HashMap::new();
        let mut file_count = 0;

        for entry in walker(&root)
            .into_iter()
            .filter_entry(|e| !is_excluded(e, exclude.as_deref()))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !is_file_like(&entry) {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&root) else {
                continue;
            };
            by_name
                .entry(entry.file_name().to_os_string())
                .or_default()
                .push(relative.to_path_buf());
            file_count += 1;
        }

        debug!(
            "Indexed {} files ({} distinct names) under {}",
            file_count,
            by_name.len(),
            root.display()
        );

        Ok(Self {
            root,
            by_name,
            file_count,
        })
    }

    /// Absolute root the index was built from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every file named exactly `file_name`, in walk order.
    pub fn candidates(&self, file_name: &OsStr) -> Vec<Candidate> {
        self.by_name
            .get(file_name)
            .map(|paths| {
                paths
                    .iter()
                    .map(|rel| Candidate::under_root(&self.root, rel))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of files indexed.
    pub fn len(&self) -> usize {
        self.file_count
    }

    pub fn is_empty(&self) -> bool {
        self.file_count == 0
    }
}

/// On-demand recursive search for files named `file_name`, without a snapshot.
///
/// Same contract as [`FileIndex::candidates`]; re-walks the tree on every call.
pub fn search_by_name(
    root: &Path,
    file_name: &OsStr,
    exclude: Option<&Path>,
) -> std::io::Result<Vec<Candidate>> {
    let root = absolute_path(root)?;
    let exclude = exclude.map(absolute_path).transpose()?;

    Ok(walker(&root)
        .into_iter()
        .filter_entry(|e| !is_excluded(e, exclude.as_deref()))
        .filter_map(Result::ok)
        .filter(|e| is_file_like(e) && e.file_name() == file_name)
        .filter_map(|e| {
            e.path()
                .strip_prefix(&root)
                .ok()
                .map(|rel| Candidate::under_root(&root, rel))
        })
        .collect())
}

/// Make `path` absolute against the current directory and normalise it
/// lexically: `.` components are dropped and `..` removes the segment before
/// it (never climbing above the filesystem root).
///
/// Symlinks are not resolved, so the result names the file the way the user
/// sees it. A `..` after a symlinked directory is therefore resolved against
/// the link's name, not its target.
pub fn absolute_path(path: &Path) -> std::io::Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut normalised = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(
                    normalised.components().next_back(),
                    Some(Component::Normal(_))
                ) {
                    normalised.pop();
                }
            }
            other => normalised.push(other),
        }
    }
    Ok(normalised)
}

fn walker(root: &Path) -> WalkDir {
    WalkDir::new(root).follow_links(false).sort_by_file_name()
}

fn is_file_like(entry: &DirEntry) -> bool {
    let ft = entry.file_type();
    ft.is_file() || (ft.is_symlink() && entry.path().is_file())
}

fn is_excluded(entry: &DirEntry, exclude: Option<&Path>) -> bool {
    match exclude {
        Some(dir) => entry.depth() > 0 && entry.file_type().is_dir() && entry.path() == dir,
        None => false,
    }
}
