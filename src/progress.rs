//! Progress-callback trait for per-document batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the batch works through each notebook. The CLI uses this to
//! drive its progress bar and `[i/N]` status lines; library users can forward
//! events anywhere without the library knowing how they are displayed.
//!
//! # Example
//!
//! ```rust
//! use xopp2pdf::{BatchProgressCallback, ConversionConfig};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     converted: Arc<AtomicUsize>,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, index: usize, total: usize, output: &Path) {
//!         self.converted.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("[{index}/{total}] → {}", output.display());
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     converted: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::repair::RepairOutcome;
use std::path::Path;
use std::sync::Arc;

/// Called by the batch driver as it processes each document.
///
/// Documents are processed one at a time, so calls never overlap, but the
/// callback is stored in a `Clone` config and may be moved across threads,
/// hence `Send + Sync`. All methods default to no-ops.
///
/// `index` is always 1-based.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after discovery, before the first document.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called before a document is repaired.
    fn on_document_start(&self, index: usize, total: usize, document: &Path) {
        let _ = (index, total, document);
    }

    /// Called after the relink step, whatever it decided.
    fn on_document_repaired(&self, index: usize, total: usize, outcome: &RepairOutcome) {
        let _ = (index, total, outcome);
    }

    /// Called when the renderer produced `output`.
    fn on_document_complete(&self, index: usize, total: usize, output: &Path) {
        let _ = (index, total, output);
    }

    /// Called when the document failed at any stage.
    fn on_document_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every document has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        repaired: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        batch_total: AtomicUsize,
        batch_success: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_batch_start(&self, total: usize) {
            self.batch_total.store(total, Ordering::SeqCst);
        }

        fn on_document_start(&self, _index: usize, _total: usize, _document: &Path) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_repaired(&self, _index: usize, _total: usize, _outcome: &RepairOutcome) {
            self.repaired.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_complete(&self, _index: usize, _total: usize, _output: &Path) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _total: usize, success_count: usize) {
            self.batch_success.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_document_start(1, 2, Path::new("a.xopp"));
        cb.on_document_repaired(1, 2, &RepairOutcome::NoReference);
        cb.on_document_complete(1, 2, Path::new("output/a.xopp.pdf"));
        cb.on_document_error(2, 2, "renderer exited with status 1");
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_batch_start(3);
        for i in 1..=3 {
            tracker.on_document_start(i, 3, Path::new("n.xopp"));
            tracker.on_document_repaired(i, 3, &RepairOutcome::NoReference);
        }
        tracker.on_document_complete(1, 3, Path::new("o1.pdf"));
        tracker.on_document_complete(2, 3, Path::new("o2.pdf"));
        tracker.on_document_error(3, 3, "timeout");
        tracker.on_batch_complete(3, 2);

        assert_eq!(tracker.batch_total.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.repaired.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.batch_success.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(10);
        cb.on_document_start(1, 10, Path::new("x.xopp"));
    }
}
