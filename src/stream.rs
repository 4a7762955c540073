//! Streaming batch API: yield each document's result as soon as it is done.
//!
//! Same semantics as [`crate::batch::convert_batch`]: discovery and indexing
//! happen once, before the stream is returned, and documents are then
//! processed one at a time in walk order as the stream is polled. Nothing
//! runs ahead of the consumer, so dropping the stream stops the batch after
//! the current document.

use crate::batch::{convert_document, plan_batch};
use crate::config::ConversionConfig;
use crate::error::Xopp2PdfError;
use crate::output::DocumentResult;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-document results.
pub type DocumentStream = Pin<Box<dyn Stream<Item = DocumentResult> + Send>>;

/// Relink and convert every document under `config.root`, streaming results.
///
/// # Returns
/// - `Ok(DocumentStream)`: one [`DocumentResult`] per document, in walk order
/// - `Err(Xopp2PdfError)`: fatal error (root missing, bad configuration)
///
/// Batch-level progress callbacks fire as for the eager driver;
/// `on_batch_complete` fires as the last item is yielded (not at all for an
/// empty batch).
pub async fn convert_stream(config: &ConversionConfig) -> Result<DocumentStream, Xopp2PdfError> {
    info!("Starting streaming batch under {}", config.root.display());

    let plan = plan_batch(config).await?;
    let total = plan.total();
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let documents = plan.documents.clone();
    let cfg = config.clone();
    let results = stream::iter(documents.into_iter().enumerate()).then(move |(i, document)| {
        let plan = plan.clone();
        let cfg = cfg.clone();
        async move { convert_document(&document, i + 1, total, &plan, &cfg).await }
    });

    // Count successes as they pass so the final callback can report them.
    let mut succeeded = 0;
    let cb = config.progress_callback.clone();
    let results = results.inspect(move |r| {
        if r.is_success() {
            succeeded += 1;
        }
        if r.index == total {
            if let Some(ref cb) = cb {
                cb.on_batch_complete(total, succeeded);
            }
        }
    });

    Ok(Box::pin(results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn empty_root_gives_empty_stream() {
        let dir = tempdir().unwrap();
        let config = ConversionConfig::builder()
            .root(dir.path())
            .output_dir(dir.path().join("output"))
            .build()
            .unwrap();
        let items: Vec<DocumentResult> = convert_stream(&config).await.unwrap().collect().await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn missing_root_fails_before_streaming() {
        let dir = tempdir().unwrap();
        let config = ConversionConfig::builder()
            .root(dir.path().join("absent"))
            .build()
            .unwrap();
        assert!(matches!(
            convert_stream(&config).await,
            Err(Xopp2PdfError::RootNotFound { .. })
        ));
    }
}
