//! Streaming conversion API: emit notebook results as they complete.
//!
//! Unlike the eager [`crate::convert::convert`], which returns only after
//! every notebook finishes, [`convert_stream`] yields each
//! [`NotebookResult`] as soon as it is ready. Notebooks rejected during
//! planning (bad metadata, slug collisions under the `fail` policy) come
//! first; rendered notebooks follow in completion order, so sort by
//! `source` if order matters.

use crate::config::ConversionConfig;
use crate::convert::{plan_run, process_notebook, RunPlan};
use crate::error::ConvertError;
use crate::output::NotebookResult;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of notebook results.
///
/// An `Err` item means a conversion task panicked; the remaining items are
/// still delivered.
pub type NotebookStream = Pin<Box<dyn Stream<Item = Result<NotebookResult, ConvertError>> + Send>>;

/// Convert every notebook, streaming results as they are ready.
///
/// Planning (cleanup, loading, slug resolution) happens before this returns,
/// so fatal errors surface here rather than inside the stream.
///
/// # Returns
/// - `Ok(NotebookStream)`: one item per notebook found
/// - `Err(ConvertError)`: fatal error (missing notebook directory, etc.)
pub async fn convert_stream(config: &ConversionConfig) -> Result<NotebookStream, ConvertError> {
    info!(
        "Starting streaming conversion: {}",
        config.notebook_dir.display()
    );

    let config = Arc::new(config.clone());
    let RunPlan { ready, skipped, .. } = {
        let config = Arc::clone(&config);
        tokio::task::spawn_blocking(move || plan_run(&config))
            .await
            .map_err(|e| ConvertError::Internal(format!("Planning task panicked: {}", e)))??
    };

    let concurrency = config.concurrency;
    let rendered = stream::iter(ready.into_iter().map(move |prepared| {
        let config = Arc::clone(&config);
        async move {
            tokio::task::spawn_blocking(move || process_notebook(prepared, &config))
                .await
                .map_err(|e| ConvertError::Internal(format!("Notebook task panicked: {}", e)))
        }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(stream::iter(skipped.into_iter().map(Ok)).chain(rendered)))
}
