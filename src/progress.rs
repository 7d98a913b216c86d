//! Progress-callback trait for per-notebook conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the run processes each notebook.
//!
//! # Example
//!
//! ```rust
//! use codelog::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     converted: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_notebook_complete(&self, name: &str, slug: &str, _body_len: usize) {
//!         self.converted.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{name} → {slug}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { converted: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversion run as it processes each notebook.
///
/// Implementations must be `Send + Sync`: with `concurrency > 1` the
/// per-notebook methods are called from several blocking-pool threads at
/// once. All methods have no-op defaults so callers only override what they
/// care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once after cleanup, before any notebook is converted.
    ///
    /// # Arguments
    /// * `total_notebooks`: number of `*.ipynb` files found
    fn on_run_start(&self, total_notebooks: usize) {
        let _ = total_notebooks;
    }

    /// Called just before a notebook's cells are rendered.
    fn on_notebook_start(&self, name: &str) {
        let _ = name;
    }

    /// Called when an article was written.
    ///
    /// # Arguments
    /// * `name`: notebook file name
    /// * `slug`: slug the article was written under
    /// * `body_len`: byte length of the rendered body
    fn on_notebook_complete(&self, name: &str, slug: &str, body_len: usize) {
        let _ = (name, slug, body_len);
    }

    /// Called when a notebook produced no article.
    fn on_notebook_skipped(&self, name: &str, error: &str) {
        let _ = (name, error);
    }

    /// Called once after every notebook has been attempted.
    fn on_run_complete(&self, total_notebooks: usize, converted: usize) {
        let _ = (total_notebooks, converted);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
