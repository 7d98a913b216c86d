//! # codelog
//!
//! Turn Jupyter notebooks into Markdown articles for a Pelican blog, and
//! build a full-text search index over the rendered site.
//!
//! ## Conversion Pipeline
//!
//! ```text
//! content/notebooks/*.ipynb
//!  │
//!  ├─ 1. Clean     delete stale *.md and per-article image folders
//!  ├─ 2. Metadata  first raw cell → `Key: Value` header, derived slug
//!  ├─ 3. Slugs     settle collisions before any parallel work
//!  ├─ 4. Relocate  copy / decode markdown images into images/<slug>/
//!  ├─ 5. Render    cells + code outputs → Markdown body (spawn_blocking)
//!  └─ 6. Write     code-output images, then the article (atomic rename)
//! ```
//!
//! A notebook that cannot be converted is skipped with a logged reason; the
//! rest of the run carries on. Only problems with the run itself (missing
//! notebook directory, unwritable output directory) are returned as errors.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use codelog::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .notebook_dir("content/notebooks")
//!         .output_dir("content")
//!         .build()?;
//!     let report = convert(&config).await?;
//!     for nb in &report.notebooks {
//!         match &nb.error {
//!             None => println!("{} → {}", nb.name(), nb.slug.as_deref().unwrap_or("")),
//!             Some(e) => eprintln!("{} skipped: {e}", nb.name()),
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Search
//!
//! After the site generator has rendered `output/`, [`build_index`] indexes
//! the article pages and [`SearchIndex`] queries them. See [`search`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `nb2md` and `codelog-search` binaries (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! codelog = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod notebook;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod search;
pub mod site;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, SearchIndexConfig, SearchIndexConfigBuilder,
    SlugCollisionPolicy,
};
pub use convert::{convert, convert_notebook, convert_sync};
pub use error::{AssetError, ConvertError, NotebookError, SearchError, SiteConfigError};
pub use notebook::{Cell, CellType, Notebook, Output};
pub use output::{NotebookResult, RunReport, RunStats};
pub use pipeline::metadata::{slugify, Metadata};
pub use pipeline::relocate::{
    default_transforms, AttachmentRelocator, CellTransform, RelativeImageRelocator,
    TransformContext,
};
pub use pipeline::render::{MarkdownRenderer, OutputTemplate, RenderedNotebook};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use search::{build_index, IndexReport, SearchHit, SearchIndex};
pub use site::SiteConfig;
pub use stream::{convert_stream, NotebookStream};
