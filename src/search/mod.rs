//! Full-text search over the rendered site.
//!
//! Runs after the site generator: picks the article pages out of the output
//! directory ([`select`]), pulls their readable text ([`extract`]) and
//! stores it in a tantivy index ([`index`]) that the blog's search box, or
//! `codelog-search --query`, reads back.
//!
//! ```rust,no_run
//! use codelog::{build_index, SearchIndex, SearchIndexConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let report = build_index(&SearchIndexConfig::default())?;
//! println!("indexed {} pages", report.indexed.len());
//!
//! let index = SearchIndex::open("output/search-index")?;
//! for hit in index.search("tokio runtime", 5)? {
//!     println!("{} {}", hit.url, hit.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod extract;
pub mod index;
pub mod select;

pub use extract::{ExtractedPage, PageExtractor};
pub use index::{build_index, SearchIndex};
pub use select::{select_pages, Exclusion, ExclusionPolicy, PageSelection};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One page added to the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedPage {
    /// Site URL, e.g. `/hello-world-2024.html`.
    pub url: String,
    pub title: String,
    pub word_count: usize,
}

/// A selected page that could not be indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageFailure {
    pub path: PathBuf,
    pub detail: String,
}

/// Result of [`build_index`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexReport {
    pub site_dir: PathBuf,
    pub index_dir: PathBuf,
    pub indexed: Vec<IndexedPage>,
    /// HTML pages deliberately left out.
    pub excluded: Vec<PathBuf>,
    pub failures: Vec<PageFailure>,
    /// Documents in the index after commit.
    pub total_documents: u64,
    pub duration_ms: u64,
}

/// One query result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub score: f32,
    pub word_count: u64,
    /// Words around the first literal match, `...`-delimited when cut.
    pub snippet: String,
}
