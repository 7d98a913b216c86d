//! Configuration types for notebook conversion and search indexing.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]; the search-index builder has the same
//! pair in [`SearchIndexConfig`] / [`SearchIndexConfigBuilder`]. Keeping every
//! knob in one struct makes it trivial to share configs across tasks, print
//! them for debugging, and diff two runs to understand why their outputs differ.
//!
//! Defaults reproduce the blog's layout: notebooks in `content/notebooks`,
//! articles in `content`, images under `content/images/<slug>/`.

use crate::error::{ConvertError, SearchError};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for a notebook conversion run.
///
/// # Example
/// ```rust
/// use codelog::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .notebook_dir("content/notebooks")
///     .output_dir("content")
///     .concurrency(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.asset_root(), std::path::PathBuf::from("content/images"));
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Directory scanned (non-recursively) for `*.ipynb`. Default: `content/notebooks`.
    pub notebook_dir: PathBuf,

    /// Directory receiving `<slug>.<extension>` articles. Default: `content`.
    pub output_dir: PathBuf,

    /// Asset directory name under `output_dir`. Default: `images`.
    ///
    /// Also the middle segment of rewritten image URLs, so it must match one
    /// of the site generator's static paths.
    pub image_subdir: String,

    /// Prefix of rewritten image URLs. Default: `{static}`.
    ///
    /// Pelican expands `{static}` to the site URL of a file inside a static
    /// path, which keeps links valid whatever the article's own URL becomes.
    pub static_ref: String,

    /// Article file extension, without the dot. Default: `md`.
    pub extension: String,

    /// `{unique_key}` segment of code-output image names. Default: `output`.
    pub unique_key: String,

    /// Number of notebooks converted at once. Default: available parallelism.
    ///
    /// `1` converts strictly one notebook after another.
    pub concurrency: usize,

    /// What to do when two notebooks produce the same slug. Default: [`SlugCollisionPolicy::Suffix`].
    pub slug_collision: SlugCollisionPolicy,

    /// Delete stale articles and per-slug asset directories before converting. Default: true.
    ///
    /// Without cleanup, an article whose notebook was renamed or deleted
    /// lingers in the output directory and keeps getting published.
    pub clean_outputs: bool,

    /// Receives per-notebook events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            notebook_dir: PathBuf::from("content/notebooks"),
            output_dir: PathBuf::from("content"),
            image_subdir: "images".to_string(),
            static_ref: "{static}".to_string(),
            extension: "md".to_string(),
            unique_key: "output".to_string(),
            concurrency: default_concurrency(),
            slug_collision: SlugCollisionPolicy::default(),
            clean_outputs: true,
            progress_callback: None,
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("notebook_dir", &self.notebook_dir)
            .field("output_dir", &self.output_dir)
            .field("image_subdir", &self.image_subdir)
            .field("static_ref", &self.static_ref)
            .field("extension", &self.extension)
            .field("unique_key", &self.unique_key)
            .field("concurrency", &self.concurrency)
            .field("slug_collision", &self.slug_collision)
            .field("clean_outputs", &self.clean_outputs)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Directory holding `<slug>/` image folders.
    pub fn asset_root(&self) -> PathBuf {
        self.output_dir.join(&self.image_subdir)
    }

    /// URL prefix for relocated images, e.g. `{static}/images`.
    pub fn asset_url_prefix(&self) -> String {
        let static_ref = self.static_ref.trim_end_matches('/');
        if static_ref.is_empty() {
            self.image_subdir.clone()
        } else {
            format!("{}/{}", static_ref, self.image_subdir)
        }
    }

    /// File name of the article for `slug`.
    pub fn article_file_name(&self, slug: &str) -> String {
        format!("{}.{}", slug, self.extension)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn notebook_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.notebook_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn image_subdir(mut self, subdir: impl Into<String>) -> Self {
        self.config.image_subdir = subdir.into();
        self
    }

    pub fn static_ref(mut self, prefix: impl Into<String>) -> Self {
        self.config.static_ref = prefix.into();
        self
    }

    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.config.extension = ext.into().trim_start_matches('.').to_string();
        self
    }

    pub fn unique_key(mut self, key: impl Into<String>) -> Self {
        self.config.unique_key = key.into();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn slug_collision(mut self, policy: SlugCollisionPolicy) -> Self {
        self.config.slug_collision = policy;
        self
    }

    pub fn clean_outputs(mut self, v: bool) -> Self {
        self.config.clean_outputs = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if c.extension.is_empty() {
            return Err(ConvertError::InvalidConfig(
                "Output extension must not be empty".into(),
            ));
        }
        if c.image_subdir.is_empty() || c.image_subdir.contains(['/', '\\']) {
            return Err(ConvertError::InvalidConfig(format!(
                "Image subdirectory must be a single path segment, got '{}'",
                c.image_subdir
            )));
        }
        if c.unique_key.is_empty() {
            return Err(ConvertError::InvalidConfig(
                "Unique key must not be empty".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(ConvertError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Resolution of two notebooks deriving the same slug.
///
/// Both notebooks would otherwise write `<slug>.md` and `images/<slug>/`,
/// and whichever finished last would silently win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlugCollisionPolicy {
    /// Keep the first notebook's slug (in file-name order) and append `-2`,
    /// `-3`, … to later ones, rewriting their `Slug` header. (default)
    #[default]
    Suffix,
    /// Skip later notebooks with [`crate::error::NotebookError::SlugCollision`].
    Fail,
}

// ── Search index ─────────────────────────────────────────────────────────

/// Configuration for building the article search index.
#[derive(Debug, Clone)]
pub struct SearchIndexConfig {
    /// Rendered site to index. Default: `output`.
    pub site_dir: PathBuf,

    /// Where the index is written; recreated on every build. Default: `output/search-index`.
    pub index_dir: PathBuf,

    /// Only text inside the first element matching this selector is indexed. Default: `#content`.
    pub root_selector: String,

    /// Regions inside the root that are never indexed. Default: `nav`, `header`, `footer`, `aside`.
    pub exclude_selectors: Vec<String>,

    /// Language used for stemming. Default: `en`.
    pub force_language: String,

    /// Glob patterns on file names that are never indexed.
    ///
    /// Defaults cover the generator's listing pages: the paginated home page
    /// and the archive/author/category/tag overviews.
    pub exclude_files: Vec<String>,

    /// Only index pages directly inside `site_dir`. Default: true.
    ///
    /// Articles are written at the top level; category, tag and author
    /// listings live in subdirectories.
    pub top_level_only: bool,

    /// Memory budget of the tantivy writer, in bytes. Default: 50 MB.
    pub writer_memory_bytes: usize,
}

impl Default for SearchIndexConfig {
    fn default() -> Self {
        Self {
            site_dir: PathBuf::from("output"),
            index_dir: PathBuf::from("output/search-index"),
            root_selector: "#content".to_string(),
            exclude_selectors: ["nav", "header", "footer", "aside"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            force_language: "en".to_string(),
            exclude_files: [
                "index.html",
                "index[0-9]*.html",
                "archives.html",
                "authors.html",
                "categories.html",
                "tags.html",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            top_level_only: true,
            writer_memory_bytes: 50_000_000,
        }
    }
}

impl SearchIndexConfig {
    pub fn builder() -> SearchIndexConfigBuilder {
        SearchIndexConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SearchIndexConfig`].
#[derive(Debug)]
pub struct SearchIndexConfigBuilder {
    config: SearchIndexConfig,
}

impl SearchIndexConfigBuilder {
    pub fn site_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.site_dir = dir.into();
        self
    }

    pub fn index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.index_dir = dir.into();
        self
    }

    pub fn root_selector(mut self, selector: impl Into<String>) -> Self {
        self.config.root_selector = selector.into();
        self
    }

    pub fn exclude_selectors(mut self, selectors: Vec<String>) -> Self {
        self.config.exclude_selectors = selectors;
        self
    }

    pub fn force_language(mut self, lang: impl Into<String>) -> Self {
        self.config.force_language = lang.into();
        self
    }

    pub fn exclude_files(mut self, patterns: Vec<String>) -> Self {
        self.config.exclude_files = patterns;
        self
    }

    pub fn top_level_only(mut self, v: bool) -> Self {
        self.config.top_level_only = v;
        self
    }

    pub fn writer_memory_bytes(mut self, bytes: usize) -> Self {
        self.config.writer_memory_bytes = bytes;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SearchIndexConfig, SearchError> {
        let c = &self.config;
        if c.root_selector.trim().is_empty() {
            return Err(SearchError::InvalidConfig(
                "Root selector must not be empty".into(),
            ));
        }
        // the index directory is wiped on every build
        if c.site_dir.starts_with(&c.index_dir) {
            return Err(SearchError::InvalidConfig(format!(
                "Index directory '{}' must not contain the site directory",
                c.index_dir.display()
            )));
        }
        // tantivy refuses writer budgets below 15 MB per indexing thread.
        if c.writer_memory_bytes < 15_000_000 {
            return Err(SearchError::InvalidConfig(format!(
                "Writer memory must be at least 15000000 bytes, got {}",
                c.writer_memory_bytes
            )));
        }
        Ok(self.config)
    }
}
