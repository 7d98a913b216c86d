//! Result types returned by a conversion run.
//!
//! Everything here is `Serialize` so the CLI can print a run as JSON with
//! `--json`, and so callers can archive a report next to the generated site.

use crate::error::{AssetError, NotebookError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of converting one notebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookResult {
    /// Notebook file that was read.
    pub source: PathBuf,
    /// Slug the article was (or would have been) written under.
    pub slug: Option<String>,
    /// Article path, when one was written.
    pub output_path: Option<PathBuf>,
    /// Every image file written for this notebook: relocated markdown
    /// images, decoded attachments, and code-output images.
    pub assets: Vec<PathBuf>,
    /// Images that could not be relocated; their links were left unchanged.
    pub warnings: Vec<AssetError>,
    /// Why no article was written, if none was.
    pub error: Option<NotebookError>,
    /// Wall-clock time spent on this notebook.
    pub duration_ms: u64,
}

impl NotebookResult {
    /// A result for a notebook that was skipped before rendering.
    pub fn skipped(source: PathBuf, slug: Option<String>, error: NotebookError) -> Self {
        Self {
            source,
            slug,
            output_path: None,
            assets: Vec::new(),
            warnings: Vec::new(),
            error: Some(error),
            duration_ms: 0,
        }
    }

    pub fn is_converted(&self) -> bool {
        self.error.is_none() && self.output_path.is_some()
    }

    /// The notebook's file name, for log lines.
    pub fn name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Notebooks found in the notebook directory.
    pub total_notebooks: usize,
    /// Notebooks that produced an article.
    pub converted: usize,
    /// Notebooks that produced nothing.
    pub skipped: usize,
    /// Image files written across all notebooks.
    pub assets_written: usize,
    /// Image references that could not be relocated.
    pub asset_warnings: usize,
    /// Stale articles deleted before the run.
    pub cleaned_files: usize,
    /// Wall-clock time of the whole run.
    pub total_duration_ms: u64,
}

/// Everything a run produced, in notebook file-name order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub notebooks: Vec<NotebookResult>,
    pub stats: RunStats,
}

impl RunReport {
    /// Build a report from per-notebook results, computing the stats.
    pub fn from_results(
        mut notebooks: Vec<NotebookResult>,
        cleaned_files: usize,
        total_duration_ms: u64,
    ) -> Self {
        notebooks.sort_by(|a, b| a.source.cmp(&b.source));
        let converted = notebooks.iter().filter(|n| n.is_converted()).count();
        let stats = RunStats {
            total_notebooks: notebooks.len(),
            converted,
            skipped: notebooks.len() - converted,
            assets_written: notebooks.iter().map(|n| n.assets.len()).sum(),
            asset_warnings: notebooks.iter().map(|n| n.warnings.len()).sum(),
            cleaned_files,
            total_duration_ms,
        };
        Self { notebooks, stats }
    }

    /// Slugs of every article written, in notebook order.
    pub fn slugs(&self) -> Vec<&str> {
        self.notebooks
            .iter()
            .filter(|n| n.is_converted())
            .filter_map(|n| n.slug.as_deref())
            .collect()
    }
}
