//! Error types for the codelog library.
//!
//! Failures are contained at the smallest unit that can fail, so there is one
//! error type per unit:
//!
//! * [`ConvertError`] (**Fatal**): the run cannot proceed at all (notebook
//!   directory missing, output directory cannot be created or cleaned).
//!   Returned as `Err(ConvertError)` from the top-level `convert*` functions.
//!
//! * [`NotebookError`] (**Non-fatal**): a single notebook could not be
//!   converted (no metadata cell, missing `Title`, unreadable JSON). Stored
//!   inside [`crate::output::NotebookResult`]; every other notebook in the run
//!   is unaffected.
//!
//! * [`AssetError`] (**Warning**): one image could not be relocated. The
//!   notebook still converts, with that link left as it was.
//!
//! * [`SearchError`]: **Fatal** for the search-index builder. Per-page
//!   failures while indexing are recorded in
//!   [`crate::search::IndexReport`] instead.
//!
//! * [`SiteConfigError`]: the site settings file is unreadable or invalid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the conversion entry points.
///
/// Notebook-level failures use [`NotebookError`] and are stored in
/// [`crate::output::NotebookResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The notebook source directory does not exist.
    #[error("Notebook directory not found: '{path}'\nCheck the path or pass --notebooks <DIR>.")]
    NotebookDirNotFound { path: PathBuf },

    /// The notebook directory exists but could not be listed.
    #[error("Failed to list notebooks in '{path}': {source}")]
    ListFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create the output or asset root directory.
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not delete a previously generated file or asset directory.
    #[error("Failed to clean '{path}': {source}")]
    CleanupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a conversion task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single notebook.
///
/// The notebook produces no article and no assets; the run moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum NotebookError {
    /// The notebook file could not be read.
    #[error("failed to read notebook: {detail}")]
    ReadFailed { detail: String },

    /// The file is not a valid nbformat v4 document.
    #[error("failed to parse notebook JSON: {detail}")]
    ParseFailed { detail: String },

    /// Cell 0 is absent or is not a raw cell.
    #[error("first cell is not a raw metadata cell (found {found})")]
    MissingMetadataCell { found: String },

    /// A required metadata key is missing.
    #[error("missing required metadata field '{field}'")]
    MissingField { field: String },

    /// The slug is empty after normalisation.
    #[error("title '{title}' does not produce a usable slug")]
    InvalidSlug { title: String },

    /// Another notebook earlier in the run already claimed this slug.
    #[error("slug '{slug}' is already used by {claimed_by}")]
    SlugCollision { slug: String, claimed_by: String },

    /// The article or one of its code-output images could not be written.
    #[error("failed to write '{path}': {detail}")]
    WriteFailed { path: PathBuf, detail: String },
}

/// A non-fatal problem with one image reference inside a notebook.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AssetError {
    /// A relative image link points at a file that does not exist.
    #[error("image '{reference}' not found at '{resolved}'")]
    MissingFile { reference: String, resolved: PathBuf },

    /// The image exists but could not be copied into the asset root.
    #[error("failed to copy '{source_path}' to '{dest}': {detail}")]
    CopyFailed {
        source_path: PathBuf,
        dest: PathBuf,
        detail: String,
    },

    /// An embedded payload is not valid base64.
    #[error("attachment '{name}' ({media_type}) could not be decoded: {detail}")]
    DecodeFailed {
        name: String,
        media_type: String,
        detail: String,
    },

    /// Decoded bytes could not be written.
    #[error("failed to write '{dest}': {detail}")]
    WriteFailed { dest: PathBuf, detail: String },
}

/// Fatal errors from the search-index builder and query API.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The rendered site directory does not exist.
    #[error("Site directory not found: '{path}'\nBuild the site first, or pass --site <DIR>.")]
    SiteDirNotFound { path: PathBuf },

    /// No index exists at the given path.
    #[error("Search index not found: '{path}'\nRun codelog-search without --query to build it.")]
    IndexNotFound { path: PathBuf },

    /// A CSS selector in the configuration does not parse.
    #[error("Invalid CSS selector '{selector}': {detail}")]
    InvalidSelector { selector: String, detail: String },

    /// A file-name exclusion pattern does not parse.
    #[error("Invalid file pattern '{pattern}': {detail}")]
    InvalidPattern { pattern: String, detail: String },

    /// Filesystem failure around the index directory.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Tantivy rejected an operation.
    #[error("Index error: {0}")]
    Index(#[from] tantivy::TantivyError),

    /// The query string could not be parsed.
    #[error("Invalid query '{query}': {detail}")]
    InvalidQuery { query: String, detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors loading [`crate::site::SiteConfig`].
#[derive(Debug, Error)]
pub enum SiteConfigError {
    #[error("Failed to read site config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in '{path}': {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid site config: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_display() {
        let e = NotebookError::MissingField {
            field: "Date".into(),
        };
        assert!(e.to_string().contains("'Date'"), "got: {e}");
    }

    #[test]
    fn slug_collision_display() {
        let e = NotebookError::SlugCollision {
            slug: "intro".into(),
            claimed_by: "a.ipynb".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("intro"));
        assert!(msg.contains("a.ipynb"));
    }

    #[test]
    fn notebook_dir_not_found_display() {
        let e = ConvertError::NotebookDirNotFound {
            path: PathBuf::from("content/notebooks"),
        };
        assert!(e.to_string().contains("content/notebooks"));
    }

    #[test]
    fn asset_error_roundtrips_through_json() {
        let e = AssetError::MissingFile {
            reference: "img/plot.png".into(),
            resolved: PathBuf::from("nb/img/plot.png"),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: AssetError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
