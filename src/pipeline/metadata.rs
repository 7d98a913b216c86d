//! Article metadata: the `Key: Value` block in a notebook's first cell.
//!
//! The site generator reads the same block back from the top of the
//! Markdown article, so the record keeps keys in their original order and
//! writes them out unchanged, plus a derived `Slug` when the author did not
//! set one.

use crate::error::NotebookError;
use crate::notebook::{Cell, CellType};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, warn};

pub const TITLE: &str = "Title";
pub const DATE: &str = "Date";
pub const SLUG: &str = "Slug";

/// Ordered `Key: Value` record.
///
/// Behaves like a map: setting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    /// Parse `Key: Value` lines. Each line is split on its first `:`; lines
    /// without one, or with an empty key, are ignored.
    pub fn parse(source: &str) -> Self {
        let mut meta = Self::default();
        for line in source.split('\n') {
            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim();
                if key.is_empty() {
                    continue;
                }
                meta.insert(key, value.trim());
            }
        }
        meta
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The slug. Only meaningful after [`extract_metadata`] succeeded.
    pub fn slug(&self) -> &str {
        self.get(SLUG).unwrap_or_default()
    }

    /// Header lines as written at the top of the article (no trailing newline).
    pub fn to_header(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

static RE_NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w-]+").unwrap());

/// Derive a URL slug from a title.
///
/// Lowercases, collapses every run of characters that are neither word
/// characters nor `-` into one `-`, and trims `-` from both ends.
///
/// ```rust
/// assert_eq!(codelog::pipeline::metadata::slugify("Hello, World! 2024"), "hello-world-2024");
/// ```
pub fn slugify(title: &str) -> String {
    RE_NON_SLUG
        .replace_all(&title.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// Pull the metadata block out of `cells[0]`.
///
/// On success the raw cell is removed from `cells` and the returned record
/// always carries a non-empty `Slug`. On failure `cells` is left untouched.
pub fn extract_metadata(cells: &mut Vec<Cell>, name: &str) -> Result<Metadata, NotebookError> {
    let first = match cells.first() {
        Some(cell) if cell.cell_type == CellType::Raw => cell,
        Some(cell) => {
            warn!(
                "First cell in {} is a {} cell, not a raw metadata cell. Skipping.",
                name,
                cell.cell_type.as_str()
            );
            return Err(NotebookError::MissingMetadataCell {
                found: format!("{} cell", cell.cell_type.as_str()),
            });
        }
        None => {
            warn!("{} has no cells. Skipping.", name);
            return Err(NotebookError::MissingMetadataCell {
                found: "no cells".to_string(),
            });
        }
    };

    let mut meta = Metadata::parse(first.source());

    for field in [TITLE, DATE] {
        if meta.get(field).is_none() {
            error!(
                "Missing '{}' in {}. Aborting conversion for this file.",
                field, name
            );
            return Err(NotebookError::MissingField {
                field: field.to_string(),
            });
        }
    }

    let title = meta.get(TITLE).unwrap_or_default().to_string();
    let slug = match meta.get(SLUG).filter(|s| !s.is_empty()) {
        Some(explicit) => explicit.to_string(),
        None => {
            let derived = slugify(&title);
            debug!("Derived slug '{}' for {}", derived, name);
            derived
        }
    };
    if !is_usable_slug(&slug) {
        error!("Title '{}' in {} gives unusable slug '{}'", title, name, slug);
        return Err(NotebookError::InvalidSlug { title });
    }
    meta.insert(SLUG, slug);

    cells.remove(0);
    Ok(meta)
}

/// A slug becomes a file name and a directory name, so it must be one
/// non-empty path segment.
fn is_usable_slug(slug: &str) -> bool {
    !slug.is_empty() && slug != "." && slug != ".." && !slug.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(source: &str) -> Cell {
        Cell::new(CellType::Raw, source)
    }

    #[test]
    fn slugify_example() {
        assert_eq!(slugify("Hello, World! 2024"), "hello-world-2024");
    }

    #[test]
    fn slugify_trims_and_collapses() {
        assert_eq!(slugify("  --Rust & C++: a tale--  "), "rust-c-a-tale");
        assert_eq!(slugify("snake_case stays"), "snake_case-stays");
        assert_eq!(slugify("Already-hyphenated"), "already-hyphenated");
    }

    #[test]
    fn slugify_output_shape() {
        for title in ["A/B testing?", "100% done!!", "Ünïcode Tïtle", "...", "x"] {
            let slug = slugify(title);
            assert_eq!(slug, slug.to_lowercase());
            assert!(!slug.starts_with('-') && !slug.ends_with('-'), "{slug}");
            assert!(
                slug.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_'),
                "{slug}"
            );
        }
    }

    #[test]
    fn parse_splits_on_first_colon_and_ignores_other_lines() {
        let meta = Metadata::parse("Title: Time: A History\nno colon here\n: empty key\nDate:2024-01-02 ");
        assert_eq!(meta.get("Title"), Some("Time: A History"));
        assert_eq!(meta.get("Date"), Some("2024-01-02"));
        assert_eq!(meta.len(), 2);
    }

    #[test]
    fn repeated_key_overwrites_in_place() {
        let meta = Metadata::parse("Title: a\nDate: d\nTitle: b");
        assert_eq!(meta.to_header(), "Title: b\nDate: d");
    }

    #[test]
    fn extracts_and_removes_raw_cell() {
        let mut cells = vec![
            raw("Title: Hello, World! 2024\nDate: 2024-05-01\nTags: rust"),
            Cell::new(CellType::Markdown, "body"),
        ];
        let meta = extract_metadata(&mut cells, "nb.ipynb").unwrap();
        assert_eq!(meta.slug(), "hello-world-2024");
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].cell_type, CellType::Markdown);
        assert_eq!(
            meta.to_header(),
            "Title: Hello, World! 2024\nDate: 2024-05-01\nTags: rust\nSlug: hello-world-2024"
        );
    }

    #[test]
    fn explicit_slug_is_kept() {
        let mut cells = vec![raw("Title: Anything\nSlug: custom-slug\nDate: 2024")];
        let meta = extract_metadata(&mut cells, "nb.ipynb").unwrap();
        assert_eq!(meta.slug(), "custom-slug");
        assert_eq!(meta.to_header(), "Title: Anything\nSlug: custom-slug\nDate: 2024");
    }

    #[test]
    fn empty_explicit_slug_is_derived() {
        let mut cells = vec![raw("Title: Derive Me\nDate: 2024\nSlug:")];
        let meta = extract_metadata(&mut cells, "nb.ipynb").unwrap();
        assert_eq!(meta.slug(), "derive-me");
    }

    #[test]
    fn markdown_first_cell_is_rejected_without_side_effects() {
        let mut cells = vec![Cell::new(CellType::Markdown, "Title: x\nDate: y")];
        let err = extract_metadata(&mut cells, "nb.ipynb").unwrap_err();
        assert!(matches!(err, NotebookError::MissingMetadataCell { .. }));
        assert_eq!(cells.len(), 1);
    }

    #[test]
    fn empty_notebook_is_rejected() {
        let mut cells = Vec::new();
        assert!(matches!(
            extract_metadata(&mut cells, "nb.ipynb"),
            Err(NotebookError::MissingMetadataCell { .. })
        ));
    }

    #[test]
    fn missing_date_is_rejected() {
        let mut cells = vec![raw("Title: No date")];
        let err = extract_metadata(&mut cells, "nb.ipynb").unwrap_err();
        assert_eq!(
            err,
            NotebookError::MissingField {
                field: "Date".into()
            }
        );
        assert_eq!(cells.len(), 1);
    }

    #[test]
    fn punctuation_only_title_is_rejected() {
        let mut cells = vec![raw("Title: ?!?\nDate: 2024")];
        assert!(matches!(
            extract_metadata(&mut cells, "nb.ipynb"),
            Err(NotebookError::InvalidSlug { .. })
        ));
    }

    #[test]
    fn path_like_explicit_slug_is_rejected() {
        let mut cells = vec![raw("Title: x\nDate: 2024\nSlug: ../escape")];
        assert!(matches!(
            extract_metadata(&mut cells, "nb.ipynb"),
            Err(NotebookError::InvalidSlug { .. })
        ));
    }
}
