//! Which rendered pages are articles.
//!
//! The site generator writes each article as a top-level `<slug>.html` and
//! puts listings (categories, tags, authors) in subdirectories, next to a
//! handful of top-level overview pages. Only articles are worth indexing.

use crate::config::SearchIndexConfig;
use crate::error::SearchError;
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Why a page was left out of the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum Exclusion {
    /// File name matched an `exclude_files` pattern.
    Pattern { pattern: String },
    /// Page lives below the site root and `top_level_only` is set.
    Subdirectory,
}

/// Outcome of scanning the site directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSelection {
    /// Pages to index, sorted by path.
    pub included: Vec<PathBuf>,
    /// Pages skipped, with the reason.
    pub excluded: Vec<(PathBuf, Exclusion)>,
}

/// Compiled file-name exclusion patterns.
#[derive(Debug, Clone)]
pub struct ExclusionPolicy {
    patterns: Vec<Pattern>,
    top_level_only: bool,
}

impl ExclusionPolicy {
    pub fn new(patterns: &[String], top_level_only: bool) -> Result<Self, SearchError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| SearchError::InvalidPattern {
                    pattern: p.clone(),
                    detail: e.to_string(),
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            patterns,
            top_level_only,
        })
    }

    /// Decide for a page at `relative` (relative to the site root).
    pub fn check(&self, relative: &Path) -> Option<Exclusion> {
        if self.top_level_only && relative.components().count() > 1 {
            return Some(Exclusion::Subdirectory);
        }
        let name = relative.file_name()?.to_string_lossy();
        self.patterns
            .iter()
            .find(|p| p.matches(&name))
            .map(|p| Exclusion::Pattern {
                pattern: p.as_str().to_string(),
            })
    }
}

/// Walk `config.site_dir` for `*.html` files and split them by policy.
pub fn select_pages(config: &SearchIndexConfig) -> Result<PageSelection, SearchError> {
    let root = &config.site_dir;
    if !root.is_dir() {
        return Err(SearchError::SiteDirNotFound { path: root.clone() });
    }
    let policy = ExclusionPolicy::new(&config.exclude_files, config.top_level_only)?;

    let mut selection = PageSelection::default();
    let walker = WalkDir::new(root).min_depth(1).sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| SearchError::Io {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone()),
            source: e.into(),
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|e| e != "html") {
            continue;
        }
        // the index directory may live inside the site
        if path.starts_with(&config.index_dir) {
            debug!("Ignoring {} inside the index directory", path.display());
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        match policy.check(relative) {
            Some(Exclusion::Subdirectory) => {
                info!("Excluding subdirectory file: {}", relative.display());
                selection
                    .excluded
                    .push((path.to_path_buf(), Exclusion::Subdirectory));
            }
            Some(reason) => {
                info!("Excluding: {}", relative.display());
                selection.excluded.push((path.to_path_buf(), reason));
            }
            None => {
                info!("Including article: {}", relative.display());
                selection.included.push(path.to_path_buf());
            }
        }
    }

    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn policy() -> ExclusionPolicy {
        ExclusionPolicy::new(&SearchIndexConfig::default().exclude_files, true).unwrap()
    }

    #[test]
    fn listing_pages_are_excluded() {
        let p = policy();
        for name in [
            "index.html",
            "index2.html",
            "index12.html",
            "archives.html",
            "authors.html",
            "categories.html",
            "tags.html",
        ] {
            assert!(
                matches!(p.check(Path::new(name)), Some(Exclusion::Pattern { .. })),
                "{name}"
            );
        }
    }

    #[test]
    fn articles_are_included() {
        let p = policy();
        assert_eq!(p.check(Path::new("hello-world-2024.html")), None);
        assert_eq!(p.check(Path::new("indexing-tips.html")), None);
    }

    #[test]
    fn subdirectory_pages_are_excluded_when_top_level_only() {
        assert_eq!(
            policy().check(Path::new("category/rust.html")),
            Some(Exclusion::Subdirectory)
        );
        let nested = ExclusionPolicy::new(&[], false).unwrap();
        assert_eq!(nested.check(Path::new("category/rust.html")), None);
    }

    #[test]
    fn bad_pattern_is_reported() {
        let err = ExclusionPolicy::new(&["[".to_string()], true).unwrap_err();
        assert!(matches!(err, SearchError::InvalidPattern { .. }));
    }

    #[test]
    fn select_pages_walks_site() {
        let tmp = tempfile::tempdir().unwrap();
        let site = tmp.path();
        fs::create_dir_all(site.join("tag")).unwrap();
        fs::create_dir_all(site.join("search-index")).unwrap();
        for file in [
            "b-post.html",
            "a-post.html",
            "index.html",
            "index2.html",
            "tags.html",
            "style.css",
            "tag/rust.html",
            "search-index/meta.html",
        ] {
            fs::write(site.join(file), "<html></html>").unwrap();
        }

        let config = SearchIndexConfig::builder()
            .site_dir(site)
            .index_dir(site.join("search-index"))
            .build()
            .unwrap();
        let selection = select_pages(&config).unwrap();

        assert_eq!(
            selection.included,
            vec![site.join("a-post.html"), site.join("b-post.html")]
        );
        assert_eq!(selection.excluded.len(), 4);
    }

    #[test]
    fn missing_site_dir_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let config = SearchIndexConfig::builder()
            .site_dir(tmp.path().join("nope"))
            .build()
            .unwrap();
        assert!(matches!(
            select_pages(&config),
            Err(SearchError::SiteDirNotFound { .. })
        ));
    }
}
