//! Site-wide settings shared by the converter and the search indexer.
//!
//! Loaded once from `site.toml` and never mutated. Every key is optional;
//! missing keys take the blog's stock values below. Only the CLIs read this:
//! they turn it into directory defaults for [`crate::ConversionConfig`] and
//! [`crate::SearchIndexConfig`].
//!
//! ```toml
//! author = "Abhijeet Adarsh"
//! sitename = "CodeLog"
//! content_path = "content"
//! output_path = "output"
//! static_paths = ["images"]
//!
//! [[links]]
//! name = "Archives"
//! url = "/archives.html"
//! ```

use crate::error::SiteConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A `(name, url)` pair shown in the footer or social bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Link {
    pub name: String,
    pub url: String,
}

impl Link {
    fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

/// Site configuration loaded from `site.toml`.
///
/// Unknown keys are rejected so typos surface instead of silently falling
/// back to a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    pub author: String,
    pub sitename: String,
    pub sitesubtitle: String,
    pub siteurl: String,
    /// Article source root; converted articles land here.
    pub content_path: PathBuf,
    /// Notebook directory, relative to `content_path`.
    pub notebook_subdir: String,
    /// Rendered site root; the search index is built from here.
    pub output_path: PathBuf,
    /// Static directories under `content_path`; the first holds images.
    pub static_paths: Vec<String>,
    pub timezone: String,
    pub locale: String,
    pub default_lang: String,
    pub plugins: Vec<String>,
    pub theme: String,
    pub default_pagination: usize,
    pub links: Vec<Link>,
    pub social: Vec<Link>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        let author = "Abhijeet Adarsh".to_string();
        Self {
            sitesubtitle: format!("by {author}"),
            author,
            sitename: "CodeLog".to_string(),
            siteurl: "http://127.0.0.1:8000".to_string(),
            content_path: PathBuf::from("content"),
            notebook_subdir: "notebooks".to_string(),
            output_path: PathBuf::from("output"),
            static_paths: vec!["images".to_string()],
            timezone: "Asia/Kolkata".to_string(),
            locale: "C".to_string(),
            default_lang: "en".to_string(),
            plugins: vec!["seo".to_string()],
            theme: "themes/notmyidea".to_string(),
            default_pagination: 6,
            links: vec![
                Link::new("About", "/pages/about.html"),
                Link::new("Projects", "/pages/projects.html"),
                Link::new("Contact", "/pages/contact.html"),
                Link::new("Archives", "/archives.html"),
            ],
            social: vec![
                Link::new("GitHub", "https://github.com/abhijeetadarsh"),
                Link::new("LinkedIn", "https://linkedin.com/in/abhijeet-adarsh"),
                Link::new("X", "https://x.com/adarsh_abhijeet"),
            ],
        }
    }
}

impl SiteConfig {
    /// Conventional file name, looked up in the working directory.
    pub const FILE_NAME: &'static str = "site.toml";

    /// Load and validate `path`.
    pub fn load(path: &Path) -> Result<Self, SiteConfigError> {
        let text = fs::read_to_string(path).map_err(|source| SiteConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| SiteConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!("Loaded site config from {}", path.display());
        Ok(config)
    }

    /// Like [`SiteConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, SiteConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No {} found; using built-in site defaults", path.display());
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<(), SiteConfigError> {
        if self.default_pagination == 0 {
            return Err(SiteConfigError::Validation(
                "default_pagination must be at least 1".into(),
            ));
        }
        if self.content_path.as_os_str().is_empty() || self.output_path.as_os_str().is_empty() {
            return Err(SiteConfigError::Validation(
                "content_path and output_path must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// `<content_path>/<notebook_subdir>`.
    pub fn notebook_dir(&self) -> PathBuf {
        self.content_path.join(&self.notebook_subdir)
    }

    /// First static path, or `images` when none is configured.
    pub fn image_subdir(&self) -> &str {
        self.static_paths
            .first()
            .map(String::as_str)
            .unwrap_or("images")
    }

    /// Where the search index lives inside the rendered site.
    pub fn search_index_dir(&self) -> PathBuf {
        self.output_path.join("search-index")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_blog_settings() {
        let site = SiteConfig::default();
        assert_eq!(site.sitesubtitle, "by Abhijeet Adarsh");
        assert_eq!(site.notebook_dir(), PathBuf::from("content/notebooks"));
        assert_eq!(site.image_subdir(), "images");
        assert_eq!(site.search_index_dir(), PathBuf::from("output/search-index"));
        assert_eq!(site.links.len(), 4);
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("site.toml");
        fs::write(
            &path,
            "sitename = \"Other\"\nstatic_paths = [\"assets\", \"images\"]\n\n[[links]]\nname = \"Home\"\nurl = \"/\"\n",
        )
        .unwrap();

        let site = SiteConfig::load(&path).unwrap();
        assert_eq!(site.sitename, "Other");
        assert_eq!(site.image_subdir(), "assets");
        assert_eq!(site.links, vec![Link::new("Home", "/")]);
        assert_eq!(site.author, "Abhijeet Adarsh");
    }

    #[test]
    fn unknown_key_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("site.toml");
        fs::write(&path, "sitenam = \"typo\"\n").unwrap();
        assert!(matches!(
            SiteConfig::load(&path),
            Err(SiteConfigError::Toml { .. })
        ));
    }

    #[test]
    fn zero_pagination_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("site.toml");
        fs::write(&path, "default_pagination = 0\n").unwrap();
        assert!(matches!(
            SiteConfig::load(&path),
            Err(SiteConfigError::Validation(_))
        ));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let site = SiteConfig::load_or_default(&tmp.path().join("site.toml")).unwrap();
        assert_eq!(site, SiteConfig::default());
    }
}
