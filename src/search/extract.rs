//! Searchable text of one rendered page.

use crate::error::SearchError;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

/// Never indexed, whatever the configuration says.
const ALWAYS_EXCLUDED: &str = "script, style, noscript, template";

/// Text pulled out of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub title: String,
    /// Visible text with whitespace collapsed to single spaces.
    pub content: String,
    pub word_count: usize,
    /// No element matched the root selector; `<body>` was used instead.
    pub used_fallback: bool,
}

/// Compiled selectors for the root region and the excluded regions.
#[derive(Debug, Clone)]
pub struct PageExtractor {
    root: Selector,
    fallback: Selector,
    excluded: Vec<Selector>,
    heading: Selector,
    title: Selector,
}

impl PageExtractor {
    pub fn new(root_selector: &str, exclude_selectors: &[String]) -> Result<Self, SearchError> {
        let mut excluded = exclude_selectors
            .iter()
            .map(|s| parse(s))
            .collect::<Result<Vec<_>, _>>()?;
        excluded.push(parse(ALWAYS_EXCLUDED)?);

        Ok(Self {
            root: parse(root_selector)?,
            fallback: parse("body")?,
            excluded,
            heading: parse("h1")?,
            title: parse("title")?,
        })
    }

    pub fn extract(&self, html: &str) -> ExtractedPage {
        let document = Html::parse_document(html);

        let (root, used_fallback) = match document.select(&self.root).next() {
            Some(root) => (root, false),
            None => (
                document
                    .select(&self.fallback)
                    .next()
                    .unwrap_or_else(|| document.root_element()),
                true,
            ),
        };

        let skipped: HashSet<_> = self
            .excluded
            .iter()
            .flat_map(|sel| root.select(sel))
            .map(|el| (*el).id())
            .collect();

        let pieces: Vec<&str> = root
            .descendants()
            .filter_map(|node| node.value().as_text().map(|t| (node, t)))
            .filter(|(node, _)| !node.ancestors().any(|a| skipped.contains(&a.id())))
            .map(|(_, text)| &**text)
            .collect();
        let content = collapse_whitespace(&pieces.join(" "));

        let title = root
            .select(&self.heading)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .or_else(|| document.select(&self.title).next().map(element_text))
            .unwrap_or_default();

        ExtractedPage {
            title,
            word_count: content.split_whitespace().count(),
            content,
            used_fallback,
        }
    }
}

fn parse(selector: &str) -> Result<Selector, SearchError> {
    Selector::parse(selector).map_err(|e| SearchError::InvalidSelector {
        selector: selector.to_string(),
        detail: format!("{e:?}"),
    })
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Hello World | CodeLog</title><script>var x = 1;</script></head>
<body>
  <header><h1>CodeLog</h1></header>
  <nav><a href="/">Home</a></nav>
  <section id="content">
    <header><h1 class="entry-title"><a href="/hello.html">Hello   World</a></h1></header>
    <div class="entry-content">
      <p>First paragraph with <em>emphasis</em>.</p>
      <aside>Related posts</aside>
      <pre><code>print("hi")</code></pre>
    </div>
    <footer class="post-info">Published 2024</footer>
  </section>
  <footer>Powered by Pelican</footer>
</body>
</html>"#;

    fn default_extractor() -> PageExtractor {
        let config = crate::config::SearchIndexConfig::default();
        PageExtractor::new(&config.root_selector, &config.exclude_selectors).unwrap()
    }

    #[test]
    fn extracts_root_text_without_excluded_regions() {
        let page = default_extractor().extract(ARTICLE);
        assert!(!page.used_fallback);
        assert!(page.content.contains("First paragraph with emphasis ."));
        assert!(page.content.contains("print(\"hi\")"));
        assert!(!page.content.contains("Related posts"));
        assert!(!page.content.contains("Published 2024"));
        assert!(!page.content.contains("Powered by Pelican"));
        assert!(!page.content.contains("Home"));
        assert!(!page.content.contains("var x"));
    }

    #[test]
    fn title_is_first_heading_in_root() {
        // the heading counts even though its <header> is excluded from the text
        let page = default_extractor().extract(ARTICLE);
        assert_eq!(page.title, "Hello World");
        assert!(!page.content.contains("Hello World"));
    }

    #[test]
    fn title_falls_back_to_head_title() {
        let html = "<html><head><title>Only Title</title></head>\
                    <body><div id=\"content\"><p>text</p></div></body></html>";
        assert_eq!(default_extractor().extract(html).title, "Only Title");
    }

    #[test]
    fn missing_root_falls_back_to_body() {
        let html = "<html><head><title>T</title></head><body><p>one two three</p></body></html>";
        let page = default_extractor().extract(html);
        assert!(page.used_fallback);
        assert_eq!(page.content, "one two three");
        assert_eq!(page.word_count, 3);
        assert_eq!(page.title, "T");
    }

    #[test]
    fn invalid_selector_is_rejected() {
        let err = PageExtractor::new("##", &[]).unwrap_err();
        assert!(matches!(err, SearchError::InvalidSelector { .. }));
    }
}
