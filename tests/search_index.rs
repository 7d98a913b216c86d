//! Integration tests for the search index over a rendered site.

use codelog::{build_index, SearchError, SearchIndex, SearchIndexConfig};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><title>{title} - CodeLog</title></head>
<body>
  <header><h1><a href="/">CodeLog</a></h1><nav><a href="/archives.html">Archives</a></nav></header>
  <section id="content">
    <article>
      <header><h1 class="entry-title">{title}</h1></header>
      <div class="entry-content">{body}</div>
      <footer class="post-info">Posted in Rust</footer>
    </article>
  </section>
  <footer>Proudly powered by Pelican</footer>
</body>
</html>"#
    )
}

fn write(root: &Path, relative: &str, html: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, html).unwrap();
}

/// A small rendered blog: two articles plus the listing pages around them.
fn site() -> TempDir {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("output");
    write(
        &root,
        "tokio-runtime-2024.html",
        &page(
            "Tokio Runtime Internals",
            "<p>The scheduler steals tasks between worker threads.</p>",
        ),
    );
    write(
        &root,
        "plotting-with-matplotlib-2023.html",
        &page(
            "Plotting with Matplotlib",
            "<p>Charts, figures and a runtime comparison of backends.</p>",
        ),
    );
    for listing in [
        "index.html",
        "index2.html",
        "archives.html",
        "authors.html",
        "categories.html",
        "tags.html",
    ] {
        write(&root, listing, &page("Listing", "<p>scheduler scheduler scheduler</p>"));
    }
    write(&root, "category/rust.html", &page("Rust", "<p>scheduler</p>"));
    write(&root, "theme/css/style.css", "body { color: red }");
    tmp
}

fn config(tmp: &TempDir) -> SearchIndexConfig {
    let root = tmp.path().join("output");
    SearchIndexConfig::builder()
        .site_dir(&root)
        .index_dir(root.join("search-index"))
        .build()
        .unwrap()
}

// ── Building ─────────────────────────────────────────────────────────────────

#[test]
fn indexes_only_top_level_articles() {
    let tmp = site();
    let report = build_index(&config(&tmp)).unwrap();

    let urls: Vec<&str> = report.indexed.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "/plotting-with-matplotlib-2023.html",
            "/tokio-runtime-2024.html"
        ]
    );
    assert_eq!(report.total_documents, 2);
    assert_eq!(report.excluded.len(), 7);
    assert!(report.failures.is_empty());

    let tokio = &report.indexed[1];
    assert_eq!(tokio.title, "Tokio Runtime Internals");
    // body text only: no title header, post footer or site chrome
    assert_eq!(tokio.word_count, 7);
}

#[test]
fn subdirectories_can_be_included() {
    let tmp = site();
    let root = tmp.path().join("output");
    let config = SearchIndexConfig::builder()
        .site_dir(&root)
        .index_dir(root.join("search-index"))
        .top_level_only(false)
        .build()
        .unwrap();

    let report = build_index(&config).unwrap();
    assert!(report
        .indexed
        .iter()
        .any(|p| p.url == "/category/rust.html"));
    assert_eq!(report.total_documents, 3);
}

#[test]
fn rebuilding_replaces_the_previous_index() {
    let tmp = site();
    let config = config(&tmp);
    build_index(&config).unwrap();
    fs::remove_file(tmp.path().join("output/plotting-with-matplotlib-2023.html")).unwrap();

    let report = build_index(&config).unwrap();

    assert_eq!(report.total_documents, 1);
    assert_eq!(SearchIndex::open(&config.index_dir).unwrap().num_docs(), 1);
}

#[test]
fn page_without_content_root_falls_back_to_body() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("output");
    write(
        &root,
        "bare.html",
        "<html><head><title>Bare Page</title></head><body><p>plain words here</p></body></html>",
    );
    let config = config(&tmp);

    let report = build_index(&config).unwrap();

    assert_eq!(report.indexed.len(), 1);
    assert_eq!(report.indexed[0].title, "Bare Page");
    assert_eq!(report.indexed[0].word_count, 3);
}

#[test]
fn missing_site_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let err = build_index(&config(&tmp)).unwrap_err();
    assert!(matches!(err, SearchError::SiteDirNotFound { .. }));
}

// ── Querying ─────────────────────────────────────────────────────────────────

#[test]
fn query_finds_matching_article() {
    let tmp = site();
    let config = config(&tmp);
    build_index(&config).unwrap();

    let index = SearchIndex::open(&config.index_dir).unwrap();
    let hits = index.search("scheduler", 10).unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].url, "/tokio-runtime-2024.html");
    assert_eq!(hits[0].title, "Tokio Runtime Internals");
    assert!(hits[0].snippet.contains("scheduler"));
}

#[test]
fn query_is_stemmed() {
    let tmp = site();
    let config = config(&tmp);
    build_index(&config).unwrap();

    let index = SearchIndex::open(&config.index_dir).unwrap();
    let hits = index.search("steal", 10).unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].url, "/tokio-runtime-2024.html");
}

#[test]
fn title_matches_rank_first() {
    let tmp = site();
    let config = config(&tmp);
    build_index(&config).unwrap();

    let index = SearchIndex::open(&config.index_dir).unwrap();
    let hits = index.search("runtime", 10).unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].url, "/tokio-runtime-2024.html");
    assert!(hits[0].score >= hits[1].score);
}

#[test]
fn opening_a_missing_index_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let err = SearchIndex::open(tmp.path().join("search-index")).unwrap_err();
    assert!(matches!(err, SearchError::IndexNotFound { .. }));
}
