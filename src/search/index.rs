//! Tantivy index: build from the rendered site, open, query.
//!
//! Schema: `url` (raw, stored), `title` and `content` (stemmed, stored),
//! `word_count` (stored). The stemming language is written next to the
//! index in `codelog-search.json` so readers tokenise queries the same way
//! the writer tokenised pages.

use crate::config::SearchIndexConfig;
use crate::error::SearchError;
use crate::search::extract::PageExtractor;
use crate::search::select::select_pages;
use crate::search::{IndexReport, IndexedPage, PageFailure, SearchHit};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, STORED, STRING,
};
use tantivy::tokenizer::{Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, TextAnalyzer};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};
use tracing::{debug, error, info, warn};

/// Tokenizer registered on every index this crate opens.
const TOKENIZER: &str = "codelog";

/// Sidecar file recording how the index was built.
const META_FILE: &str = "codelog-search.json";

/// Words of context around the first match in a snippet.
const SNIPPET_WORDS: usize = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexMeta {
    language: String,
}

/// Field handles of the article schema.
#[derive(Debug, Clone, Copy)]
struct Fields {
    url: Field,
    title: Field,
    content: Field,
    word_count: Field,
}

fn build_schema() -> (Schema, Fields) {
    let text = TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(TOKENIZER)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        )
        .set_stored();

    let mut builder = Schema::builder();
    let fields = Fields {
        url: builder.add_text_field("url", STRING | STORED),
        title: builder.add_text_field("title", text.clone()),
        content: builder.add_text_field("content", text),
        word_count: builder.add_u64_field("word_count", STORED),
    };
    (builder.build(), fields)
}

fn fields_of(schema: &Schema) -> Result<Fields, SearchError> {
    Ok(Fields {
        url: schema.get_field("url")?,
        title: schema.get_field("title")?,
        content: schema.get_field("content")?,
        word_count: schema.get_field("word_count")?,
    })
}

/// Stemmer for an ISO 639-1 code, if tantivy has one.
fn stemmer_language(code: &str) -> Option<Language> {
    let lang = match code.to_ascii_lowercase().split(['-', '_']).next()? {
        "ar" => Language::Arabic,
        "da" => Language::Danish,
        "de" => Language::German,
        "el" => Language::Greek,
        "en" => Language::English,
        "es" => Language::Spanish,
        "fi" => Language::Finnish,
        "fr" => Language::French,
        "hu" => Language::Hungarian,
        "it" => Language::Italian,
        "nl" => Language::Dutch,
        "no" | "nb" | "nn" => Language::Norwegian,
        "pt" => Language::Portuguese,
        "ro" => Language::Romanian,
        "ru" => Language::Russian,
        "sv" => Language::Swedish,
        "ta" => Language::Tamil,
        "tr" => Language::Turkish,
        _ => return None,
    };
    Some(lang)
}

fn register_tokenizer(index: &Index, language: &str) {
    let analyzer = match stemmer_language(language) {
        Some(lang) => TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(40))
            .filter(LowerCaser)
            .filter(Stemmer::new(lang))
            .build(),
        None => {
            warn!("No stemmer for language '{}'; indexing without stemming", language);
            TextAnalyzer::builder(SimpleTokenizer::default())
                .filter(RemoveLongFilter::limit(40))
                .filter(LowerCaser)
                .build()
        }
    };
    index.tokenizers().register(TOKENIZER, analyzer);
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SearchError + '_ {
    move |source| SearchError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Site URL of a page: `/` plus its path relative to the site root.
fn page_url(site_dir: &Path, page: &Path) -> String {
    let relative = page.strip_prefix(site_dir).unwrap_or(page);
    let joined = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    format!("/{joined}")
}

/// Build (or rebuild) the search index described by `config`.
///
/// # Errors
/// Fatal only: site directory missing, bad selectors or patterns, or the
/// index itself cannot be created or committed. A page that cannot be read
/// is logged and listed in [`IndexReport::failures`].
pub fn build_index(config: &SearchIndexConfig) -> Result<IndexReport, SearchError> {
    let start = Instant::now();
    info!("Starting search indexing of {}", config.site_dir.display());

    let extractor = PageExtractor::new(&config.root_selector, &config.exclude_selectors)?;
    let selection = select_pages(config)?;

    let index_dir = &config.index_dir;
    if index_dir.exists() {
        fs::remove_dir_all(index_dir).map_err(io_error(index_dir))?;
    }
    fs::create_dir_all(index_dir).map_err(io_error(index_dir))?;

    let (schema, fields) = build_schema();
    let index = Index::create_in_dir(index_dir, schema)?;
    register_tokenizer(&index, &config.force_language);
    let mut writer: IndexWriter = index.writer_with_num_threads(1, config.writer_memory_bytes)?;

    let mut indexed = Vec::with_capacity(selection.included.len());
    let mut failures = Vec::new();
    for path in &selection.included {
        let html = match fs::read_to_string(path) {
            Ok(html) => html,
            Err(e) => {
                error!("Failed to index {}: {}", path.display(), e);
                failures.push(PageFailure {
                    path: path.clone(),
                    detail: e.to_string(),
                });
                continue;
            }
        };

        let page = extractor.extract(&html);
        let url = page_url(&config.site_dir, path);
        if page.used_fallback {
            warn!(
                "No element matches '{}' in {}; indexed <body> instead",
                config.root_selector, url
            );
        }

        writer.add_document(doc!(
            fields.url => url.as_str(),
            fields.title => page.title.as_str(),
            fields.content => page.content.as_str(),
            fields.word_count => page.word_count as u64
        ))?;
        info!("Indexed: {} ({} words)", url, page.word_count);
        indexed.push(IndexedPage {
            url,
            title: page.title,
            word_count: page.word_count,
        });
    }

    writer.commit()?;
    let meta = IndexMeta {
        language: config.force_language.clone(),
    };
    let meta_path = index_dir.join(META_FILE);
    let meta_json = serde_json::to_string_pretty(&meta)
        .map_err(|e| SearchError::InvalidConfig(format!("index metadata: {e}")))?;
    fs::write(&meta_path, meta_json).map_err(io_error(&meta_path))?;

    let total_documents = index.reader()?.searcher().num_docs();
    info!("Indexing complete! Indexed {} article pages.", indexed.len());
    info!("Total documents in index: {}", total_documents);

    Ok(IndexReport {
        site_dir: config.site_dir.clone(),
        index_dir: index_dir.clone(),
        indexed,
        excluded: selection.excluded.into_iter().map(|(p, _)| p).collect(),
        failures,
        total_documents,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// A built index opened for querying.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    fields: Fields,
    path: PathBuf,
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex")
            .field("path", &self.path)
            .finish()
    }
}

impl SearchIndex {
    /// Open the index at `index_dir`.
    pub fn open(index_dir: impl AsRef<Path>) -> Result<Self, SearchError> {
        let path = index_dir.as_ref().to_path_buf();
        if !path.join("meta.json").exists() {
            return Err(SearchError::IndexNotFound { path });
        }

        let index = Index::open_in_dir(&path)?;
        let language = match fs::read_to_string(path.join(META_FILE)) {
            Ok(text) => serde_json::from_str::<IndexMeta>(&text)
                .map(|m| m.language)
                .unwrap_or_else(|e| {
                    warn!("Unreadable {}: {}; assuming English", META_FILE, e);
                    "en".to_string()
                }),
            Err(_) => {
                debug!("No {} in {}; assuming English", META_FILE, path.display());
                "en".to_string()
            }
        };
        register_tokenizer(&index, &language);

        let fields = fields_of(&index.schema())?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            fields,
            path,
        })
    }

    /// Number of pages in the index.
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Run `query` against titles and content; best hits first.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        let mut parser =
            QueryParser::for_index(&self.index, vec![self.fields.title, self.fields.content]);
        parser.set_field_boost(self.fields.title, 2.0);
        let parsed = parser
            .parse_query(query)
            .map_err(|e| SearchError::InvalidQuery {
                query: query.to_string(),
                detail: e.to_string(),
            })?;

        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&parsed, &TopDocs::with_limit(limit.max(1)))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let content = get_text_field(&doc, self.fields.content).unwrap_or_default();
            hits.push(SearchHit {
                url: get_text_field(&doc, self.fields.url).unwrap_or_default(),
                title: get_text_field(&doc, self.fields.title).unwrap_or_default(),
                score,
                word_count: doc
                    .get_first(self.fields.word_count)
                    .and_then(|v| v.as_u64())
                    .unwrap_or_default(),
                snippet: snippet(&content, query),
            });
        }
        Ok(hits)
    }
}

fn get_text_field(doc: &TantivyDocument, field: Field) -> Option<String> {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .map(String::from)
}

/// A window of words around the first word containing a query term, or the
/// opening words of the page when nothing matches literally.
fn snippet(content: &str, query: &str) -> String {
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(str::to_lowercase)
        .collect();
    let words: Vec<&str> = content.split_whitespace().collect();

    let hit = words.iter().position(|w| {
        let w = w.to_lowercase();
        terms.iter().any(|t| w.contains(t.as_str()))
    });
    let start = hit.map(|i| i.saturating_sub(SNIPPET_WORDS / 4)).unwrap_or(0);
    let end = (start + SNIPPET_WORDS).min(words.len());

    let mut out = String::new();
    if start > 0 {
        out.push_str("...");
    }
    out.push_str(&words[start..end].join(" "));
    if end < words.len() {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_url_is_rooted() {
        assert_eq!(
            page_url(Path::new("output"), Path::new("output/hello.html")),
            "/hello.html"
        );
        assert_eq!(
            page_url(Path::new("output"), Path::new("output/tag/rust.html")),
            "/tag/rust.html"
        );
    }

    #[test]
    fn stemmer_languages() {
        assert!(matches!(stemmer_language("en"), Some(Language::English)));
        assert!(matches!(stemmer_language("pt-BR"), Some(Language::Portuguese)));
        assert!(stemmer_language("ja").is_none());
    }

    #[test]
    fn snippet_centres_on_match() {
        let content = (0..100).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let s = snippet(&content, "w50");
        assert!(s.starts_with("...w43 "), "{s}");
        assert!(s.ends_with("..."));
        assert_eq!(s.trim_matches('.').split_whitespace().count(), SNIPPET_WORDS);
    }

    #[test]
    fn snippet_without_match_starts_at_beginning() {
        let s = snippet("short page text", "zzz");
        assert_eq!(s, "short page text");
    }

    #[test]
    fn open_missing_index_fails() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            SearchIndex::open(tmp.path().join("nope")),
            Err(SearchError::IndexNotFound { .. })
        ));
    }
}
