//! CLI binary for the article search index.
//!
//! Builds the index over the rendered site, or with `--query` searches an
//! index built earlier.

use anyhow::{Context, Result};
use clap::Parser;
use codelog::{build_index, IndexReport, SearchHit, SearchIndex, SearchIndexConfig, SiteConfig};
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Index output/ into output/search-index (settings from site.toml)
  codelog-search

  # Index another build, keeping category and tag pages
  codelog-search --site public --include-subdirs

  # Query the index
  codelog-search --query "async runtime" --limit 5

SELECTION:
  Only top-level *.html pages are indexed; index.html, index<N>.html,
  archives.html, authors.html, categories.html and tags.html are skipped.
  Text is taken from the element matching --root-selector, without the
  nav, header, footer and aside regions inside it.
"#;

#[derive(Parser, Debug)]
#[command(
    name = "codelog-search",
    version,
    about = "Build or query the full-text search index of the rendered blog",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Rendered site. Default: `output_path` from the site config.
    #[arg(long, env = "CODELOG_SEARCH_SITE")]
    site: Option<PathBuf>,

    /// Index directory. Default: `<site>/search-index`.
    #[arg(long, env = "CODELOG_SEARCH_INDEX")]
    index: Option<PathBuf>,

    #[arg(long, env = "CODELOG_SEARCH_SITE_CONFIG", default_value = SiteConfig::FILE_NAME)]
    site_config: PathBuf,

    #[arg(long, env = "CODELOG_SEARCH_ROOT_SELECTOR", default_value = "#content")]
    root_selector: String,

    /// Region left out of the index; repeat for several. Replaces the defaults.
    #[arg(long = "exclude-selector", value_name = "SELECTOR")]
    exclude_selectors: Vec<String>,

    /// File-name glob never indexed; repeat for several. Added to the defaults.
    #[arg(long = "exclude-file", value_name = "GLOB")]
    exclude_files: Vec<String>,

    /// Stemming language. Default: `default_lang` from the site config.
    #[arg(long, env = "CODELOG_SEARCH_LANGUAGE")]
    language: Option<String>,

    /// Also index pages in subdirectories of the site.
    #[arg(long)]
    include_subdirs: bool,

    /// Search an existing index instead of building one.
    #[arg(long)]
    query: Option<String>,

    #[arg(long, default_value_t = 10)]
    limit: usize,

    #[arg(long, env = "CODELOG_SEARCH_JSON")]
    json: bool,

    #[arg(short, long)]
    verbose: bool,

    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let site = SiteConfig::load_or_default(&cli.site_config).with_context(|| {
        format!(
            "Failed to load site config {}",
            cli.site_config.display()
        )
    })?;

    let site_dir = cli.site.clone().unwrap_or_else(|| site.output_path.clone());
    let index_dir = match (&cli.index, &cli.site) {
        (Some(index), _) => index.clone(),
        (None, Some(site_dir)) => site_dir.join("search-index"),
        (None, None) => site.search_index_dir(),
    };

    if let Some(query) = &cli.query {
        return run_query(&cli, &index_dir, query);
    }

    let defaults = SearchIndexConfig::default();
    let exclude_selectors = if cli.exclude_selectors.is_empty() {
        defaults.exclude_selectors
    } else {
        cli.exclude_selectors.clone()
    };
    let mut exclude_files = defaults.exclude_files;
    exclude_files.extend(cli.exclude_files.iter().cloned());

    let config = SearchIndexConfig::builder()
        .site_dir(site_dir)
        .index_dir(index_dir)
        .root_selector(&cli.root_selector)
        .exclude_selectors(exclude_selectors)
        .exclude_files(exclude_files)
        .force_language(cli.language.clone().unwrap_or(site.default_lang))
        .top_level_only(!cli.include_subdirs)
        .build()
        .context("Invalid configuration")?;

    let report = build_index(&config).context("Indexing failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_report(&report);
    }
    Ok(())
}

fn run_query(cli: &Cli, index_dir: &Path, query: &str) -> Result<()> {
    let index = SearchIndex::open(index_dir)
        .with_context(|| format!("Failed to open index {}", index_dir.display()))?;
    let hits = index.search(query, cli.limit).context("Search failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&hits).context("Failed to serialise results")?;
        println!("{json}");
    } else {
        print_hits(&hits, query);
    }
    Ok(())
}

fn print_report(report: &IndexReport) {
    for failure in &report.failures {
        eprintln!(
            "  {} {}  {}",
            red("✗"),
            failure.path.display(),
            red(&failure.detail)
        );
    }
    eprintln!(
        "{}  {} article pages  ({} excluded)  {}ms  →  {}",
        if report.failures.is_empty() {
            green("✔")
        } else {
            red("⚠")
        },
        bold(&report.indexed.len().to_string()),
        report.excluded.len(),
        report.duration_ms,
        bold(&report.index_dir.display().to_string()),
    );
    eprintln!(
        "   {}",
        dim(&format!("{} documents in index", report.total_documents))
    );
}

fn print_hits(hits: &[SearchHit], query: &str) {
    if hits.is_empty() {
        eprintln!("No results for {}", bold(query));
        return;
    }
    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{:>2}. {}  {}  {}",
            rank + 1,
            bold(&hit.title),
            hit.url,
            dim(&format!("{:.2}", hit.score))
        );
        if !hit.snippet.is_empty() {
            println!("    {}", dim(&hit.snippet));
        }
    }
}
