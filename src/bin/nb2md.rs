//! CLI binary for converting the blog's notebooks into articles.
//!
//! A thin shim over the library crate that maps CLI flags (falling back to
//! `site.toml`) onto `ConversionConfig` and prints the run report.

use anyhow::{Context, Result};
use clap::Parser;
use codelog::{
    convert, ConversionConfig, ConversionProgressCallback, ProgressCallback, RunReport,
    SiteConfig, SlugCollisionPolicy,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar with one log line per notebook. Notebooks finish out of
/// order, so start times are keyed by name.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` reports how many notebooks there are.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Cleaning previous articles…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            skipped: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} notebooks  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, name: &str) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(name))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_notebooks: usize) {
        self.activate_bar(total_notebooks);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_notebooks} notebooks…"))
        ));
    }

    fn on_notebook_start(&self, name: &str) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(name.to_string(), Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_notebook_complete(&self, name: &str, slug: &str, body_len: usize) {
        let secs = self.elapsed_secs(name);
        self.bar.println(format!(
            "  {} {:<40} → {:<32}  {}  {}",
            green("✓"),
            name,
            slug,
            dim(&format!("{body_len:>6} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_notebook_skipped(&self, name: &str, error: &str) {
        let secs = self.elapsed_secs(name);
        self.skipped.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:<40}  {}  {}",
            red("✗"),
            name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_notebooks: usize, converted: usize) {
        let skipped = total_notebooks.saturating_sub(converted);
        self.bar.finish_and_clear();

        if skipped == 0 {
            eprintln!(
                "{} {} notebooks converted",
                green("✔"),
                bold(&converted.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} notebooks converted  ({} skipped)",
                if converted == 0 { red("✘") } else { cyan("⚠") },
                bold(&converted.to_string()),
                total_notebooks,
                red(&skipped.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert content/notebooks/*.ipynb into content/*.md (settings from site.toml)
  nb2md

  # Explicit directories
  nb2md --notebooks drafts/notebooks --output drafts

  # Keep the existing articles and refuse duplicate slugs
  nb2md --no-clean --on-slug-collision fail

  # Machine-readable report
  nb2md --json > report.json

NOTEBOOK LAYOUT:
  The first cell must be a raw cell of `Key: Value` lines, e.g.

    Title: Hello World
    Date: 2024-01-15
    Category: Rust

  Title and Date are required. Slug is derived from them when absent
  (hello-world-2024). Images land in <output>/images/<slug>/ and are linked
  as {static}/images/<slug>/<file>.

ENVIRONMENT VARIABLES:
  RUST_LOG                Overrides the log filter (e.g. codelog=debug)
  NB2MD_*                 Every flag, e.g. NB2MD_CONCURRENCY=4
"#;

#[derive(Parser, Debug)]
#[command(
    name = "nb2md",
    version,
    about = "Convert Jupyter notebooks into Markdown articles for the blog",
    long_about = "Convert every notebook in the notebook directory into a Markdown article \
with a Pelican metadata header. Images referenced by markdown cells, cell attachments and \
image outputs of code cells are written next to the article under images/<slug>/. Notebooks \
that cannot be converted are reported and skipped; the rest of the run carries on.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory holding the `*.ipynb` files. Default: `<content_path>/<notebook_subdir>`.
    #[arg(long, env = "NB2MD_NOTEBOOKS")]
    notebooks: Option<PathBuf>,

    /// Directory the articles are written to. Default: `content_path`.
    #[arg(short, long, env = "NB2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// Image folder inside the output directory. Default: first static path.
    #[arg(long, env = "NB2MD_IMAGE_SUBDIR")]
    image_subdir: Option<String>,

    #[arg(long, env = "NB2MD_STATIC_REF", default_value = "{static}")]
    static_ref: String,

    #[arg(long, env = "NB2MD_EXTENSION", default_value = "md")]
    extension: String,

    /// Site settings; built-in defaults are used when the file does not exist.
    #[arg(long, env = "NB2MD_SITE_CONFIG", default_value = SiteConfig::FILE_NAME)]
    site_config: PathBuf,

    /// Notebooks converted at once. Default: number of CPUs.
    #[arg(short, long, env = "NB2MD_CONCURRENCY")]
    concurrency: Option<usize>,

    #[arg(long, env = "NB2MD_ON_SLUG_COLLISION", value_enum, default_value = "suffix")]
    on_slug_collision: CollisionArg,

    /// Keep existing articles and image folders.
    #[arg(long, env = "NB2MD_NO_CLEAN")]
    no_clean: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long, env = "NB2MD_JSON")]
    json: bool,

    #[arg(long, env = "NB2MD_NO_PROGRESS")]
    no_progress: bool,

    #[arg(short, long, env = "NB2MD_VERBOSE")]
    verbose: bool,

    #[arg(short, long, env = "NB2MD_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum CollisionArg {
    Suffix,
    Fail,
}

impl From<CollisionArg> for SlugCollisionPolicy {
    fn from(v: CollisionArg) -> Self {
        match v {
            CollisionArg::Suffix => SlugCollisionPolicy::Suffix,
            CollisionArg::Fail => SlugCollisionPolicy::Fail,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces the per-notebook INFO lines.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, &site, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let report = convert(&config).await.context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&report, &config);
    }

    Ok(())
}

fn build_config(
    cli: &Cli,
    site: &SiteConfig,
    progress_cb: Option<ProgressCallback>,
) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .notebook_dir(cli.notebooks.clone().unwrap_or_else(|| site.notebook_dir()))
        .output_dir(cli.output.clone().unwrap_or_else(|| site.content_path.clone()))
        .image_subdir(
            cli.image_subdir
                .clone()
                .unwrap_or_else(|| site.image_subdir().to_string()),
        )
        .static_ref(&cli.static_ref)
        .extension(&cli.extension)
        .slug_collision(cli.on_slug_collision.into())
        .clean_outputs(!cli.no_clean);

    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(report: &RunReport, config: &ConversionConfig) {
    for nb in &report.notebooks {
        for warning in &nb.warnings {
            eprintln!("  {} {}: {}", yellow("!"), nb.name(), warning);
        }
    }

    let stats = &report.stats;
    eprintln!(
        "{}  {}/{} notebooks  {} assets  {}ms  →  {}",
        if stats.skipped == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        stats.converted,
        stats.total_notebooks,
        stats.assets_written,
        stats.total_duration_ms,
        bold(&config.output_dir.display().to_string()),
    );
    if stats.cleaned_files > 0 || stats.asset_warnings > 0 {
        eprintln!(
            "   {} stale articles removed  /  {} asset warnings",
            dim(&stats.cleaned_files.to_string()),
            dim(&stats.asset_warnings.to_string()),
        );
    }
}
