//! Eager (whole-run) conversion entry points.
//!
//! [`convert`] waits for every notebook and returns one [`RunReport`]. Use
//! [`crate::stream::convert_stream`] instead to receive results as each
//! notebook finishes.
//!
//! A run has two phases. Planning is sequential: validate directories, clean
//! stale outputs, load every notebook, extract its metadata and settle slug
//! collisions. Rendering is concurrent: each notebook that survived planning
//! is rendered and written on the blocking pool, bounded by
//! [`ConversionConfig::concurrency`]. Because slugs are settled before any
//! task starts, no two tasks ever write to the same path.

use crate::config::{ConversionConfig, SlugCollisionPolicy};
use crate::error::{ConvertError, NotebookError};
use crate::notebook::Notebook;
use crate::output::{NotebookResult, RunReport};
use crate::pipeline::metadata::{self, Metadata};
use crate::pipeline::relocate::TransformContext;
use crate::pipeline::render::{MarkdownRenderer, OutputTemplate};
use crate::pipeline::write;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert every notebook in `config.notebook_dir`.
///
/// # Returns
/// `Ok(RunReport)` whenever the run itself could proceed, even if some or
/// all notebooks were skipped (check `report.stats.skipped` and each
/// result's `error`).
///
/// # Errors
/// Returns `Err(ConvertError)` only for fatal errors:
/// - notebook directory missing or unreadable
/// - output directories cannot be created or cleaned
/// - a conversion task panicked
pub async fn convert(config: &ConversionConfig) -> Result<RunReport, ConvertError> {
    let total_start = Instant::now();
    info!(
        "Starting conversion: {} → {}",
        config.notebook_dir.display(),
        config.output_dir.display()
    );

    // ── Phase 1: plan ────────────────────────────────────────────────────
    let config = Arc::new(config.clone());
    let plan = {
        let config = Arc::clone(&config);
        tokio::task::spawn_blocking(move || plan_run(&config))
            .await
            .map_err(|e| ConvertError::Internal(format!("Planning task panicked: {}", e)))??
    };
    let total = plan.total();
    let RunPlan {
        cleaned_files,
        ready,
        mut skipped,
    } = plan;

    // ── Phase 2: render + write ──────────────────────────────────────────
    let converted: Vec<NotebookResult> = stream::iter(ready.into_iter().map(|prepared| {
        let config = Arc::clone(&config);
        async move {
            tokio::task::spawn_blocking(move || process_notebook(prepared, &config))
                .await
                .map_err(|e| ConvertError::Internal(format!("Notebook task panicked: {}", e)))
        }
    }))
    .buffer_unordered(config.concurrency)
    .collect::<Vec<_>>()
    .await
    .into_iter()
    .collect::<Result<_, _>>()?;

    skipped.extend(converted);
    let report = RunReport::from_results(
        skipped,
        cleaned_files,
        total_start.elapsed().as_millis() as u64,
    );

    info!(
        "Conversion complete: {}/{} notebooks, {} images, {}ms total",
        report.stats.converted,
        total,
        report.stats.assets_written,
        report.stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(total, report.stats.converted);
    }

    Ok(report)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(config: &ConversionConfig) -> Result<RunReport, ConvertError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(config))
}

/// Convert one notebook without touching other articles.
///
/// Stale `*.<ext>` files are not removed. With `clean_outputs` set, only
/// this notebook's own image folder is cleared before writing.
pub async fn convert_notebook(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<NotebookResult, ConvertError> {
    let path = path.as_ref().to_path_buf();
    let config = config.clone();
    tokio::task::spawn_blocking(move || {
        ensure_dir(&config.output_dir)?;
        ensure_dir(&config.asset_root())?;
        let result = match prepare_notebook(&path) {
            Ok(prepared) => {
                if config.clean_outputs {
                    clear_own_images(&config, prepared.meta.slug());
                }
                process_notebook(prepared, &config)
            }
            Err(skipped) => {
                notify_skipped(&config, &skipped);
                skipped
            }
        };
        Ok::<_, ConvertError>(result)
    })
    .await
    .map_err(|e| ConvertError::Internal(format!("Notebook task panicked: {}", e)))?
}

// ── Planning ─────────────────────────────────────────────────────────────

/// A notebook whose metadata has been extracted and whose slug is final.
pub(crate) struct PreparedNotebook {
    pub path: PathBuf,
    pub notebook: Notebook,
    pub meta: Metadata,
}

/// Everything decided before rendering starts.
pub(crate) struct RunPlan {
    pub cleaned_files: usize,
    pub ready: Vec<PreparedNotebook>,
    pub skipped: Vec<NotebookResult>,
}

impl RunPlan {
    pub fn total(&self) -> usize {
        self.ready.len() + self.skipped.len()
    }
}

/// Validate, clean, load and settle slugs. Blocking.
///
/// Fires `on_run_start` and one `on_notebook_skipped` per notebook rejected
/// during planning.
pub(crate) fn plan_run(config: &ConversionConfig) -> Result<RunPlan, ConvertError> {
    if !config.notebook_dir.is_dir() {
        return Err(ConvertError::NotebookDirNotFound {
            path: config.notebook_dir.clone(),
        });
    }
    ensure_dir(&config.output_dir)?;
    let asset_root = config.asset_root();
    ensure_dir(&asset_root)?;

    let cleaned_files = if config.clean_outputs {
        let removed = write::clean_articles(&config.output_dir, &config.extension)?;
        write::clear_slug_dirs(&asset_root)?;
        removed
    } else {
        0
    };

    let paths = list_notebooks(&config.notebook_dir)?;
    info!("Found {} notebooks in {}", paths.len(), config.notebook_dir.display());

    let mut ready = Vec::with_capacity(paths.len());
    let mut skipped = Vec::new();
    for path in paths {
        match prepare_notebook(&path) {
            Ok(prepared) => ready.push(prepared),
            Err(result) => skipped.push(result),
        }
    }

    let (ready, collided) = resolve_slugs(ready, config.slug_collision);
    skipped.extend(collided);

    let plan = RunPlan {
        cleaned_files,
        ready,
        skipped,
    };
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(plan.total());
    }
    for result in &plan.skipped {
        notify_skipped(config, result);
    }
    Ok(plan)
}

/// `*.ipynb` files directly inside `dir`, sorted by path.
pub(crate) fn list_notebooks(dir: &Path) -> Result<Vec<PathBuf>, ConvertError> {
    let pattern = format!(
        "{}/*.ipynb",
        glob::Pattern::escape(&dir.display().to_string())
    );
    let entries = glob::glob(&pattern).map_err(|e| ConvertError::ListFailed {
        path: dir.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()),
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ConvertError::ListFailed {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Load a notebook and pull out its metadata cell.
pub(crate) fn prepare_notebook(path: &Path) -> Result<PreparedNotebook, NotebookResult> {
    let name = file_name(path);
    let skip = |error: NotebookError| {
        warn!("Skipping {}: {}", name, error);
        NotebookResult::skipped(path.to_path_buf(), None, error)
    };

    let mut notebook = Notebook::from_path(path).map_err(skip)?;
    let meta = metadata::extract_metadata(&mut notebook.cells, &name).map_err(skip)?;
    debug!("{} → slug '{}'", name, meta.slug());

    Ok(PreparedNotebook {
        path: path.to_path_buf(),
        notebook,
        meta,
    })
}

/// Make slugs unique across the run, in notebook path order.
///
/// Every slug a notebook asked for is reserved before any suffix is picked,
/// so a generated `-N` never lands on another notebook's own slug.
///
/// Returns the notebooks that may proceed and results for those rejected
/// under [`SlugCollisionPolicy::Fail`].
pub(crate) fn resolve_slugs(
    prepared: Vec<PreparedNotebook>,
    policy: SlugCollisionPolicy,
) -> (Vec<PreparedNotebook>, Vec<NotebookResult>) {
    let mut claimed: HashMap<String, String> = HashMap::new();
    let mut taken: HashSet<String> = prepared
        .iter()
        .map(|nb| nb.meta.slug().to_string())
        .collect();
    let mut ready = Vec::with_capacity(prepared.len());
    let mut rejected = Vec::new();

    for mut nb in prepared {
        let name = file_name(&nb.path);
        let slug = nb.meta.slug().to_string();

        let Some(owner) = claimed.get(&slug).cloned() else {
            claimed.insert(slug, name);
            ready.push(nb);
            continue;
        };

        match policy {
            SlugCollisionPolicy::Suffix => {
                let unique = (2..)
                    .map(|n| format!("{}-{}", slug, n))
                    .find(|candidate| !taken.contains(candidate))
                    .unwrap_or_default();
                warn!(
                    "Slug '{}' of {} is already used by {}; writing as '{}'",
                    slug, name, owner, unique
                );
                nb.meta.insert(metadata::SLUG, unique.clone());
                taken.insert(unique.clone());
                claimed.insert(unique, name);
                ready.push(nb);
            }
            SlugCollisionPolicy::Fail => {
                let error = NotebookError::SlugCollision {
                    slug: slug.clone(),
                    claimed_by: owner,
                };
                warn!("Skipping {}: {}", name, error);
                rejected.push(NotebookResult::skipped(nb.path, Some(slug), error));
            }
        }
    }

    (ready, rejected)
}

// ── Rendering ────────────────────────────────────────────────────────────

/// Render one prepared notebook and write its images and article. Blocking.
pub(crate) fn process_notebook(prepared: PreparedNotebook, config: &ConversionConfig) -> NotebookResult {
    let start = Instant::now();
    let PreparedNotebook {
        path,
        notebook,
        meta,
    } = prepared;
    let name = file_name(&path);
    let slug = meta.slug().to_string();

    info!("Processing: {}", name);
    if let Some(ref cb) = config.progress_callback {
        cb.on_notebook_start(&name);
    }

    let mut ctx = TransformContext::new(
        &path,
        slug.clone(),
        config.asset_root(),
        config.asset_url_prefix(),
    );
    let template = OutputTemplate::new(&config.image_subdir, &slug, &config.unique_key);
    let rendered = MarkdownRenderer::default().render(notebook, &template, &mut ctx);

    let (written, warnings) = write::write_outputs(&config.output_dir, &rendered.outputs);
    ctx.assets.extend(written);
    ctx.warnings.extend(warnings);

    let output_path = config.output_dir.join(config.article_file_name(&slug));
    let outcome = write::write_article(&output_path, &write::compose_article(&meta, &rendered.body));

    let result = NotebookResult {
        source: path,
        slug: Some(slug),
        output_path: outcome.is_ok().then(|| output_path.clone()),
        assets: ctx.assets,
        warnings: ctx.warnings,
        error: outcome.err(),
        duration_ms: start.elapsed().as_millis() as u64,
    };

    match result.error {
        None => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_notebook_complete(&name, result.slug.as_deref().unwrap_or_default(), rendered.body.len());
            }
        }
        Some(_) => notify_skipped(config, &result),
    }
    result
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn ensure_dir(dir: &Path) -> Result<(), ConvertError> {
    fs::create_dir_all(dir).map_err(|source| ConvertError::CreateDirFailed {
        path: dir.to_path_buf(),
        source,
    })
}

fn clear_own_images(config: &ConversionConfig, slug: &str) {
    let dir = config.asset_root().join(slug);
    match fs::remove_dir_all(&dir) {
        Ok(()) => debug!("Cleared {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not clear {}: {}", dir.display(), e),
    }
}

fn notify_skipped(config: &ConversionConfig, result: &NotebookResult) {
    if let (Some(cb), Some(error)) = (&config.progress_callback, &result.error) {
        cb.on_notebook_skipped(&result.name(), &error.to_string());
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook::{Cell, CellType};

    fn prepared(path: &str, slug: &str) -> PreparedNotebook {
        let mut cells = vec![Cell::new(
            CellType::Raw,
            format!("Title: {slug}\nDate: 2024\nSlug: {slug}"),
        )];
        let meta = metadata::extract_metadata(&mut cells, path).unwrap();
        PreparedNotebook {
            path: PathBuf::from(path),
            notebook: Notebook::from_json(r#"{"cells": []}"#).unwrap(),
            meta,
        }
    }

    #[test]
    fn suffix_policy_renames_later_duplicates() {
        let (ready, rejected) = resolve_slugs(
            vec![
                prepared("a.ipynb", "post"),
                prepared("b.ipynb", "post"),
                prepared("c.ipynb", "post"),
                prepared("d.ipynb", "other"),
            ],
            SlugCollisionPolicy::Suffix,
        );
        assert!(rejected.is_empty());
        let slugs: Vec<&str> = ready.iter().map(|p| p.meta.slug()).collect();
        assert_eq!(slugs, vec!["post", "post-2", "post-3", "other"]);
        assert!(ready[1].meta.to_header().contains("Slug: post-2"));
    }

    #[test]
    fn suffix_skips_slugs_already_taken() {
        let (ready, _) = resolve_slugs(
            vec![
                prepared("a.ipynb", "post"),
                prepared("b.ipynb", "post-2"),
                prepared("c.ipynb", "post"),
            ],
            SlugCollisionPolicy::Suffix,
        );
        let slugs: Vec<&str> = ready.iter().map(|p| p.meta.slug()).collect();
        assert_eq!(slugs, vec!["post", "post-2", "post-3"]);
    }

    #[test]
    fn suffix_never_takes_a_later_notebooks_slug() {
        let (ready, rejected) = resolve_slugs(
            vec![
                prepared("a.ipynb", "post"),
                prepared("b.ipynb", "post"),
                prepared("c.ipynb", "post-2"),
            ],
            SlugCollisionPolicy::Suffix,
        );
        assert!(rejected.is_empty());
        let slugs: Vec<(&str, &str)> = ready
            .iter()
            .map(|p| (p.path.to_str().unwrap(), p.meta.slug()))
            .collect();
        assert_eq!(
            slugs,
            vec![("a.ipynb", "post"), ("b.ipynb", "post-3"), ("c.ipynb", "post-2")]
        );
    }

    #[test]
    fn fail_policy_rejects_later_duplicates() {
        let (ready, rejected) = resolve_slugs(
            vec![prepared("a.ipynb", "post"), prepared("b.ipynb", "post")],
            SlugCollisionPolicy::Fail,
        );
        assert_eq!(ready.len(), 1);
        assert_eq!(rejected.len(), 1);
        assert_eq!(
            rejected[0].error,
            Some(NotebookError::SlugCollision {
                slug: "post".into(),
                claimed_by: "a.ipynb".into()
            })
        );
    }

    #[test]
    fn list_notebooks_sorted_and_filtered() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["b.ipynb", "a.ipynb", "notes.txt"] {
            fs::write(tmp.path().join(name), "{}").unwrap();
        }
        fs::create_dir(tmp.path().join("dir.ipynb")).unwrap();

        let paths = list_notebooks(tmp.path()).unwrap();
        let names: Vec<String> = paths.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["a.ipynb", "b.ipynb"]);
    }

    #[test]
    fn missing_notebook_dir_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ConversionConfig::builder()
            .notebook_dir(tmp.path().join("missing"))
            .output_dir(tmp.path().join("out"))
            .build()
            .unwrap();
        assert!(matches!(
            plan_run(&config),
            Err(ConvertError::NotebookDirNotFound { .. })
        ));
    }
}
