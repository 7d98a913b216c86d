//! Filesystem side of a run: pre-run cleanup, code-output images, articles.
//!
//! Articles are written atomically (temp file in the same directory, then
//! rename) so the site generator never picks up a half-written file when it
//! runs in watch mode next to the converter.

use crate::error::{AssetError, ConvertError, NotebookError};
use crate::pipeline::metadata::Metadata;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Delete `*.<extension>` files directly inside `dir` (not recursive).
///
/// Returns how many were removed. A missing `dir` counts as nothing to clean.
pub fn clean_articles(dir: &Path, extension: &str) -> Result<usize, ConvertError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(source) => {
            return Err(ConvertError::CleanupFailed {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut removed = 0;
    for entry in entries {
        let path = entry
            .map_err(|source| ConvertError::CleanupFailed {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        let matches = path.is_file() && path.extension().is_some_and(|e| e == extension);
        if !matches {
            continue;
        }
        fs::remove_file(&path).map_err(|source| ConvertError::CleanupFailed {
            path: path.clone(),
            source,
        })?;
        debug!("Removed stale article {}", path.display());
        removed += 1;
    }

    info!(
        "Cleaned {} old .{} files from {}",
        removed,
        extension,
        dir.display()
    );
    Ok(removed)
}

/// Remove every subdirectory of `asset_root`; plain files are kept.
pub fn clear_slug_dirs(asset_root: &Path) -> Result<usize, ConvertError> {
    let entries = match fs::read_dir(asset_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(source) => {
            return Err(ConvertError::CleanupFailed {
                path: asset_root.to_path_buf(),
                source,
            })
        }
    };

    let mut removed = 0;
    for entry in entries {
        let path = entry
            .map_err(|source| ConvertError::CleanupFailed {
                path: asset_root.to_path_buf(),
                source,
            })?
            .path();
        if path.is_dir() {
            fs::remove_dir_all(&path).map_err(|source| ConvertError::CleanupFailed {
                path: path.clone(),
                source,
            })?;
            removed += 1;
        }
    }
    debug!("Cleared {} image folders in {}", removed, asset_root.display());
    Ok(removed)
}

/// Write code-output images below `output_dir`, creating parent directories.
///
/// Returns the written paths and a warning per file that could not be written.
pub fn write_outputs(
    output_dir: &Path,
    outputs: &BTreeMap<PathBuf, Vec<u8>>,
) -> (Vec<PathBuf>, Vec<AssetError>) {
    let mut written = Vec::with_capacity(outputs.len());
    let mut warnings = Vec::new();

    for (relative, bytes) in outputs {
        let dest = output_dir.join(relative);
        let result = match dest.parent() {
            Some(parent) => fs::create_dir_all(parent),
            None => Ok(()),
        }
        .and_then(|_| fs::write(&dest, bytes));

        match result {
            Ok(()) => {
                info!("Image saved to {}", dest.display());
                written.push(dest);
            }
            Err(e) => {
                let warning = AssetError::WriteFailed {
                    dest,
                    detail: e.to_string(),
                };
                warn!("{}", warning);
                warnings.push(warning);
            }
        }
    }

    (written, warnings)
}

/// Article text: header lines, one blank line, body.
pub fn compose_article(meta: &Metadata, body: &str) -> String {
    format!("{}\n\n{}", meta.to_header(), body)
}

/// Write `contents` to `path` atomically (temp file + rename).
pub fn write_article(path: &Path, contents: &str) -> Result<(), NotebookError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| write_failed(path, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| write_failed(path, e))?;
    tmp.write_all(contents.as_bytes())
        .map_err(|e| write_failed(path, e))?;
    tmp.persist(path).map_err(|e| write_failed(path, e.error))?;

    info!("Markdown file saved to {}", path.display());
    Ok(())
}

fn write_failed(path: &Path, e: impl std::fmt::Display) -> NotebookError {
    NotebookError::WriteFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    }
}
