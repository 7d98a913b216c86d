//! Asset relocation: move images referenced by markdown cells into the
//! site's static tree and point the links at their new home.
//!
//! Two transforms exist because notebooks reference images two ways:
//!
//! | Transform | Source form | Bytes come from |
//! |-----------|-------------|-----------------|
//! | [`RelativeImageRelocator`] | `![alt](img/plot.png)` | a file next to the notebook |
//! | [`AttachmentRelocator`] | `![alt](attachment:cat.png)` | base64 inside the cell |
//!
//! Both write to `<asset-root>/<slug>/<uuid>.<ext>` and rewrite the link to
//! `<static-ref>/<image-subdir>/<slug>/<uuid>.<ext>`. Random names mean two
//! notebooks can both embed `figure.png` without overwriting each other.
//!
//! A failed image never fails the notebook: the link is left as it was and
//! an [`AssetError`] is recorded in the [`TransformContext`].

use crate::error::AssetError;
use crate::notebook::Cell;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Per-notebook state shared by every transform.
#[derive(Debug, Clone)]
pub struct TransformContext {
    /// Directory containing the notebook; relative links resolve against it.
    pub notebook_dir: PathBuf,
    /// Notebook file name, for log lines.
    pub notebook_name: String,
    pub slug: String,
    /// `<output>/<image-subdir>`.
    pub asset_root: PathBuf,
    /// `<static-ref>/<image-subdir>`.
    pub url_prefix: String,
    /// Files written so far.
    pub assets: Vec<PathBuf>,
    /// References that could not be relocated.
    pub warnings: Vec<AssetError>,
}

impl TransformContext {
    pub fn new(
        notebook_path: &Path,
        slug: impl Into<String>,
        asset_root: impl Into<PathBuf>,
        url_prefix: impl Into<String>,
    ) -> Self {
        Self {
            notebook_dir: notebook_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
            notebook_name: notebook_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            slug: slug.into(),
            asset_root: asset_root.into(),
            url_prefix: url_prefix.into(),
            assets: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// `<asset-root>/<slug>`.
    pub fn slug_dir(&self) -> PathBuf {
        self.asset_root.join(&self.slug)
    }

    /// Site URL of a file inside the slug directory.
    pub fn asset_url(&self, file_name: &str) -> String {
        format!("{}/{}/{}", self.url_prefix, self.slug, file_name)
    }

    /// Create the slug directory if needed and return the destination path
    /// for `file_name`. Safe to race with other notebooks.
    fn prepare_dest(&self, file_name: &str) -> std::io::Result<PathBuf> {
        let dir = self.slug_dir();
        fs::create_dir_all(&dir)?;
        Ok(dir.join(file_name))
    }

    fn record_warning(&mut self, warning: AssetError) {
        warn!("{}: {}", self.notebook_name, warning);
        self.warnings.push(warning);
    }
}

/// One step applied to every markdown cell before rendering.
pub trait CellTransform: Send + Sync {
    /// Short name for debug logs.
    fn name(&self) -> &'static str;

    /// Return the cell with its source rewritten. Never fails: problems are
    /// recorded in `ctx.warnings`.
    fn transform(&self, cell: Cell, ctx: &mut TransformContext) -> Cell;
}

/// The transforms applied by default, in order.
pub fn default_transforms() -> Vec<Box<dyn CellTransform>> {
    vec![
        Box::new(RelativeImageRelocator),
        Box::new(AttachmentRelocator),
    ]
}

/// Random hex file name keeping `extension` (without the dot, may be empty).
pub fn unique_file_name(extension: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    if extension.is_empty() {
        id
    } else {
        format!("{id}.{extension}")
    }
}

// ── Relative image links ─────────────────────────────────────────────────

/// `![alt](path)` or `![alt](path "title")`. Alt text and paths containing
/// brackets or parentheses are not matched.
static RE_IMAGE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"!\[([^\]]*)\]\(\s*([^)\s]+)(\s+"[^"]*")?\s*\)"#).unwrap());

/// Anything with a URI scheme (`attachment:`, `data:`, `ftp:`) is not a file path.
static RE_URI_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap());

/// Copies images referenced by relative path into the asset tree.
pub struct RelativeImageRelocator;

impl RelativeImageRelocator {
    /// Whether `path` names a file next to the notebook.
    pub fn is_local_reference(path: &str) -> bool {
        !(path.starts_with("http://")
            || path.starts_with("https://")
            || path.starts_with('{')
            || path.starts_with('/')
            || RE_URI_SCHEME.is_match(path))
    }

    fn relocate(&self, reference: &str, ctx: &mut TransformContext) -> Option<String> {
        let resolved = ctx.notebook_dir.join(reference);
        if !resolved.is_file() {
            ctx.record_warning(AssetError::MissingFile {
                reference: reference.to_string(),
                resolved,
            });
            return None;
        }

        let extension = Path::new(reference)
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = unique_file_name(&extension);

        let dest = match ctx.prepare_dest(&file_name) {
            Ok(dest) => dest,
            Err(e) => {
                ctx.record_warning(AssetError::CopyFailed {
                    source_path: resolved,
                    dest: ctx.slug_dir(),
                    detail: e.to_string(),
                });
                return None;
            }
        };
        if let Err(e) = fs::copy(&resolved, &dest) {
            ctx.record_warning(AssetError::CopyFailed {
                source_path: resolved,
                dest,
                detail: e.to_string(),
            });
            return None;
        }

        debug!("Copied {} → {}", resolved.display(), dest.display());
        ctx.assets.push(dest);
        Some(ctx.asset_url(&file_name))
    }
}

impl CellTransform for RelativeImageRelocator {
    fn name(&self) -> &'static str {
        "relative-images"
    }

    fn transform(&self, mut cell: Cell, ctx: &mut TransformContext) -> Cell {
        let source = cell.source().to_string();
        let rewritten = RE_IMAGE_LINK.replace_all(&source, |caps: &Captures<'_>| {
            let path = &caps[2];
            if !Self::is_local_reference(path) {
                return caps[0].to_string();
            }
            match self.relocate(path, ctx) {
                Some(url) => format!(
                    "![{}]({}{})",
                    &caps[1],
                    url,
                    caps.get(3).map_or("", |m| m.as_str())
                ),
                None => caps[0].to_string(),
            }
        });
        let rewritten = rewritten.into_owned();
        cell.set_source(rewritten);
        cell
    }
}

// ── Embedded attachments ─────────────────────────────────────────────────

/// Decodes `attachments` of a markdown cell into the asset tree.
pub struct AttachmentRelocator;

/// File extension for a media type: the subtype without any `+suffix`
/// (`image/png` → `png`, `image/svg+xml` → `svg`).
pub fn extension_for_media_type(media_type: &str) -> String {
    let subtype = media_type.split_once('/').map_or(media_type, |(_, s)| s);
    let subtype = subtype.split(['+', ';']).next().unwrap_or(subtype);
    match subtype.trim() {
        "jpeg" => "jpg".to_string(),
        other => other.to_ascii_lowercase(),
    }
}

/// Decode a base64 payload, ignoring the line breaks Jupyter sometimes inserts.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact)
}

impl CellTransform for AttachmentRelocator {
    fn name(&self) -> &'static str {
        "attachments"
    }

    fn transform(&self, mut cell: Cell, ctx: &mut TransformContext) -> Cell {
        let Some(attachments) = cell.attachments.as_ref() else {
            return cell;
        };

        // Longest names first, so `a.png` never rewrites part of `a.png.png`.
        let mut names: Vec<&String> = attachments.keys().collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let mut source = cell.source().to_string();
        for name in names {
            let bundle = &attachments[name];
            let entry = bundle
                .iter()
                .find(|(mime, _)| mime.starts_with("image/"))
                .or_else(|| bundle.iter().next());
            let Some((media_type, payload)) = entry else {
                continue;
            };

            let bytes = match decode_base64(payload.as_ref()) {
                Ok(bytes) if !bytes.is_empty() => bytes,
                Ok(_) => {
                    ctx.record_warning(AssetError::DecodeFailed {
                        name: name.clone(),
                        media_type: media_type.clone(),
                        detail: "empty payload".to_string(),
                    });
                    continue;
                }
                Err(e) => {
                    ctx.record_warning(AssetError::DecodeFailed {
                        name: name.clone(),
                        media_type: media_type.clone(),
                        detail: e.to_string(),
                    });
                    continue;
                }
            };

            let file_name = unique_file_name(&extension_for_media_type(media_type));
            let written = ctx
                .prepare_dest(&file_name)
                .and_then(|dest| fs::write(&dest, &bytes).map(|_| dest));
            let dest = match written {
                Ok(dest) => dest,
                Err(e) => {
                    ctx.record_warning(AssetError::WriteFailed {
                        dest: ctx.slug_dir().join(&file_name),
                        detail: e.to_string(),
                    });
                    continue;
                }
            };

            debug!("Attachment {} → {}", name, dest.display());
            ctx.assets.push(dest);
            source = source.replace(&format!("attachment:{name}"), &ctx.asset_url(&file_name));
        }

        cell.set_source(source);
        cell
    }
}
