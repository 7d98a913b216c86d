//! Notebook → Markdown body.
//!
//! Output layout follows Jupyter's own Markdown export so articles look the
//! same as before the converter was rewritten:
//!
//! - markdown cells verbatim (after the [`CellTransform`] list has run);
//! - code cells as fenced blocks in the notebook's language, followed by
//!   their outputs: text indented four spaces, rich outputs picked by
//!   [`DISPLAY_PRIORITY`], images extracted to files named by
//!   [`OutputTemplate`] and linked as `![png](images/<slug>/output_3_0.png)`;
//! - raw cells only when their mimetype targets Markdown or HTML (or is unset);
//! - cells separated by one blank line.
//!
//! Code-output images are *returned* in [`RenderedNotebook::outputs`] rather
//! than written here, so the writer decides where and when they land.

use crate::error::AssetError;
use crate::notebook::{bundle_text, Cell, CellType, MimeBundle, Notebook, Output};
use crate::pipeline::postprocess;
use crate::pipeline::relocate::{decode_base64, default_transforms, CellTransform, TransformContext};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Mime types tried for rich outputs, best first.
pub const DISPLAY_PRIORITY: &[&str] = &[
    "text/html",
    "text/markdown",
    "image/svg+xml",
    "text/latex",
    "image/png",
    "image/jpeg",
    "text/plain",
];

/// Raw-cell mimetypes that are copied into the article.
const RAW_PASSTHROUGH: &[&str] = &["", "text/markdown", "text/html"];

/// Naming pattern for code-output images:
/// `{subdir}/{slug}/{unique_key}_{cell_index}_{index}{extension}`, relative
/// to the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTemplate {
    pub subdir: String,
    pub slug: String,
    pub unique_key: String,
}

impl OutputTemplate {
    pub fn new(
        subdir: impl Into<String>,
        slug: impl Into<String>,
        unique_key: impl Into<String>,
    ) -> Self {
        Self {
            subdir: subdir.into(),
            slug: slug.into(),
            unique_key: unique_key.into(),
        }
    }

    /// Relative path for output `index` of cell `cell_index`; `extension`
    /// includes the leading dot.
    pub fn path(&self, cell_index: usize, index: usize, extension: &str) -> PathBuf {
        PathBuf::from(&self.subdir)
            .join(&self.slug)
            .join(format!(
                "{}_{}_{}{}",
                self.unique_key, cell_index, index, extension
            ))
    }
}

/// Rendered body plus code-output images keyed by path relative to the output root.
#[derive(Debug, Clone, Default)]
pub struct RenderedNotebook {
    pub body: String,
    pub outputs: BTreeMap<PathBuf, Vec<u8>>,
}

/// Renders notebooks, running each markdown cell through an ordered list of
/// transforms first.
pub struct MarkdownRenderer {
    transforms: Vec<Box<dyn CellTransform>>,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new(default_transforms())
    }
}

impl MarkdownRenderer {
    pub fn new(transforms: Vec<Box<dyn CellTransform>>) -> Self {
        Self { transforms }
    }

    /// Render every cell of `notebook` (the metadata cell must already be removed).
    pub fn render(
        &self,
        notebook: Notebook,
        template: &OutputTemplate,
        ctx: &mut TransformContext,
    ) -> RenderedNotebook {
        let language = notebook.language().to_string();
        let mut blocks: Vec<String> = Vec::with_capacity(notebook.cells.len());
        let mut outputs = BTreeMap::new();

        for (cell_index, cell) in notebook.cells.into_iter().enumerate() {
            match cell.cell_type {
                CellType::Markdown => {
                    let cell = self.apply_transforms(cell, ctx);
                    blocks.push(cell.source().to_string());
                }
                CellType::Code => {
                    blocks.push(render_code_cell(
                        &cell,
                        cell_index,
                        &language,
                        template,
                        &mut outputs,
                        ctx,
                    ));
                }
                CellType::Raw => {
                    let mime = cell.raw_mimetype().unwrap_or("").to_ascii_lowercase();
                    if RAW_PASSTHROUGH.contains(&mime.as_str()) {
                        blocks.push(cell.source().to_string());
                    } else {
                        debug!("Dropping raw cell {} ({})", cell_index, mime);
                    }
                }
                CellType::Unknown => {
                    debug!("Dropping cell {} of unknown type", cell_index);
                }
            }
        }

        RenderedNotebook {
            body: postprocess::clean_body(&blocks.join("\n\n")),
            outputs,
        }
    }

    fn apply_transforms(&self, cell: Cell, ctx: &mut TransformContext) -> Cell {
        self.transforms.iter().fold(cell, |cell, t| {
            debug!("Applying {} to {}", t.name(), ctx.notebook_name);
            t.transform(cell, ctx)
        })
    }
}

fn render_code_cell(
    cell: &Cell,
    cell_index: usize,
    language: &str,
    template: &OutputTemplate,
    outputs: &mut BTreeMap<PathBuf, Vec<u8>>,
    ctx: &mut TransformContext,
) -> String {
    let source = cell.source().trim_end_matches('\n');
    let mut parts = vec![format!("```{language}\n{source}\n```")];

    for (index, output) in cell.outputs.iter().enumerate() {
        let rendered = match output {
            Output::Stream { text, .. } => Some(indent_output(text.as_ref())),
            Output::DisplayData { data, .. } | Output::ExecuteResult { data, .. } => {
                render_rich(data, cell_index, index, template, outputs, ctx)
            }
            Output::Error { traceback, .. } => Some(indent_output(&traceback.join("\n"))),
        };
        if let Some(text) = rendered.filter(|t| !t.trim().is_empty()) {
            parts.push(text);
        }
    }

    parts.join("\n\n")
}

fn render_rich(
    data: &MimeBundle,
    cell_index: usize,
    index: usize,
    template: &OutputTemplate,
    outputs: &mut BTreeMap<PathBuf, Vec<u8>>,
    ctx: &mut TransformContext,
) -> Option<String> {
    for mime in DISPLAY_PRIORITY {
        let Some(payload) = bundle_text(data, mime) else {
            continue;
        };
        return match *mime {
            "text/html" | "text/markdown" | "text/latex" => Some(payload),
            "text/plain" => Some(indent_output(&payload)),
            "image/svg+xml" => {
                let path = template.path(cell_index, index, ".svg");
                let link = image_link("svg", &path);
                outputs.insert(path, payload.into_bytes());
                Some(link)
            }
            image => {
                let (alt, ext) = if image == "image/png" {
                    ("png", ".png")
                } else {
                    ("jpeg", ".jpg")
                };
                let path = template.path(cell_index, index, ext);
                match decode_base64(&payload) {
                    Ok(bytes) => {
                        let link = image_link(alt, &path);
                        outputs.insert(path, bytes);
                        Some(link)
                    }
                    Err(e) => {
                        let warning = AssetError::DecodeFailed {
                            name: path.display().to_string(),
                            media_type: image.to_string(),
                            detail: e.to_string(),
                        };
                        warn!("{}: {}", ctx.notebook_name, warning);
                        ctx.warnings.push(warning);
                        // fall back to whatever text the bundle carries
                        bundle_text(data, "text/plain").map(|t| indent_output(&t))
                    }
                }
            }
        };
    }
    None
}

/// Markdown link to a code-output image; paths always use `/`.
fn image_link(alt: &str, path: &std::path::Path) -> String {
    let url = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    format!("![{alt}]({url})")
}

/// Captured kernel text, cleaned and indented as a Markdown code block.
fn indent_output(text: &str) -> String {
    indent(&postprocess::clean_output(text))
}

/// Indent every non-empty line by four spaces (a Markdown code block).
fn indent(text: &str) -> String {
    text.trim_end_matches('\n')
        .split('\n')
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("    {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    fn notebook(json: &str) -> Notebook {
        Notebook::from_json(json).unwrap()
    }

    fn ctx(dir: &std::path::Path) -> TransformContext {
        TransformContext::new(&dir.join("nb.ipynb"), "post", dir.join("images"), "{static}/images")
    }

    fn template() -> OutputTemplate {
        OutputTemplate::new("images", "post", "output")
    }

    #[test]
    fn template_path_format() {
        assert_eq!(
            template().path(3, 0, ".png"),
            PathBuf::from("images/post/output_3_0.png")
        );
    }

    #[test]
    fn renders_markdown_and_code_with_stream_output() {
        let tmp = tempfile::tempdir().unwrap();
        let nb = notebook(
            r##"{"cells": [
                {"cell_type": "markdown", "metadata": {}, "source": "# Intro"},
                {"cell_type": "code", "metadata": {}, "source": "print('hi')\n",
                 "outputs": [{"output_type": "stream", "name": "stdout", "text": ["hi\n", "there\n"]}]}
            ], "metadata": {}}"##,
        );
        let rendered = MarkdownRenderer::default().render(nb, &template(), &mut ctx(tmp.path()));
        assert_eq!(
            rendered.body,
            "# Intro\n\n```python\nprint('hi')\n```\n\n    hi\n    there\n"
        );
        assert!(rendered.outputs.is_empty());
    }

    #[test]
    fn png_output_is_extracted_via_template() {
        let tmp = tempfile::tempdir().unwrap();
        let png = STANDARD.encode(b"\x89PNG fake");
        let json = format!(
            r#"{{"cells": [
                {{"cell_type": "markdown", "metadata": {{}}, "source": "text"}},
                {{"cell_type": "code", "metadata": {{}}, "source": "plot()",
                 "outputs": [
                    {{"output_type": "stream", "name": "stdout", "text": "x"}},
                    {{"output_type": "display_data", "metadata": {{}},
                      "data": {{"image/png": "{png}", "text/plain": "<Figure>"}}}}
                 ]}}
            ]}}"#
        );
        let rendered =
            MarkdownRenderer::default().render(notebook(&json), &template(), &mut ctx(tmp.path()));

        let path = PathBuf::from("images/post/output_1_1.png");
        assert_eq!(rendered.outputs.get(&path).map(Vec::as_slice), Some(&b"\x89PNG fake"[..]));
        assert!(rendered.body.contains("![png](images/post/output_1_1.png)"));
        assert!(!rendered.body.contains("<Figure>"));
    }

    #[test]
    fn html_wins_over_plain_text() {
        let tmp = tempfile::tempdir().unwrap();
        let nb = notebook(
            r#"{"cells": [{"cell_type": "code", "metadata": {}, "source": "df",
                "outputs": [{"output_type": "execute_result", "execution_count": 1, "metadata": {},
                  "data": {"text/html": ["<table>", "</table>"], "text/plain": "df"}}]}]}"#,
        );
        let rendered = MarkdownRenderer::default().render(nb, &template(), &mut ctx(tmp.path()));
        assert!(rendered.body.contains("<table></table>"));
        assert!(!rendered.body.contains("    df"));
    }

    #[test]
    fn error_traceback_is_indented_without_ansi() {
        let tmp = tempfile::tempdir().unwrap();
        let nb = notebook(
            r#"{"cells": [{"cell_type": "code", "metadata": {}, "source": "1/0",
                "outputs": [{"output_type": "error", "ename": "ZeroDivisionError", "evalue": "x",
                  "traceback": ["\u001b[0;31mZeroDivisionError\u001b[0m: division by zero"]}]}]}"#,
        );
        let rendered = MarkdownRenderer::default().render(nb, &template(), &mut ctx(tmp.path()));
        assert!(rendered.body.contains("    ZeroDivisionError: division by zero"));
        assert!(!rendered.body.contains('\u{1b}'));
    }

    #[test]
    fn raw_cells_follow_mimetype() {
        let tmp = tempfile::tempdir().unwrap();
        let nb = notebook(
            r#"{"cells": [
                {"cell_type": "raw", "metadata": {}, "source": "kept"},
                {"cell_type": "raw", "metadata": {"raw_mimetype": "text/x-python"}, "source": "dropped"},
                {"cell_type": "raw", "metadata": {"raw_mimetype": "text/markdown"}, "source": "also kept"}
            ]}"#,
        );
        let rendered = MarkdownRenderer::default().render(nb, &template(), &mut ctx(tmp.path()));
        assert_eq!(rendered.body, "kept\n\nalso kept\n");
    }

    #[test]
    fn undecodable_png_falls_back_to_text_and_warns() {
        let tmp = tempfile::tempdir().unwrap();
        let nb = notebook(
            r#"{"cells": [{"cell_type": "code", "metadata": {}, "source": "x",
                "outputs": [{"output_type": "display_data", "metadata": {},
                  "data": {"image/png": "@@@", "text/plain": "<Figure size 640x480>"}}]}]}"#,
        );
        let mut c = ctx(tmp.path());
        let rendered = MarkdownRenderer::default().render(nb, &template(), &mut c);
        assert!(rendered.outputs.is_empty());
        assert!(rendered.body.contains("    <Figure size 640x480>"));
        assert_eq!(c.warnings.len(), 1);
    }

    #[test]
    fn transforms_run_only_on_markdown_cells() {
        struct Upper;
        impl CellTransform for Upper {
            fn name(&self) -> &'static str {
                "upper"
            }
            fn transform(&self, mut cell: Cell, _ctx: &mut TransformContext) -> Cell {
                let s = cell.source().to_uppercase();
                cell.set_source(s);
                cell
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        let nb = notebook(
            r#"{"cells": [
                {"cell_type": "markdown", "metadata": {}, "source": "shout"},
                {"cell_type": "code", "metadata": {}, "source": "quiet", "outputs": []}
            ]}"#,
        );
        let renderer = MarkdownRenderer::new(vec![Box::new(Upper)]);
        let rendered = renderer.render(nb, &template(), &mut ctx(tmp.path()));
        assert_eq!(rendered.body, "SHOUT\n\n```python\nquiet\n```\n");
    }

    #[test]
    fn author_text_reaches_the_body_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let json = serde_json::json!({"cells": [
            {"cell_type": "markdown", "metadata": {},
             "source": "Family: 👨\u{200D}👩\u{200D}👧 and Persian می\u{200C}خواهم"},
            {"cell_type": "code", "metadata": {}, "source": "s = '''a\n\n\n\n\nb'''",
             "outputs": [{"output_type": "stream", "name": "stdout",
                          "text": "\u{FEFF}x\n\n\n\n\ny\n"}]}
        ]});
        let rendered = MarkdownRenderer::default().render(
            notebook(&json.to_string()),
            &template(),
            &mut ctx(tmp.path()),
        );

        assert!(rendered.body.contains("👨\u{200D}👩\u{200D}👧"));
        assert!(rendered.body.contains("می\u{200C}خواهم"));
        assert!(rendered.body.contains("```python\ns = '''a\n\n\n\n\nb'''\n```"));
        // captured output is still scrubbed
        assert!(rendered.body.ends_with("    x\n\n\n    y\n"));
    }

    #[test]
    fn indent_keeps_blank_lines_empty() {
        assert_eq!(indent("a\n\nb\n"), "    a\n\n    b");
    }
}
