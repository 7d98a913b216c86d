//! Pipeline stages for notebook-to-article conversion.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the orchestration in [`crate::convert`] stays a thin sequence of
//! calls.
//!
//! ## Data Flow
//!
//! ```text
//! metadata ──▶ relocate ──▶ render ──▶ postprocess ──▶ write
//! (raw cell)   (md images)  (cells)    (cleanup)       (article + images)
//! ```
//!
//! 1. [`metadata`] parses the first raw cell into the article header and
//!    derives the slug.
//! 2. [`relocate`] holds per-cell transforms that copy or decode images into
//!    `<asset-root>/<slug>/` and rewrite their links.
//! 3. [`render`] turns cells and code outputs into one Markdown body;
//!    code-output images are returned, not written.
//! 4. [`postprocess`] is deterministic text cleanup: captured output loses
//!    ANSI escapes and blank-line runs, the body only gets its line endings
//!    and final newline fixed.
//! 5. [`write`] does pre-run cleanup, image files and the atomic article write.

pub mod metadata;
pub mod postprocess;
pub mod relocate;
pub mod render;
pub mod write;
