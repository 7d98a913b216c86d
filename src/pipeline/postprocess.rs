//! Post-processing: deterministic text cleanup.
//!
//! Two entry points with different reach. [`clean_output`] scrubs text a
//! kernel captured (stream, traceback and `text/plain` outputs): ANSI colour
//! codes, Windows line endings, zero-width characters, runs of blank lines.
//! [`clean_body`] runs over the whole article and only touches line endings
//! and the final newline, so markdown and code written by the author reach
//! the article unchanged.
//!
//! Trailing spaces are left alone: two trailing spaces are a Markdown hard
//! line break.

use once_cell::sync::Lazy;
use regex::Regex;

/// Normalise line endings and end the body with exactly one newline.
pub fn clean_body(input: &str) -> String {
    ensure_final_newline(&normalise_line_endings(input))
}

/// Clean captured output text before it is indented into the body.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip ANSI escape sequences
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Collapse 4+ consecutive newlines down to 3
pub fn clean_output(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_ansi(&s);
    let s = remove_invisible_chars(&s);
    collapse_blank_lines(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip ANSI escapes ───────────────────────────────────────────────

static RE_ANSI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b(?:\[[0-9;?]*[ -/]*[@-~]|\][^\x07]*\x07|[@-Z\\-_])").unwrap());

fn strip_ansi(input: &str) -> String {
    RE_ANSI.replace_all(input, "").into_owned()
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

// ZWJ and ZWNJ are not listed: emoji sequences and Persian or Indic text
// need them.
fn remove_invisible_chars(input: &str) -> String {
    input.replace(['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{2060}'], "")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Body: end with a single newline ──────────────────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end_matches(['\n', ' ', '\t']);
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_strip_ansi_colours() {
        let input = "\u{1b}[0;31mValueError\u{1b}[0m: bad \u{1b}[1;32mvalue\u{1b}[0m";
        assert_eq!(strip_ansi(input), "ValueError: bad value");
    }

    #[test]
    fn test_strip_ansi_cursor_movement() {
        assert_eq!(strip_ansi("50%\u{1b}[2K\u{1b}[1G100%"), "50%100%");
    }

    #[test]
    fn test_collapse_blank_lines() {
        let input = "a\n\n\n\n\n\nb";
        assert_eq!(collapse_blank_lines(input), "a\n\n\nb");
    }

    #[test]
    fn test_ensure_final_newline() {
        assert_eq!(ensure_final_newline("hello"), "hello\n");
        assert_eq!(ensure_final_newline("hello\n\n\n"), "hello\n");
        assert_eq!(ensure_final_newline(""), "\n");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_hard_line_breaks_survive() {
        let input = "first line  \nsecond line\n";
        assert_eq!(clean_body(input), input);
    }

    #[test]
    fn test_joiners_survive() {
        let input = "👨\u{200D}👩\u{200D}👧 می\u{200C}خواهم";
        assert_eq!(remove_invisible_chars(input), input);
    }

    #[test]
    fn test_clean_output_full() {
        let input = "\u{FEFF}Epoch 1\r\n\r\n\r\n\r\n\r\nloss \u{1b}[1m0.3\u{1b}[0m\r\n";
        assert_eq!(clean_output(input), "Epoch 1\n\n\nloss 0.3\n");
    }

    #[test]
    fn test_clean_body_keeps_author_text() {
        let input = "s = '''a\r\n\n\n\n\nb'''\n\u{1b}[1m \u{200B}\n\n\n";
        assert_eq!(
            clean_body(input),
            "s = '''a\n\n\n\n\nb'''\n\u{1b}[1m \u{200B}\n"
        );
    }
}
