//! Post-processing: deterministic cleanup of OCR page Markdown.
//!
//! Vision models follow the "no fences, no commentary" instruction most of
//! the time, not all of the time. These rules run on every OCR page before the
//! pages are joined:
//!
//! 1. Strip an outer ```` ```markdown ```` fence around the whole reply
//! 2. Normalise line endings (CRLF / CR → LF)
//! 3. Trim trailing whitespace per line
//! 4. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
//! 5. Collapse runs of 3+ blank lines to one blank line
//! 6. Ensure a single trailing newline
//!
//! Rule 1 must see the raw reply; rule 5 must see normalised line endings.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules in order.
pub fn clean_page(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = normalise_line_endings(&s);
    let s = trim_line_ends(&s);
    let s = strip_invisible(&s);
    let s = collapse_blank_runs(&s);
    with_final_newline(&s)
}

/// Join cleaned pages in page order with one blank line between them.
pub fn join_pages(pages: &[String]) -> String {
    let joined = pages
        .iter()
        .map(|p| p.trim_end())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    with_final_newline(&joined)
}

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?[ \t]*\r?\n(.*?)\r?\n```\s*$").unwrap());

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn trim_line_ends(input: &str) -> String {
    input.lines().map(str::trim_end).collect::<Vec<_>>().join("\n")
}

fn strip_invisible(input: &str) -> String {
    input.replace(['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}', '\u{00AD}'], "")
}

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_runs(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n").into_owned()
}

fn with_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}
