//! Combiner: merge labelled Markdown fragments into one document.
//!
//! ## Header contract
//!
//! Every unit is introduced by exactly one line of the form
//!
//! ```text
//! # file <n> - <identifier>
//! ```
//!
//! where `<n>` is the 1-based position (decimal, no leading zeros) and
//! `<identifier>` is the rest of the line verbatim. External tooling parses
//! these headers with `^# file (\d+) - (.+)$`; do not change spacing,
//! capitalisation or numbering base without a version note.
//!
//! ## Layout
//!
//! ```text
//! # file 1 - a.docx
//!
//! <a.docx markdown, trailing whitespace trimmed>
//!
//! # file 2 - b.docx
//!
//! <b.docx markdown>
//! ```
//!
//! One blank line separates a header from its body and a body from the next
//! header. A non-empty document ends with exactly one newline; an empty unit
//! list yields an empty string.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^# file (\d+) - (.+)$").unwrap());

/// One file's complete conversion result and its display identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionUnit {
    /// Bare file name, or `/`-separated path relative to an archive root.
    pub identifier: String,
    pub markdown: String,
}

impl ConversionUnit {
    pub fn new(identifier: impl Into<String>, markdown: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            markdown: markdown.into(),
        }
    }
}

/// Render the header line for unit `n` (1-based).
pub fn header_line(n: usize, identifier: &str) -> String {
    format!("# file {} - {}", n, single_line(identifier))
}

/// Combine units in the given order. Single units still get a header.
pub fn combine(units: &[ConversionUnit]) -> String {
    if units.is_empty() {
        return String::new();
    }

    let blocks: Vec<String> = units
        .iter()
        .enumerate()
        .map(|(i, unit)| {
            let body = unit.markdown.trim_end();
            if body.is_empty() {
                header_line(i + 1, &unit.identifier)
            } else {
                format!("{}\n\n{}", header_line(i + 1, &unit.identifier), body)
            }
        })
        .collect();

    let mut doc = blocks.join("\n\n");
    doc.push('\n');
    doc
}

/// Parse every header line of a combined document into `(n, identifier)`.
///
/// Nested headers (an archive's combined text inside a leaf document) are
/// returned too, in document order.
pub fn parse_headers(doc: &str) -> Vec<(usize, String)> {
    RE_HEADER
        .captures_iter(doc)
        .filter_map(|caps| {
            let n = caps[1].parse().ok()?;
            Some((n, caps[2].trim_end_matches('\r').to_string()))
        })
        .collect()
}

/// Identifiers must not break the one-line header.
fn single_line(identifier: &str) -> String {
    identifier.replace(['\r', '\n'], " ")
}
