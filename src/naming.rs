//! Artifact naming: `{base_name}_{YYYY-MM-DD}.md`.
//!
//! The date is appended, never interleaved, so the base name can be recovered
//! by splitting at the last `_` before the stamp.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";

static RE_ARTIFACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)_(\d{4}-\d{2}-\d{2})\.md$").unwrap());

/// Build the artifact file name for `base` on `run_date`.
pub fn artifact_name(base: &str, run_date: NaiveDate) -> String {
    format!("{}_{}.md", base, run_date.format(DATE_FORMAT))
}

/// Split an artifact file name back into `(base, run_date)`.
pub fn parse_artifact_name(name: &str) -> Option<(String, NaiveDate)> {
    let caps = RE_ARTIFACT.captures(name)?;
    let date = NaiveDate::parse_from_str(&caps[2], DATE_FORMAT).ok()?;
    Some((caps[1].to_string(), date))
}

/// Base name for a loose file or archive: the file name without its last
/// extension (`report.pdf` → `report`, `notes.v2.docx` → `notes.v2`).
pub fn file_base_name(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".to_string())
}

/// Base name for a folder: its last path component. `None` for paths such
/// as `.`, `..` or `/` that do not end in a name.
pub fn dir_base_name(path: &Path) -> Option<String> {
    path.file_name().map(|s| s.to_string_lossy().into_owned())
}
