//! Error types for the batch2md library.
//!
//! Errors are split by how far they are allowed to travel:
//!
//! * [`BatchError`] is **fatal**: the run cannot start or cannot write its
//!   output (missing input root, uncreatable output root, bad config).
//!   Returned as `Err(BatchError)` from [`crate::walker::TreeWalker::run`].
//!
//! * [`ConversionError`] and [`ArchiveError`] are **per item**: one file or one
//!   archive could not be converted. The walker logs it, records a
//!   [`crate::walker::SkippedItem`], and moves on.
//!
//! * [`OcrError`] is **never surfaced**: any OCR failure makes the converter
//!   fall back to the primary engine for that file.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that abort the whole run.
#[derive(Debug, Error)]
pub enum BatchError {
    // ── Input root ────────────────────────────────────────────────────────
    /// The input root does not exist.
    #[error("Input directory not found: '{path}'\nCreate it or pass --input <DIR>.")]
    InputRootMissing { path: PathBuf },

    /// The input root exists but is a file.
    #[error("Input path is not a directory: '{path}'")]
    InputRootNotADirectory { path: PathBuf },

    /// The input root could not be listed.
    #[error("Cannot read input directory '{path}': {source}")]
    InputRootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Output ────────────────────────────────────────────────────────────
    /// The output root could not be created.
    #[error("Cannot create output directory '{path}': {source}")]
    OutputRootUncreatable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An artifact could not be written below the output root.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config ────────────────────────────────────────────────────────────
    /// An environment option or builder value is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure of the primary conversion engine for one file.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine program could not be started at all.
    #[error("could not run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine ran and exited unsuccessfully.
    #[error("'{program}' exited with {}: {stderr}", exit_label(.status))]
    Failed {
        program: String,
        status: Option<i32>,
        stderr: String,
    },
}

fn exit_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "signal".to_string(),
    }
}

/// A single file could not be converted by any strategy.
#[derive(Debug, Error)]
#[error("Failed to convert '{path}': {source}")]
pub struct ConversionError {
    pub path: PathBuf,
    #[source]
    pub source: EngineError,
}

/// OCR failure for one PDF. Always triggers fallback to the primary engine.
#[derive(Debug, Clone, Error)]
pub enum OcrError {
    /// The OCR path is not usable (disabled, no credentials, no pdfium).
    #[error("OCR unavailable: {0}")]
    Unavailable(String),

    /// pdfium could not be bound.
    #[error("OCR dependency error: {0}")]
    Dependency(String),

    /// Page rasterisation or image encoding failed.
    #[error("Page {page}: render failed: {detail}")]
    Render { page: usize, detail: String },

    /// One call exceeded the per-call timeout.
    #[error("Page {page}: OCR call timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },

    /// HTTP 429 from the OCR service.
    #[error("OCR rate limit exceeded (HTTP 429): {detail}")]
    RateLimited { detail: String },

    /// HTTP 401/403: the credential was rejected.
    #[error("OCR credential rejected (HTTP {status}): {detail}")]
    Auth { status: u16, detail: String },

    /// Any other non-success HTTP status.
    #[error("OCR API error (HTTP {status}): {detail}")]
    Api { status: u16, detail: String },

    /// The response body did not contain the expected text.
    #[error("Malformed OCR response: {0}")]
    MalformedResponse(String),

    /// Connection-level failure.
    #[error("OCR transport error: {0}")]
    Transport(String),
}

impl OcrError {
    /// Whether retrying the same page may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            OcrError::Timeout { .. } | OcrError::RateLimited { .. } | OcrError::Transport(_) => {
                true
            }
            OcrError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// A ZIP archive could not be expanded or produced nothing.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The scratch directory could not be created.
    #[error("Cannot create scratch directory: {0}")]
    Scratch(#[source] std::io::Error),

    /// The archive file could not be opened.
    #[error("Cannot open archive '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The archive is corrupt or extraction failed.
    #[error("Cannot extract archive '{path}': {source}")]
    Extract {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// Walking the extracted tree failed.
    #[error("Cannot enumerate extracted files of '{path}': {detail}")]
    Enumerate { path: PathBuf, detail: String },

    /// Every entry failed (or the archive holds no visible files).
    #[error("No entry of '{path}' could be converted ({failed} failed)")]
    NothingConverted { path: PathBuf, failed: usize },

    /// The blocking extraction task panicked.
    #[error("Extraction task failed: {0}")]
    Join(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_error_names_the_file() {
        let e = ConversionError {
            path: PathBuf::from("input/report.docx"),
            source: EngineError::Failed {
                program: "markitdown".into(),
                status: Some(1),
                stderr: "unsupported".into(),
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("report.docx"), "got: {msg}");
        assert!(std::error::Error::source(&e).is_some());
    }

    #[test]
    fn engine_failed_without_status_reads_signal() {
        let e = EngineError::Failed {
            program: "markitdown".into(),
            status: None,
            stderr: String::new(),
        };
        assert!(e.to_string().contains("signal"));
    }

    #[test]
    fn retryable_classification() {
        assert!(OcrError::Timeout { page: 1, secs: 5 }.is_retryable());
        assert!(OcrError::RateLimited { detail: String::new() }.is_retryable());
        assert!(OcrError::Api { status: 503, detail: String::new() }.is_retryable());
        assert!(!OcrError::Api { status: 400, detail: String::new() }.is_retryable());
        assert!(!OcrError::Auth { status: 401, detail: String::new() }.is_retryable());
        assert!(!OcrError::MalformedResponse(String::new()).is_retryable());
    }

    #[test]
    fn input_root_missing_display() {
        let e = BatchError::InputRootMissing {
            path: PathBuf::from("input"),
        };
        assert!(e.to_string().contains("input"));
    }
}
