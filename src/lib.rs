//! # batch2md
//!
//! Batch-convert a tree of documents (PDF, DOCX, PPTX, XLSX, ZIP) into
//! Markdown, mirroring the folder structure and combining leaf folders.
//!
//! ## Why this crate?
//!
//! Document dumps arrive as deep folder trees. Converting file by file loses
//! the grouping; flattening everything loses the structure. This crate keeps
//! interior folders as folders and turns each leaf folder into one combined
//! document with a stable `# file n - name` header per source file, so the
//! output can be fed to search or LLM pipelines and still traced back.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input tree
//!  │
//!  ├─ 1. Walk      classify each folder as leaf or interior
//!  ├─ 2. Convert   markitdown per file; scanned PDFs via vision OCR first
//!  ├─ 3. Expand    ZIPs unpacked into a scratch dir, entries converted
//!  ├─ 4. Combine   leaf files → one document with numbered headers
//!  └─ 5. Output    {name}_{YYYY-MM-DD}.md in the mirrored output tree
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batch2md::{BatchConfig, OcrConfig, TreeWalker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // OCR credentials from OCR_API_KEY / OCR_API_KEY_2
//!     let config = BatchConfig::builder()
//!         .input_dir("input")
//!         .output_dir("output")
//!         .ocr(OcrConfig::from_env()?)
//!         .build()?;
//!     let report = TreeWalker::from_config(config).run().await?;
//!     eprintln!("{} written, {} skipped", report.artifacts.len(), report.skipped.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `batch2md` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! batch2md = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod archive;
pub mod combine;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod naming;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod tree;
pub mod walker;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use archive::{ArchiveExpander, ArchiveOutcome};
pub use combine::{combine, parse_headers, ConversionUnit};
pub use config::{BatchConfig, BatchConfigBuilder, ImageEncoding, OcrConfig};
pub use convert::{strategies_for, DocumentKind, FileConverter, Strategy};
pub use engine::{MarkItDown, PrimaryEngine};
pub use error::{ArchiveError, BatchError, ConversionError, EngineError, OcrError};
pub use naming::{artifact_name, parse_artifact_name};
pub use pipeline::ocr::{PdfOcr, VisionBackend, VisionOcr};
pub use progress::{NoopProgressCallback, ProgressCallback, RunProgressCallback};
pub use tree::is_leaf;
pub use walker::{RunReport, SkipKind, SkippedItem, TreeWalker};
