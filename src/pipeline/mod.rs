//! OCR pipeline stages for PDF-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ encode ──▶ dispatch ──▶ postprocess
//! (pdfium)   (base64)   (lanes)      (cleanup)
//! ```
//!
//! 1. [`render`]: rasterise every page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 2. [`encode`]: PNG/JPEG-encode and base64-wrap each page image
//! 3. [`dispatch`]: deal pages round-robin across credential lanes, each
//!    bounded by its own semaphore, and reassemble them in page order
//! 4. [`postprocess`]: deterministic text cleanup before the pages are joined
//!
//! [`ocr`] ties the stages together behind the [`ocr::PdfOcr`] seam.

pub mod dispatch;
pub mod encode;
pub mod ocr;
pub mod postprocess;
pub mod render;
