//! File converter adapter: one file in, Markdown or an error out.
//!
//! ## Why a strategy list?
//!
//! Routing is a pure function of the document kind and whether OCR is usable,
//! so it can be tested without any engine. The converter then walks the list
//! in order: a failed OCR attempt falls through to the primary engine for the
//! same whole file, and only the last strategy's failure reaches the caller.

use crate::config::BatchConfig;
use crate::engine::{MarkItDown, PrimaryEngine};
use crate::error::{ConversionError, EngineError};
use crate::pipeline::ocr::{PdfOcr, VisionOcr};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Document family, by case-insensitive extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
    Zip,
    Other,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("pdf") => Self::Pdf,
            Some("docx") => Self::Docx,
            Some("pptx") => Self::Pptx,
            Some("xlsx") => Self::Xlsx,
            Some("zip") => Self::Zip,
            _ => Self::Other,
        }
    }
}

/// One way of turning a file into Markdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Ocr,
    Primary,
}

/// Strategies to try, in order, for a file of `kind`.
pub fn strategies_for(kind: DocumentKind, ocr_available: bool) -> Vec<Strategy> {
    match (kind, ocr_available) {
        (DocumentKind::Pdf, true) => vec![Strategy::Ocr, Strategy::Primary],
        _ => vec![Strategy::Primary],
    }
}

/// Converts single files, preferring OCR for PDFs when it is available.
#[derive(Clone)]
pub struct FileConverter {
    engine: Arc<dyn PrimaryEngine>,
    ocr: Option<Arc<dyn PdfOcr>>,
}

impl FileConverter {
    /// Primary engine only.
    pub fn new(engine: Arc<dyn PrimaryEngine>) -> Self {
        Self { engine, ocr: None }
    }

    /// Attach an OCR collaborator for PDFs.
    pub fn with_ocr(mut self, ocr: Arc<dyn PdfOcr>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    /// `markitdown` (or the configured program) plus Gemini OCR if usable.
    pub fn from_config(config: &BatchConfig) -> Self {
        let engine = Arc::new(MarkItDown::new(config.converter_program.clone()));
        let converter = Self::new(engine);
        if config.ocr.enabled {
            converter.with_ocr(Arc::new(VisionOcr::from_config(&config.ocr)))
        } else {
            converter
        }
    }

    pub fn ocr_available(&self) -> bool {
        self.ocr.as_ref().is_some_and(|o| o.is_available())
    }

    /// Convert one file. Never returns partial output.
    pub async fn convert(&self, path: &Path) -> Result<String, ConversionError> {
        let kind = DocumentKind::from_path(path);
        let strategies = strategies_for(kind, self.ocr_available());
        debug!("{}: {:?} via {:?}", path.display(), kind, strategies);

        let mut last_err: Option<EngineError> = None;
        for strategy in strategies {
            match strategy {
                Strategy::Ocr => {
                    let Some(ocr) = self.ocr.as_ref() else {
                        continue;
                    };
                    let start = Instant::now();
                    match ocr.pdf_to_markdown(path).await {
                        Ok(markdown) => {
                            info!(
                                "{}: converted with OCR in {}ms",
                                path.display(),
                                start.elapsed().as_millis()
                            );
                            return Ok(markdown);
                        }
                        Err(e) => warn!(
                            "{}: OCR failed ({}), falling back to {}",
                            path.display(),
                            e,
                            self.engine.name()
                        ),
                    }
                }
                Strategy::Primary => match self.engine.to_markdown(path).await {
                    Ok(markdown) => return Ok(markdown),
                    Err(e) => last_err = Some(e),
                },
            }
        }

        let source = last_err.unwrap_or_else(|| EngineError::Failed {
            program: self.engine.name().to_string(),
            status: None,
            stderr: "no conversion strategy ran".into(),
        });
        Err(ConversionError {
            path: path.to_path_buf(),
            source,
        })
    }
}
