//! PDF rasterisation: render every page to a `DynamicImage` via pdfium.
//!
//! pdfium keeps thread-local state and must not run on a Tokio worker, so all
//! calls go through `spawn_blocking`. Binding failures are reported as
//! [`OcrError::Dependency`] and make the converter fall back to the primary
//! engine.

use crate::config::OcrConfig;
use crate::error::OcrError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bind to pdfium: explicit library path first, then the working directory,
/// then the system library search path.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, OcrError> {
    let bindings = match lib_path {
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| OcrError::Dependency(format!("cannot load pdfium: {e:?}")))?;

    Ok(Pdfium::new(bindings))
}

/// Whether pdfium can be loaded at all.
pub fn pdfium_available(lib_path: Option<&Path>) -> bool {
    bind_pdfium(lib_path).is_ok()
}

/// Rasterise every page of `pdf_path`.
///
/// # Returns
/// `(page_index_0based, image)` pairs in page order.
pub async fn render_pages(
    pdf_path: &Path,
    config: &OcrConfig,
) -> Result<Vec<(usize, DynamicImage)>, OcrError> {
    let path = pdf_path.to_path_buf();
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;
    let lib_path = config.pdfium_lib_path.clone();

    tokio::task::spawn_blocking(move || render_pages_blocking(&path, dpi, max_pixels, lib_path))
        .await
        .map_err(|e| OcrError::Dependency(format!("render task panicked: {e}")))?
}

fn render_pages_blocking(
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
    lib_path: Option<PathBuf>,
) -> Result<Vec<(usize, DynamicImage)>, OcrError> {
    let pdfium = bind_pdfium(lib_path.as_deref())?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| OcrError::Render {
            page: 0,
            detail: format!("cannot open {}: {e:?}", pdf_path.display()),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("{}: rendering {} pages at {} DPI", pdf_path.display(), total_pages, dpi);

    // PDF user space is 72 units per inch.
    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / 72.0)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(total_pages);
    for idx in 0..total_pages {
        let page = pages.get(idx as u16).map_err(|e| OcrError::Render {
            page: idx + 1,
            detail: format!("{e:?}"),
        })?;

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| OcrError::Render {
                page: idx + 1,
                detail: format!("{e:?}"),
            })?;

        let image = bitmap.as_image();
        debug!("Rendered page {} → {}x{} px", idx + 1, image.width(), image.height());
        results.push((idx, image));
    }

    Ok(results)
}
