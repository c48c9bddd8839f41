//! Image encoding: `DynamicImage` → base64 payload for the OCR request.
//!
//! PNG is the default because it is lossless; JPEG is offered for very large
//! scans where upload size matters more than edge crispness.

use crate::config::ImageEncoding;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// A rendered page ready to send: base64 data plus MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPage {
    /// 0-based page index within the PDF.
    pub index: usize,
    pub mime_type: &'static str,
    pub data: String,
}

impl EncodedPage {
    /// 1-based page number for log lines and errors.
    pub fn page_num(&self) -> usize {
        self.index + 1
    }
}

/// Encode one rendered page.
pub fn encode_page(
    index: usize,
    img: &DynamicImage,
    encoding: ImageEncoding,
) -> Result<EncodedPage, image::ImageError> {
    let mut buf = Vec::new();
    match encoding {
        ImageEncoding::Png => img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?,
        // The JPEG encoder rejects alpha channels.
        ImageEncoding::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)?,
    }

    let data = STANDARD.encode(&buf);
    debug!("Encoded page {} → {} bytes base64", index + 1, data.len());

    Ok(EncodedPage {
        index,
        mime_type: encoding.mime_type(),
        data,
    })
}
