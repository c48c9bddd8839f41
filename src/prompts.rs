//! Prompts for OCR of rendered PDF pages.
//!
//! Callers can override the default via
//! [`crate::config::OcrConfig::system_prompt`].

/// Default instruction sent with every page image.
pub const DEFAULT_OCR_PROMPT: &str = r#"You are an OCR engine. Transcribe this page image into clean Markdown.

Rules:
1. Preserve ALL text exactly, in natural reading order.
2. Use Markdown headings, lists and emphasis to mirror the visual structure.
3. Render tables as GFM pipe tables.
4. Render formulas as LaTeX: $inline$ and $$display$$.
5. Skip page numbers and running headers/footers.
6. Output ONLY the Markdown. No ```markdown fences, no commentary."#;

/// The prompt to send, honouring an override.
pub fn ocr_prompt(custom: Option<&str>) -> &str {
    custom.unwrap_or(DEFAULT_OCR_PROMPT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins() {
        assert_eq!(ocr_prompt(Some("just text")), "just text");
        assert!(ocr_prompt(None).contains("Markdown"));
    }
}
