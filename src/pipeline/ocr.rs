//! OCR collaborator: PDF in, Markdown out, via a remote vision model.
//!
//! ```text
//! PDF ──▶ render (pdfium) ──▶ encode (base64) ──▶ dispatch (lanes) ──▶ clean + join
//! ```
//!
//! [`VisionBackend`] is the per-credential transport (one page image → text).
//! [`GeminiBackend`] talks to the Gemini `generateContent` REST API.
//! [`VisionOcr`] wires the whole chain together and implements [`PdfOcr`],
//! the seam the file converter uses.

use crate::config::OcrConfig;
use crate::error::OcrError;
use crate::pipeline::dispatch::{transcribe_pages, Lane, RetryPolicy};
use crate::pipeline::encode::{encode_page, EncodedPage};
use crate::pipeline::{postprocess, render};
use crate::prompts::ocr_prompt;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One credential's connection to the OCR service.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Transcribe one page image into Markdown.
    async fn transcribe(&self, page: &EncodedPage) -> Result<String, OcrError>;
}

/// Whole-PDF OCR as seen by the file converter.
#[async_trait]
pub trait PdfOcr: Send + Sync {
    /// Credentials present, dependencies loadable, not disabled.
    fn is_available(&self) -> bool;

    /// OCR every page of `path`. Any page failure fails the whole file.
    async fn pdf_to_markdown(&self, path: &Path) -> Result<String, OcrError>;
}

// ── Gemini REST backend ──────────────────────────────────────────────────

/// Gemini `models/{model}:generateContent` client bound to one API key.
pub struct GeminiBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    prompt: String,
    max_output_tokens: u32,
    temperature: f32,
    timeout_secs: u64,
}

impl GeminiBackend {
    pub fn new(config: &OcrConfig, api_key: impl Into<String>) -> Result<Self, OcrError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| OcrError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
            prompt: ocr_prompt(config.system_prompt.as_deref()).to_string(),
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
            timeout_secs: config.api_timeout_secs,
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn request_body<'a>(&'a self, page: &'a EncodedPage) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: &self.prompt },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: page.mime_type,
                            data: &page.data,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.max_output_tokens,
                temperature: self.temperature,
            },
        }
    }
}

#[async_trait]
impl VisionBackend for GeminiBackend {
    async fn transcribe(&self, page: &EncodedPage) -> Result<String, OcrError> {
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(page))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OcrError::Timeout {
                        page: page.page_num(),
                        secs: self.timeout_secs,
                    }
                } else {
                    OcrError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let detail = truncate(&detail, 300);
            return Err(match status.as_u16() {
                429 => OcrError::RateLimited { detail },
                code @ (401 | 403) => OcrError::Auth { status: code, detail },
                code => OcrError::Api { status: code, detail },
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| OcrError::MalformedResponse(e.to_string()))?;
        extract_text(body)
    }
}

/// Pull the concatenated text parts out of the first candidate.
///
/// A normal stop with no text is a blank page and yields an empty string.
fn extract_text(body: GenerateResponse) -> Result<String, OcrError> {
    let candidate = body
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| OcrError::MalformedResponse("response has no candidates".into()))?;

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if reason == "SAFETY" || reason == "RECITATION" {
            return Err(OcrError::MalformedResponse(format!(
                "generation stopped: {reason}"
            )));
        }
    }

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        debug!("Candidate carried no text; treating page as blank");
    }
    Ok(text)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}\u{2026}")
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

// ── Whole-PDF OCR ────────────────────────────────────────────────────────

/// Render → encode → dispatch → clean → join, for one PDF at a time.
pub struct VisionOcr {
    config: OcrConfig,
    lanes: Vec<Lane>,
    available: bool,
}

impl VisionOcr {
    /// Build one Gemini lane per configured credential and probe pdfium.
    pub fn from_config(config: &OcrConfig) -> Self {
        let mut lanes = Vec::new();
        if config.is_configured() {
            for key in &config.credentials {
                match GeminiBackend::new(config, key.clone()) {
                    Ok(backend) => lanes.push(Lane::new(
                        Arc::new(backend),
                        config.concurrency_per_credential,
                    )),
                    Err(e) => warn!("OCR credential skipped: {}", e),
                }
            }
        }
        Self::with_lanes(config, lanes)
    }

    /// Use caller-supplied lanes (custom backends, tests).
    pub fn with_lanes(config: &OcrConfig, lanes: Vec<Lane>) -> Self {
        let available = if !config.enabled {
            debug!("OCR disabled by configuration");
            false
        } else if lanes.is_empty() {
            debug!("OCR unavailable: no credentials");
            false
        } else if !render::pdfium_available(config.pdfium_lib_path.as_deref()) {
            warn!("OCR unavailable: pdfium library could not be loaded");
            false
        } else {
            info!("OCR enabled with {} credential lane(s)", lanes.len());
            true
        };

        Self {
            config: config.clone(),
            lanes,
            available,
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.config.max_retries,
            backoff_ms: self.config.retry_backoff_ms,
            call_timeout: Duration::from_secs(self.config.api_timeout_secs),
        }
    }
}

#[async_trait]
impl PdfOcr for VisionOcr {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn pdf_to_markdown(&self, path: &Path) -> Result<String, OcrError> {
        if !self.available {
            return Err(OcrError::Unavailable("OCR is not configured".into()));
        }
        let start = Instant::now();

        let rendered = render::render_pages(path, &self.config).await?;
        let encoding = self.config.image_encoding;
        let encoded = rendered
            .iter()
            .map(|(idx, img)| {
                encode_page(*idx, img, encoding).map_err(|e| OcrError::Render {
                    page: idx + 1,
                    detail: format!("image encoding failed: {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        drop(rendered);

        let page_count = encoded.len();
        let markdown = assemble_markdown(&self.lanes, encoded, &self.retry_policy()).await?;

        info!(
            "{}: OCR of {} pages in {}ms",
            path.display(),
            page_count,
            start.elapsed().as_millis()
        );
        Ok(markdown)
    }
}

/// Transcribe encoded pages, clean each one, and join them in page order.
/// Blank pages drop out of the join.
async fn assemble_markdown(
    lanes: &[Lane],
    encoded: Vec<EncodedPage>,
    policy: &RetryPolicy,
) -> Result<String, OcrError> {
    let pages = transcribe_pages(lanes, encoded, policy).await?;
    let cleaned: Vec<String> = pages.iter().map(|p| postprocess::clean_page(p)).collect();
    Ok(postprocess::join_pages(&cleaned))
}
