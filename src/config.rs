//! Configuration types for a batch run.
//!
//! Everything a run needs is loaded once at startup into [`BatchConfig`]
//! (built through [`BatchConfigBuilder`]) and [`OcrConfig`] (read from the
//! environment), then passed by reference to every component. Nothing below
//! the CLI reads environment variables on its own.

use crate::error::BatchError;
use crate::progress::ProgressCallback;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default Gemini REST base URL used by the OCR backend.
pub const DEFAULT_OCR_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default vision model used for page OCR.
pub const DEFAULT_OCR_MODEL: &str = "gemini-2.0-flash";

/// Configuration for one batch run.
///
/// Built via [`BatchConfig::builder()`].
///
/// # Example
/// ```rust
/// use batch2md::BatchConfig;
///
/// let config = BatchConfig::builder()
///     .input_dir("docs")
///     .output_dir("markdown")
///     .build()
///     .unwrap();
/// assert_eq!(config.hidden_prefix, ".");
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Root of the tree to convert. Default: `input`.
    pub input_dir: PathBuf,

    /// Root of the mirrored output tree. Default: `output`.
    pub output_dir: PathBuf,

    /// Entries whose name starts with this prefix are ignored at every level,
    /// including inside archives. Default: `.`.
    pub hidden_prefix: String,

    /// Date stamp for every artifact of the run. `None` means today's local
    /// date, resolved once when the walker is created.
    pub run_date: Option<NaiveDate>,

    /// Parent directory for archive scratch directories. `None` uses the
    /// system temp directory.
    pub scratch_dir: Option<PathBuf>,

    /// Primary conversion engine program. Default: `markitdown`.
    pub converter_program: String,

    /// OCR settings for PDFs.
    pub ocr: OcrConfig,

    /// Optional run-progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            hidden_prefix: ".".to_string(),
            run_date: None,
            scratch_dir: None,
            converter_program: "markitdown".to_string(),
            ocr: OcrConfig::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .field("hidden_prefix", &self.hidden_prefix)
            .field("run_date", &self.run_date)
            .field("scratch_dir", &self.scratch_dir)
            .field("converter_program", &self.converter_program)
            .field("ocr", &self.ocr)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RunProgressCallback>"),
            )
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.input_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn hidden_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.hidden_prefix = prefix.into();
        self
    }

    pub fn run_date(mut self, date: NaiveDate) -> Self {
        self.config.run_date = Some(date);
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = Some(dir.into());
        self
    }

    pub fn converter_program(mut self, program: impl Into<String>) -> Self {
        self.config.converter_program = program.into();
        self
    }

    pub fn ocr(mut self, ocr: OcrConfig) -> Self {
        self.config.ocr = ocr;
        self
    }

    /// Turn OCR off regardless of what the environment says (`--no-ocr`).
    pub fn disable_ocr(mut self) -> Self {
        self.config.ocr.enabled = false;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, BatchError> {
        let c = &self.config;
        if c.hidden_prefix.is_empty() {
            return Err(BatchError::InvalidConfig(
                "hidden prefix must not be empty (it would hide every entry)".into(),
            ));
        }
        if c.converter_program.trim().is_empty() {
            return Err(BatchError::InvalidConfig(
                "converter program must not be empty".into(),
            ));
        }
        c.ocr.validate()?;
        Ok(self.config)
    }
}

// ── OCR ──────────────────────────────────────────────────────────────────

/// Encoding used for rendered pages sent to the OCR service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageEncoding {
    /// Lossless PNG (default). Text edges stay crisp.
    #[default]
    Png,
    /// Lossy JPEG; smaller uploads for very large scans.
    Jpeg,
}

impl ImageEncoding {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageEncoding::Png => "image/png",
            ImageEncoding::Jpeg => "image/jpeg",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" | "lossless" => Some(ImageEncoding::Png),
            "jpeg" | "jpg" | "lossy" => Some(ImageEncoding::Jpeg),
            _ => None,
        }
    }
}

/// OCR settings, loaded once from the environment.
///
/// OCR is only attempted for PDFs and only when [`OcrConfig::is_configured`]
/// holds and pdfium can be loaded.
#[derive(Clone, PartialEq)]
pub struct OcrConfig {
    /// Master switch (`OCR_ENABLED`). Default: true.
    pub enabled: bool,

    /// API credentials (`OCR_API_KEY`, `OCR_API_KEY_2`). Pages are dealt to
    /// credentials round-robin, each with its own concurrency budget.
    pub credentials: Vec<String>,

    /// Concurrent calls allowed per credential. Default: 100.
    pub concurrency_per_credential: usize,

    /// Rendering resolution in dots per inch. Range: 72–600. Default: 200.
    pub dpi: u32,

    /// Longest rendered edge in pixels, regardless of DPI. Default: 4000.
    pub max_rendered_pixels: u32,

    /// Page image encoding. Default: lossless PNG.
    pub image_encoding: ImageEncoding,

    /// Output-token budget for each OCR call. Default: 8192.
    pub max_output_tokens: u32,

    /// Vision model identifier. Default: [`DEFAULT_OCR_MODEL`].
    pub model: String,

    /// API base URL. Default: [`DEFAULT_OCR_ENDPOINT`].
    pub endpoint: String,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Per-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Retries per page on transient failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Explicit pdfium library (`PDFIUM_LIB_PATH`).
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            credentials: Vec::new(),
            concurrency_per_credential: 100,
            dpi: 200,
            max_rendered_pixels: 4000,
            image_encoding: ImageEncoding::default(),
            max_output_tokens: 8192,
            model: DEFAULT_OCR_MODEL.to_string(),
            endpoint: DEFAULT_OCR_ENDPOINT.to_string(),
            temperature: 0.1,
            api_timeout_secs: 120,
            max_retries: 3,
            retry_backoff_ms: 500,
            system_prompt: None,
            pdfium_lib_path: None,
        }
    }
}

impl fmt::Debug for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfig")
            .field("enabled", &self.enabled)
            .field("credentials", &format!("<{} redacted>", self.credentials.len()))
            .field("concurrency_per_credential", &self.concurrency_per_credential)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("image_encoding", &self.image_encoding)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .finish()
    }
}

impl OcrConfig {
    /// Read OCR settings from the process environment.
    pub fn from_env() -> Result<Self, BatchError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read OCR settings through an arbitrary lookup (the environment in
    /// production, a map in tests). Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BatchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut c = Self::default();

        c.credentials = ["OCR_API_KEY", "OCR_API_KEY_2"]
            .iter()
            .filter_map(|&k| get(k))
            .map(|v| v.trim().to_string())
            .collect();

        if let Some(v) = get("OCR_ENABLED") {
            c.enabled = parse_bool("OCR_ENABLED", &v)?;
        }
        if let Some(v) = get("OCR_CONCURRENCY_PER_KEY") {
            c.concurrency_per_credential = parse_num("OCR_CONCURRENCY_PER_KEY", &v)?;
        }
        if let Some(v) = get("OCR_DPI") {
            c.dpi = parse_num("OCR_DPI", &v)?;
        }
        if let Some(v) = get("OCR_IMAGE_FORMAT") {
            c.image_encoding = ImageEncoding::parse(&v).ok_or_else(|| {
                BatchError::InvalidConfig(format!(
                    "OCR_IMAGE_FORMAT must be png or jpeg, got '{v}'"
                ))
            })?;
        }
        if let Some(v) = get("OCR_MAX_OUTPUT_TOKENS") {
            c.max_output_tokens = parse_num("OCR_MAX_OUTPUT_TOKENS", &v)?;
        }
        if let Some(v) = get("OCR_MODEL") {
            c.model = v.trim().to_string();
        }
        if let Some(v) = get("OCR_ENDPOINT") {
            c.endpoint = v.trim().trim_end_matches('/').to_string();
        }
        if let Some(v) = get("OCR_TIMEOUT_SECS") {
            c.api_timeout_secs = parse_num("OCR_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("OCR_MAX_RETRIES") {
            c.max_retries = parse_num("OCR_MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("PDFIUM_LIB_PATH") {
            c.pdfium_lib_path = Some(PathBuf::from(v.trim()));
        }

        c.validate()?;
        Ok(c)
    }

    /// Enabled and holding at least one credential. Local dependencies
    /// (pdfium) are probed separately by the OCR pipeline.
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.credentials.is_empty()
    }

    fn validate(&self) -> Result<(), BatchError> {
        if self.dpi < 72 || self.dpi > 600 {
            return Err(BatchError::InvalidConfig(format!(
                "OCR DPI must be 72–600, got {}",
                self.dpi
            )));
        }
        if self.concurrency_per_credential == 0 {
            return Err(BatchError::InvalidConfig(
                "OCR concurrency per credential must be ≥ 1".into(),
            ));
        }
        if self.max_output_tokens == 0 {
            return Err(BatchError::InvalidConfig(
                "OCR max output tokens must be ≥ 1".into(),
            ));
        }
        if self.credentials.len() > 2 {
            return Err(BatchError::InvalidConfig(format!(
                "at most two OCR credentials are supported, got {}",
                self.credentials.len()
            )));
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, BatchError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(BatchError::InvalidConfig(format!(
            "{key} must be a boolean, got '{other}'"
        ))),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, BatchError> {
    value
        .trim()
        .parse()
        .map_err(|_| BatchError::InvalidConfig(format!("{key} must be a number, got '{value}'")))
}
