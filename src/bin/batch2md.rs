//! CLI binary for batch2md.
//!
//! A thin shim over the library crate that maps CLI flags and the
//! environment to `BatchConfig`, runs the walker, and prints a summary.

use anyhow::{Context, Result};
use batch2md::{BatchConfig, OcrConfig, ProgressCallback, RunProgressCallback, RunReport, TreeWalker};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner plus one log line per artifact or skip. The walk is not
/// pre-counted, so the bar shows a running count instead of a percentage.
struct CliProgressCallback {
    bar: ProgressBar,
    written: AtomicUsize,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  {pos:>4} written  ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            written: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
        })
    }
}

impl RunProgressCallback for CliProgressCallback {
    fn on_run_start(&self, input_root: &Path) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {}", input_root.display()))
        ));
    }

    fn on_item_start(&self, identifier: &str) {
        self.bar.set_message(identifier.to_string());
    }

    fn on_item_written(&self, identifier: &str, artifact: &Path) {
        self.written.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            identifier,
            dim(&format!("→ {}", artifact.display())),
        ));
        self.bar.inc(1);
    }

    fn on_item_skipped(&self, identifier: &str, reason: &str) {
        self.skipped.fetch_add(1, Ordering::SeqCst);

        let msg = if reason.chars().count() > 80 {
            let cut: String = reason.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            reason.to_string()
        };
        self.bar
            .println(format!("  {} {}  {}", red("✗"), identifier, red(&msg)));
    }

    fn on_run_complete(&self, _report: &RunReport) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r##"EXAMPLES:
  # Convert ./input into ./output
  batch2md

  # Explicit folders
  batch2md -i ~/dumps/contracts -o ~/markdown/contracts

  # Primary engine only (no OCR), JSON run report on stdout
  batch2md --no-ocr --json > report.json

OUTPUT LAYOUT:
  Interior folders are mirrored. Each leaf folder (no subfolders) becomes one
  file {folder}_{YYYY-MM-DD}.md with a "# file n - name" header per source
  file. Loose files and ZIP archives in interior folders each get their own
  {name}_{YYYY-MM-DD}.md. Entries starting with "." are ignored.

ENVIRONMENT VARIABLES (also read from ./.env):
  OCR_API_KEY              First Gemini API key (enables OCR for PDFs)
  OCR_API_KEY_2            Second key; pages are dealt round-robin
  OCR_ENABLED              Master OCR switch (default: true)
  OCR_CONCURRENCY_PER_KEY  Concurrent calls per key (default: 100)
  OCR_DPI                  Render resolution (default: 200)
  OCR_IMAGE_FORMAT         png or jpeg (default: png)
  OCR_MAX_OUTPUT_TOKENS    Output budget per page (default: 8192)
  OCR_MODEL                Vision model (default: gemini-2.0-flash)
  OCR_ENDPOINT             API base URL
  OCR_TIMEOUT_SECS         Per-call timeout (default: 120)
  OCR_MAX_RETRIES          Retries per page (default: 3)
  PDFIUM_LIB_PATH          Path to libpdfium (OCR needs it to render pages)
  MARKITDOWN_BIN           Primary converter program (default: markitdown)

OCR failures never lose a file: the whole PDF is re-converted with the
primary converter instead.
"##;

/// Batch-convert a document tree to Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "batch2md",
    version,
    about = "Batch-convert PDF, Office and ZIP document trees to Markdown",
    long_about = "Walk an input folder tree and convert every document to Markdown with \
markitdown (scanned PDFs through Gemini vision OCR when keys are configured). Interior \
folders are mirrored; leaf folders are combined into one document per folder.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input folder tree.
    #[arg(short, long, env = "BATCH2MD_INPUT", default_value = "input")]
    input: PathBuf,

    /// Output folder (created if missing).
    #[arg(short, long, env = "BATCH2MD_OUTPUT", default_value = "output")]
    output: PathBuf,

    /// Primary converter program.
    #[arg(long, env = "MARKITDOWN_BIN", default_value = "markitdown")]
    converter: String,

    /// Never use OCR, even when keys are configured.
    #[arg(long)]
    no_ocr: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress output.
    #[arg(long, env = "BATCH2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "BATCH2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "BATCH2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // `.env` must be loaded before clap reads `env = …` fallbacks.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress output is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn RunProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    if !cli.quiet && !cli.json && !cli.no_ocr && !config.ocr.is_configured() {
        eprintln!(
            "{}",
            dim("OCR off: set OCR_API_KEY to OCR scanned PDFs; using the primary converter only")
        );
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let walker = TreeWalker::from_config(config);
    let report = walker.run().await.context("Batch conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    }
    if !cli.quiet {
        print_summary(&report, &cli.output);
    }
    Ok(())
}

fn build_config(cli: &Cli, progress_cb: Option<ProgressCallback>) -> Result<BatchConfig> {
    let ocr = OcrConfig::from_env().context("Invalid OCR configuration")?;

    let mut builder = BatchConfig::builder()
        .input_dir(&cli.input)
        .output_dir(&cli.output)
        .converter_program(&cli.converter)
        .ocr(ocr);
    if cli.no_ocr {
        builder = builder.disable_ocr();
    }
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

fn print_summary(report: &RunReport, output: &Path) {
    let written = report.artifacts.len();
    let skipped = report.skipped.len();

    eprintln!(
        "{}  {} file(s) written  {}ms  →  {}",
        if skipped == 0 { green("✔") } else { cyan("⚠") },
        bold(&written.to_string()),
        report.duration_ms,
        bold(&output.display().to_string()),
    );
    if !report.empty_leaves.is_empty() {
        eprintln!(
            "   {}",
            dim(&format!("{} empty folder(s) produced no file", report.empty_leaves.len()))
        );
    }
    if skipped > 0 {
        eprintln!("   {} skipped:", red(&skipped.to_string()));
        for item in &report.skipped {
            eprintln!("     {} {}  {}", red("✗"), item.identifier, dim(&item.reason));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn long_help_documents_the_header_format() {
        Cli::command().debug_assert();
        let help = Cli::command().render_long_help().to_string();
        assert!(help.contains(r##""# file n - name""##));
        assert!(help.contains("OCR_API_KEY_2"));
    }
}
