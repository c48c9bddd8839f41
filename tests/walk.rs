//! Integration tests for the tree walker.
//!
//! Every test builds a small input tree in a temp dir and drives
//! `TreeWalker` with an in-process engine, so no `markitdown`, no pdfium and
//! no network are needed.

use async_trait::async_trait;
use batch2md::tree::list_entries;
use batch2md::{
    parse_artifact_name, parse_headers, BatchConfig, BatchError, EngineError, FileConverter,
    OcrError, PdfOcr, PrimaryEngine, RunProgressCallback, RunReport, SkipKind, TreeWalker,
};
use chrono::NaiveDate;
use std::fs::{self, create_dir_all, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use zip::write::{FileOptions, ZipWriter};

// ── Test helpers ─────────────────────────────────────────────────────────────

const DATE: &str = "2024-05-01";

fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

/// Returns `md(<file contents>)`; files containing exactly `FAIL` fail.
struct ContentEngine;

#[async_trait]
impl PrimaryEngine for ContentEngine {
    fn name(&self) -> &str {
        "content"
    }

    async fn to_markdown(&self, path: &Path) -> Result<String, EngineError> {
        let text = tokio::fs::read_to_string(path).await.unwrap_or_default();
        if text == "FAIL" {
            return Err(EngineError::Failed {
                program: "content".into(),
                status: Some(1),
                stderr: format!("cannot read {}", path.display()),
            });
        }
        Ok(format!("md({text})\n"))
    }
}

struct Fixture {
    _tmp: TempDir,
    input: PathBuf,
    output: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("input");
        let output = tmp.path().join("output");
        create_dir_all(&input).unwrap();
        Self { _tmp: tmp, input, output }
    }

    fn file(&self, rel: &str, body: &str) -> &Self {
        let path = self.input.join(rel);
        create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
        self
    }

    fn dir(&self, rel: &str) -> &Self {
        create_dir_all(self.input.join(rel)).unwrap();
        self
    }

    fn zip(&self, rel: &str, entries: &[(&str, &str)]) -> &Self {
        let path = self.input.join(rel);
        create_dir_all(path.parent().unwrap()).unwrap();
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        let options: FileOptions<()> = FileOptions::default();
        for (name, body) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        self
    }

    fn config(&self) -> batch2md::BatchConfigBuilder {
        BatchConfig::builder()
            .input_dir(&self.input)
            .output_dir(&self.output)
            .run_date(run_date())
            .disable_ocr()
    }

    fn converter() -> FileConverter {
        FileConverter::new(Arc::new(ContentEngine))
    }

    async fn run(&self) -> RunReport {
        let walker = TreeWalker::new(self.config().build().unwrap(), Self::converter());
        walker.run().await.expect("run should succeed")
    }

    fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.output.join(rel))
            .unwrap_or_else(|e| panic!("missing artifact {rel}: {e}"))
    }

    fn exists(&self, rel: &str) -> bool {
        self.output.join(rel).exists()
    }

    /// All files below the output root, relative and `/`-joined, sorted.
    fn output_files(&self) -> Vec<String> {
        let mut files: Vec<String> = walkdir::WalkDir::new(&self.output)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                e.path()
                    .strip_prefix(&self.output)
                    .unwrap()
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .collect();
        files.sort();
        files
    }
}

fn header_ids(doc: &str) -> Vec<String> {
    parse_headers(doc).into_iter().map(|(_, id)| id).collect()
}

// ── Layout ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn interior_folders_are_mirrored_and_leaves_combined() {
    let fx = Fixture::new();
    fx.file("report.pdf", "report")
        .file("folder/a.docx", "a")
        .file("folder/b.docx", "b")
        .file("folder/sub/c.xlsx", "c");

    let report = fx.run().await;

    assert_eq!(
        fx.output_files(),
        vec![
            format!("folder/a_{DATE}.md"),
            format!("folder/b_{DATE}.md"),
            format!("folder/sub/sub_{DATE}.md"),
            format!("report_{DATE}.md"),
        ]
    );
    assert_eq!(fx.read(&format!("report_{DATE}.md")), "md(report)\n");
    assert_eq!(fx.read(&format!("folder/a_{DATE}.md")), "md(a)\n");
    assert_eq!(
        fx.read(&format!("folder/sub/sub_{DATE}.md")),
        "# file 1 - c.xlsx\n\nmd(c)\n"
    );
    assert_eq!(report.artifacts.len(), 4);
    assert!(report.is_clean());
}

#[tokio::test]
async fn every_artifact_name_carries_the_run_date() {
    let fx = Fixture::new();
    fx.file("x.docx", "x")
        .file("deep/er/leaf/y.pptx", "y")
        .zip("bundle.zip", &[("z.txt", "z")]);

    let report = fx.run().await;

    assert_eq!(report.run_date, Some(run_date()));
    for artifact in &report.artifacts {
        let name = artifact.file_name().unwrap().to_string_lossy();
        let (_, date) = parse_artifact_name(&name).expect("dated artifact name");
        assert_eq!(date, run_date());
    }
    assert!(fx.exists(&format!("deep/er/leaf/leaf_{DATE}.md")));
}

#[tokio::test]
async fn root_leaf_is_combined_into_one_document_in_listing_order() {
    let fx = Fixture::new();
    fx.file("one.docx", "1").file("two.pptx", "2").file("three.xlsx", "3");

    fx.run().await;

    let expected_order: Vec<String> = list_entries(&fx.input, ".")
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    let doc = fx.read(&format!("input_{DATE}.md"));
    let headers = parse_headers(&doc);
    assert_eq!(headers.len(), 3);
    for (i, (n, id)) in headers.iter().enumerate() {
        assert_eq!(*n, i + 1);
        assert_eq!(id, &expected_order[i]);
    }
    assert_eq!(fx.output_files(), vec![format!("input_{DATE}.md")]);
}

// ── Archives ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn loose_archive_becomes_one_combined_artifact() {
    let fx = Fixture::new();
    fx.dir("other")
        .zip("archive.zip", &[("x/doc1.docx", "one"), ("y/doc2.pptx", "two")]);

    fx.run().await;

    let doc = fx.read(&format!("archive_{DATE}.md"));
    assert_eq!(
        parse_headers(&doc),
        vec![(1, "x/doc1.docx".to_string()), (2, "y/doc2.pptx".to_string())]
    );
    assert!(doc.contains("md(one)") && doc.contains("md(two)"));
}

#[tokio::test]
async fn archive_inside_a_leaf_is_one_unit_with_its_own_headers() {
    let fx = Fixture::new();
    fx.dir("top/sibling")
        .zip("top/leaf/pack.zip", &[("p.docx", "p"), ("q.docx", "q")]);

    fx.run().await;

    let doc = fx.read(&format!("top/leaf/leaf_{DATE}.md"));
    assert!(doc.starts_with("# file 1 - pack.zip\n\n# file 1 - p.docx\n"));
    assert_eq!(header_ids(&doc), vec!["pack.zip", "p.docx", "q.docx"]);
}

#[tokio::test]
async fn corrupt_archive_is_skipped_and_the_run_continues() {
    let fx = Fixture::new();
    fx.dir("empty").file("broken.zip", "not a zip").file("fine.docx", "ok");

    let report = fx.run().await;

    assert!(!fx.exists(&format!("broken_{DATE}.md")));
    assert!(fx.exists(&format!("fine_{DATE}.md")));
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].identifier, "broken.zip");
    assert_eq!(report.skipped[0].kind, SkipKind::Archive);
}

#[tokio::test]
async fn partially_failing_archive_reports_nested_identifiers() {
    let fx = Fixture::new();
    fx.dir("empty")
        .zip("mixed.zip", &[("good.docx", "g"), ("bad/b.docx", "FAIL")]);

    let report = fx.run().await;

    assert_eq!(header_ids(&fx.read(&format!("mixed_{DATE}.md"))), vec!["good.docx"]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].identifier, "mixed.zip/bad/b.docx");
    assert_eq!(report.skipped[0].kind, SkipKind::ArchiveEntry);
}

// ── Edge cases ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_leaf_produces_no_artifact() {
    let fx = Fixture::new();
    fx.dir("nothing/here").file("nothing/x.docx", "x");

    let report = fx.run().await;

    assert!(!fx.exists(&format!("nothing/here/here_{DATE}.md")));
    assert_eq!(report.empty_leaves, vec!["nothing/here".to_string()]);
    assert!(report.is_clean());
}

#[tokio::test]
async fn hidden_entries_are_ignored_everywhere() {
    let fx = Fixture::new();
    fx.file(".secret.docx", "s")
        .file(".git/config", "c")
        .file("visible.docx", "v")
        .file(".DS_Store", "junk");

    fx.run().await;

    // `.git` does not make the root interior; the root itself is a leaf.
    assert_eq!(fx.output_files(), vec![format!("input_{DATE}.md")]);
    let doc = fx.read(&format!("input_{DATE}.md"));
    assert_eq!(header_ids(&doc), vec!["visible.docx"]);
}

#[tokio::test]
async fn failing_file_is_recorded_and_siblings_still_convert() {
    let fx = Fixture::new();
    fx.dir("d/e").file("d/ok.docx", "ok").file("d/bad.docx", "FAIL");

    let report = fx.run().await;

    assert!(fx.exists(&format!("d/ok_{DATE}.md")));
    assert!(!fx.exists(&format!("d/bad_{DATE}.md")));
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].identifier, "d/bad.docx");
    assert!(report.skipped[0].reason.contains("cannot read"));
}

#[tokio::test]
async fn missing_input_root_is_fatal() {
    let fx = Fixture::new();
    let config = BatchConfig::builder()
        .input_dir(fx.input.join("nope"))
        .output_dir(&fx.output)
        .disable_ocr()
        .build()
        .unwrap();

    let err = TreeWalker::new(config, Fixture::converter()).run().await.unwrap_err();
    assert!(matches!(err, BatchError::InputRootMissing { .. }), "got: {err}");
    assert!(!fx.output.exists());
}

#[tokio::test]
async fn input_root_that_is_a_file_is_fatal() {
    let fx = Fixture::new();
    fx.file("plain.docx", "x");
    let config = BatchConfig::builder()
        .input_dir(fx.input.join("plain.docx"))
        .output_dir(&fx.output)
        .disable_ocr()
        .build()
        .unwrap();

    let err = TreeWalker::new(config, Fixture::converter()).run().await.unwrap_err();
    assert!(matches!(err, BatchError::InputRootNotADirectory { .. }), "got: {err}");
}

#[tokio::test]
async fn output_root_that_is_a_file_is_fatal() {
    let fx = Fixture::new();
    fx.file("a.docx", "a");
    fs::write(&fx.output, "not a folder").unwrap();

    let walker = TreeWalker::new(fx.config().build().unwrap(), Fixture::converter());
    let err = walker.run().await.unwrap_err();
    assert!(matches!(err, BatchError::OutputRootUncreatable { .. }), "got: {err}");
}

#[tokio::test]
async fn artifact_write_failure_stops_the_run() {
    let fx = Fixture::new();
    fx.file("sub/a.docx", "a").file("sub/b.docx", "b").dir("other/leaf");
    create_dir_all(&fx.output).unwrap();
    fs::write(fx.output.join("sub"), "blocks the mirrored folder").unwrap();

    let walker = TreeWalker::new(fx.config().build().unwrap(), Fixture::converter());
    let err = walker.run().await.unwrap_err();
    match err {
        BatchError::OutputWriteFailed { path, .. } => {
            assert!(path.starts_with(fx.output.join("sub")), "path: {}", path.display());
        }
        other => panic!("expected OutputWriteFailed, got: {other}"),
    }
}

// ── OCR fallback ─────────────────────────────────────────────────────────────

struct BrokenOcr {
    calls: AtomicUsize,
}

#[async_trait]
impl PdfOcr for BrokenOcr {
    fn is_available(&self) -> bool {
        true
    }

    async fn pdf_to_markdown(&self, _path: &Path) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(OcrError::Timeout { page: 1, secs: 120 })
    }
}

#[tokio::test]
async fn pdf_falls_back_to_primary_when_ocr_fails() {
    let fx = Fixture::new();
    fx.dir("empty").file("scan.pdf", "scanned").file("memo.docx", "memo");

    let ocr = Arc::new(BrokenOcr { calls: AtomicUsize::new(0) });
    let converter = Fixture::converter().with_ocr(ocr.clone());
    let report = TreeWalker::new(fx.config().build().unwrap(), converter)
        .run()
        .await
        .unwrap();

    assert_eq!(fx.read(&format!("scan_{DATE}.md")), "md(scanned)\n");
    assert_eq!(ocr.calls.load(Ordering::SeqCst), 1, "OCR only tried for the PDF");
    assert!(report.is_clean());
}

// ── Progress events ──────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingCallback {
    events: Mutex<Vec<String>>,
}

impl RunProgressCallback for RecordingCallback {
    fn on_run_start(&self, _input_root: &Path) {
        self.events.lock().unwrap().push("start".into());
    }

    fn on_item_written(&self, identifier: &str, _artifact: &Path) {
        self.events.lock().unwrap().push(format!("written:{identifier}"));
    }

    fn on_item_skipped(&self, identifier: &str, _reason: &str) {
        self.events.lock().unwrap().push(format!("skipped:{identifier}"));
    }

    fn on_run_complete(&self, report: &RunReport) {
        self.events
            .lock()
            .unwrap()
            .push(format!("complete:{}", report.artifacts.len()));
    }
}

#[tokio::test]
async fn progress_callback_sees_the_whole_run() {
    let fx = Fixture::new();
    fx.file("leaf/a.docx", "a").file("leaf/b.docx", "FAIL");

    let recorder = Arc::new(RecordingCallback::default());
    let config = fx
        .config()
        .progress_callback(recorder.clone() as Arc<dyn RunProgressCallback>)
        .build()
        .unwrap();
    TreeWalker::new(config, Fixture::converter()).run().await.unwrap();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec!["start", "skipped:leaf/b.docx", "written:leaf", "complete:1"]
    );
}
