//! Archive expander: ZIP in, one combined Markdown document out.
//!
//! Each archive is extracted into its own uniquely named scratch directory
//! (`batch2md-XXXXXX`), every visible file inside is converted, and the
//! successful units are combined. The scratch directory is a
//! [`tempfile::TempDir`] guard, so it is removed on every exit path; on the
//! normal path it is closed explicitly so that a failed removal is logged.
//!
//! Entries are visited depth-first with each directory's children sorted by
//! file name. Identifiers are the entry paths relative to the archive root,
//! joined with `/` on every platform.

use crate::combine::{combine, ConversionUnit};
use crate::config::BatchConfig;
use crate::convert::FileConverter;
use crate::error::ArchiveError;
use crate::tree::is_hidden;
use crate::walker::{SkipKind, SkippedItem};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

/// Result of expanding one archive.
#[derive(Debug, Clone)]
pub struct ArchiveOutcome {
    /// Combined document of every converted entry.
    pub markdown: String,
    /// Number of entries that converted.
    pub converted: usize,
    /// Entries that failed, identified relative to the archive root.
    pub skipped: Vec<SkippedItem>,
}

pub struct ArchiveExpander {
    converter: FileConverter,
    hidden_prefix: String,
    scratch_parent: Option<PathBuf>,
}

impl ArchiveExpander {
    pub fn new(converter: FileConverter, hidden_prefix: impl Into<String>) -> Self {
        Self {
            converter,
            hidden_prefix: hidden_prefix.into(),
            scratch_parent: None,
        }
    }

    /// Create scratch directories under `dir` instead of the system temp dir.
    pub fn with_scratch_parent(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_parent = Some(dir.into());
        self
    }

    pub fn from_config(config: &BatchConfig, converter: FileConverter) -> Self {
        let expander = Self::new(converter, config.hidden_prefix.clone());
        match &config.scratch_dir {
            Some(dir) => expander.with_scratch_parent(dir.clone()),
            None => expander,
        }
    }

    /// Extract `zip_path`, convert its entries, and combine them.
    ///
    /// # Errors
    /// Corrupt or unreadable archives, and archives where no entry converted.
    /// The scratch directory is removed in every case.
    pub async fn expand_and_convert(&self, zip_path: &Path) -> Result<ArchiveOutcome, ArchiveError> {
        let scratch = self.scratch_dir()?;
        let scratch_path = scratch.path().to_path_buf();
        debug!("{}: scratch dir {}", zip_path.display(), scratch_path.display());

        let result = self.convert_in(zip_path, &scratch_path).await;

        match scratch.close() {
            Ok(()) => debug!("Removed scratch dir {}", scratch_path.display()),
            Err(e) => warn!(
                "Could not remove scratch dir {}: {}",
                scratch_path.display(),
                e
            ),
        }
        result
    }

    fn scratch_dir(&self) -> Result<TempDir, ArchiveError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("batch2md-");
        match &self.scratch_parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(ArchiveError::Scratch)
    }

    async fn convert_in(&self, zip_path: &Path, scratch: &Path) -> Result<ArchiveOutcome, ArchiveError> {
        let zip = zip_path.to_path_buf();
        let dest = scratch.to_path_buf();
        let prefix = self.hidden_prefix.clone();
        let files = tokio::task::spawn_blocking(move || {
            extract_all(&zip, &dest)?;
            enumerate_files(&zip, &dest, &prefix)
        })
        .await
        .map_err(|e| ArchiveError::Join(e.to_string()))??;

        info!("{}: {} file(s) extracted", zip_path.display(), files.len());

        let mut units = Vec::with_capacity(files.len());
        let mut skipped = Vec::new();
        for (identifier, path) in files {
            match self.converter.convert(&path).await {
                Ok(markdown) => units.push(ConversionUnit::new(identifier, markdown)),
                Err(e) => {
                    warn!("{}: skipping '{}': {}", zip_path.display(), identifier, e.source);
                    skipped.push(SkippedItem::new(
                        identifier,
                        SkipKind::ArchiveEntry,
                        e.source.to_string(),
                    ));
                }
            }
        }

        if units.is_empty() {
            return Err(ArchiveError::NothingConverted {
                path: zip_path.to_path_buf(),
                failed: skipped.len(),
            });
        }

        Ok(ArchiveOutcome {
            markdown: combine(&units),
            converted: units.len(),
            skipped,
        })
    }
}

fn extract_all(zip_path: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let file = File::open(zip_path).map_err(|source| ArchiveError::Open {
        path: zip_path.to_path_buf(),
        source,
    })?;
    let extract_err = |source| ArchiveError::Extract {
        path: zip_path.to_path_buf(),
        source,
    };
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(extract_err)?;
    // Entry names are sanitised by the zip crate; traversal entries are rejected.
    archive.extract(dest).map_err(extract_err)
}

/// Visible regular files under `root`, depth-first, sorted by name per level.
fn enumerate_files(
    zip_path: &Path,
    root: &Path,
    hidden_prefix: &str,
) -> Result<Vec<(String, PathBuf)>, ArchiveError> {
    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(&e.file_name().to_string_lossy(), hidden_prefix));

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| ArchiveError::Enumerate {
            path: zip_path.to_path_buf(),
            detail: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let identifier = entry_identifier(root, entry.path());
        files.push((identifier, entry.into_path()));
    }
    Ok(files)
}

fn entry_identifier(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combine::parse_headers;
    use crate::engine::PrimaryEngine;
    use crate::error::EngineError;
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::Arc;
    use zip::write::{FileOptions, ZipWriter};

    /// Echoes file contents; fails on files whose content starts with "FAIL".
    struct EchoEngine;

    #[async_trait]
    impl PrimaryEngine for EchoEngine {
        fn name(&self) -> &str {
            "echo"
        }

        async fn to_markdown(&self, path: &Path) -> Result<String, EngineError> {
            let text = tokio::fs::read_to_string(path).await.unwrap_or_default();
            if text.starts_with("FAIL") {
                return Err(EngineError::Failed {
                    program: "echo".into(),
                    status: Some(1),
                    stderr: "cannot convert".into(),
                });
            }
            Ok(format!("converted {text}"))
        }
    }

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        let options: FileOptions<()> = FileOptions::default();
        for (name, body) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    fn expander(scratch_parent: &Path) -> ArchiveExpander {
        ArchiveExpander::new(FileConverter::new(Arc::new(EchoEngine)), ".")
            .with_scratch_parent(scratch_parent)
    }

    fn is_empty_dir(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn nested_entries_are_combined_in_path_order() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let zip = tmp.path().join("bundle.zip");
        write_zip(&zip, &[("y/doc2.pptx", "two"), ("x/doc1.docx", "one")]);

        let outcome = expander(scratch.path()).expand_and_convert(&zip).await.unwrap();

        assert_eq!(outcome.converted, 2);
        assert!(outcome.skipped.is_empty());
        assert_eq!(
            parse_headers(&outcome.markdown),
            vec![(1, "x/doc1.docx".to_string()), (2, "y/doc2.pptx".to_string())]
        );
        assert!(outcome.markdown.contains("converted one"));
        assert!(is_empty_dir(scratch.path()), "scratch dir left behind");
    }

    #[tokio::test]
    async fn failed_entries_are_skipped_and_the_rest_combined() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let zip = tmp.path().join("mixed.zip");
        write_zip(&zip, &[("a.docx", "fine"), ("b.docx", "FAIL"), ("c.docx", "also fine")]);

        let outcome = expander(scratch.path()).expand_and_convert(&zip).await.unwrap();

        assert_eq!(outcome.converted, 2);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].identifier, "b.docx");
        assert_eq!(outcome.skipped[0].kind, SkipKind::ArchiveEntry);
        let ids: Vec<String> = parse_headers(&outcome.markdown).into_iter().map(|(_, id)| id).collect();
        assert_eq!(ids, vec!["a.docx", "c.docx"]);
    }

    #[tokio::test]
    async fn hidden_entries_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let zip = tmp.path().join("hidden.zip");
        write_zip(
            &zip,
            &[(".meta/info.txt", "x"), ("docs/.DS_Store", "x"), ("docs/real.docx", "r")],
        );

        let outcome = expander(scratch.path()).expand_and_convert(&zip).await.unwrap();
        assert_eq!(parse_headers(&outcome.markdown), vec![(1, "docs/real.docx".to_string())]);
    }

    #[tokio::test]
    async fn corrupt_archive_is_an_error_and_scratch_is_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let zip = tmp.path().join("corrupt.zip");
        std::fs::write(&zip, b"this is not a zip file").unwrap();

        let err = expander(scratch.path()).expand_and_convert(&zip).await.unwrap_err();
        assert!(matches!(err, ArchiveError::Extract { .. }), "got: {err}");
        assert!(is_empty_dir(scratch.path()), "scratch dir left behind");
    }

    #[tokio::test]
    async fn all_entries_failing_is_nothing_converted_and_scratch_is_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let zip = tmp.path().join("bad.zip");
        write_zip(&zip, &[("a.docx", "FAIL"), ("b/c.xlsx", "FAIL too")]);

        let err = expander(scratch.path()).expand_and_convert(&zip).await.unwrap_err();
        match err {
            ArchiveError::NothingConverted { failed, .. } => assert_eq!(failed, 2),
            other => panic!("unexpected: {other}"),
        }
        assert!(is_empty_dir(scratch.path()), "scratch dir left behind");
    }

    #[tokio::test]
    async fn missing_archive_is_an_open_error() {
        let scratch = tempfile::tempdir().unwrap();
        let err = expander(scratch.path())
            .expand_and_convert(Path::new("/definitely/not/here.zip"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Open { .. }), "got: {err}");
        assert!(is_empty_dir(scratch.path()));
    }

    #[test]
    fn identifiers_use_forward_slashes() {
        let root = Path::new("/tmp/scratch");
        assert_eq!(entry_identifier(root, &root.join("x").join("doc1.docx")), "x/doc1.docx");
    }
}
