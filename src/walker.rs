//! Tree walker: input tree in, mirrored tree of dated Markdown files out.
//!
//! ```text
//! input/                       output/
//! ├── report.pdf          ──▶  ├── report_2024-05-01.md
//! └── folder/                  └── folder/
//!     ├── a.docx          ──▶      ├── a_2024-05-01.md
//!     ├── b.docx          ──▶      ├── b_2024-05-01.md
//!     └── sub/                     └── sub/
//!         └── c.xlsx      ──▶          └── sub_2024-05-01.md
//! ```
//!
//! Interior directories are mirrored; their loose files and archives each get
//! their own artifact. Leaf directories are flattened: every file (and every
//! archive, as one unit) becomes a section of a single combined document
//! named after the folder.
//!
//! The walk is sequential. Per-item failures are logged, recorded in the
//! [`RunReport`], and never stop the run; only input/output root problems and
//! artifact write failures are fatal.

use crate::archive::ArchiveExpander;
use crate::combine::{combine, ConversionUnit};
use crate::config::BatchConfig;
use crate::convert::FileConverter;
use crate::error::BatchError;
use crate::naming::{artifact_name, dir_base_name, file_base_name};
use crate::tree::{is_leaf_listing, list_entries, EntryKind, TreeEntry};
use chrono::{Local, NaiveDate};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// What kind of item was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    /// A single file failed to convert.
    File,
    /// A whole archive was corrupt or produced nothing.
    Archive,
    /// One entry inside an otherwise converted archive.
    ArchiveEntry,
    /// A subdirectory could not be listed.
    Directory,
    /// A leaf folder where every file failed.
    Leaf,
}

/// One item left out of the output, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedItem {
    /// Path relative to the input root (`/`-separated).
    pub identifier: String,
    pub kind: SkipKind,
    pub reason: String,
}

impl SkippedItem {
    pub fn new(identifier: impl Into<String>, kind: SkipKind, reason: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            kind,
            reason: reason.into(),
        }
    }
}

/// Summary of one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// Date stamp used for every artifact name.
    pub run_date: Option<NaiveDate>,
    /// Artifacts written, in write order.
    pub artifacts: Vec<PathBuf>,
    /// Items that produced no output.
    pub skipped: Vec<SkippedItem>,
    /// Leaf folders with no visible files (no artifact written).
    pub empty_leaves: Vec<String>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Mutable state threaded through one walk.
#[derive(Default)]
struct RunState {
    report: RunReport,
    written: HashSet<PathBuf>,
    /// Canonical output root, never walked as input.
    output_root: Option<PathBuf>,
}

/// Walks an input tree and writes the mirrored Markdown tree.
pub struct TreeWalker {
    config: BatchConfig,
    converter: FileConverter,
    archives: ArchiveExpander,
    run_date: NaiveDate,
    root_name: String,
}

impl TreeWalker {
    /// Walker with an explicit converter (custom engines, tests).
    ///
    /// The run date is fixed here, so one walker stamps every artifact alike.
    pub fn new(config: BatchConfig, converter: FileConverter) -> Self {
        let run_date = config.run_date.unwrap_or_else(|| Local::now().date_naive());
        let archives = ArchiveExpander::from_config(&config, converter.clone());
        let root_name = root_name(&config.input_dir);
        Self {
            config,
            converter,
            archives,
            run_date,
            root_name,
        }
    }

    /// Walker using `markitdown` and, when configured, OCR for PDFs.
    pub fn from_config(config: BatchConfig) -> Self {
        let converter = FileConverter::from_config(&config);
        Self::new(config, converter)
    }

    pub fn run_date(&self) -> NaiveDate {
        self.run_date
    }

    /// Convert the whole input tree.
    ///
    /// # Errors
    /// Only fatal problems: a missing or unreadable input root, an output root
    /// that cannot be created, or an artifact that cannot be written.
    pub async fn run(&self) -> Result<RunReport, BatchError> {
        let start = Instant::now();
        let input_root = self.config.input_dir.as_path();
        let output_root = self.config.output_dir.as_path();

        check_input_root(input_root)?;
        std::fs::create_dir_all(output_root).map_err(|source| BatchError::OutputRootUncreatable {
            path: output_root.to_path_buf(),
            source,
        })?;

        let mut state = RunState {
            output_root: std::fs::canonicalize(output_root).ok(),
            ..RunState::default()
        };
        state.report.run_date = Some(self.run_date);

        let root_entries = list_entries(input_root, &self.config.hidden_prefix).map_err(|source| {
            BatchError::InputRootUnreadable {
                path: input_root.to_path_buf(),
                source,
            }
        })?;
        let root_entries = without_output_root(root_entries, &state);

        info!(
            "Converting {} → {} (run date {})",
            input_root.display(),
            output_root.display(),
            self.run_date
        );
        if let Some(cb) = &self.config.progress_callback {
            cb.on_run_start(input_root);
        }

        if is_leaf_listing(&root_entries) {
            debug!("Input root is a leaf folder");
            self.convert_leaf(input_root, root_entries, output_root, &self.root_name, &mut state)
                .await?;
        } else {
            self.walk_interior(input_root, root_entries, output_root.to_path_buf(), &mut state)
                .await?;
        }

        let mut report = state.report;
        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Run complete: {} artifact(s), {} skipped, {}ms",
            report.artifacts.len(),
            report.skipped.len(),
            report.duration_ms
        );
        if let Some(cb) = &self.config.progress_callback {
            cb.on_run_complete(&report);
        }
        Ok(report)
    }

    /// Synchronous wrapper around [`TreeWalker::run`].
    ///
    /// Creates a temporary tokio runtime internally.
    pub fn run_blocking(&self) -> Result<RunReport, BatchError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| BatchError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.run())
    }

    /// Mirror an interior directory: recurse into subdirectories, convert
    /// loose files and archives one artifact each.
    fn walk_interior<'a>(
        &'a self,
        dir: &'a Path,
        entries: Vec<TreeEntry>,
        out_dir: PathBuf,
        state: &'a mut RunState,
    ) -> BoxFuture<'a, Result<(), BatchError>> {
        async move {
            debug!("Interior folder {}", dir.display());
            for entry in entries {
                let identifier = self.identifier(&entry.path);
                match entry.kind {
                    EntryKind::Directory => {
                        let children = match list_entries(&entry.path, &self.config.hidden_prefix) {
                            Ok(children) => without_output_root(children, state),
                            Err(e) => {
                                self.skip(state, SkippedItem::new(identifier, SkipKind::Directory, e.to_string()));
                                continue;
                            }
                        };
                        let child_out = out_dir.join(&entry.name);
                        if is_leaf_listing(&children) {
                            self.convert_leaf(&entry.path, children, &child_out, &entry.name, state)
                                .await?;
                        } else {
                            self.walk_interior(&entry.path, children, child_out, state)
                                .await?;
                        }
                    }
                    EntryKind::File => {
                        self.notify_start(&identifier);
                        match self.converter.convert(&entry.path).await {
                            Ok(markdown) => {
                                let dest = out_dir.join(artifact_name(&file_base_name(&entry.path), self.run_date));
                                self.write_artifact(&identifier, &dest, &markdown, state).await?;
                            }
                            Err(e) => {
                                self.skip(state, SkippedItem::new(identifier, SkipKind::File, e.source.to_string()));
                            }
                        }
                    }
                    EntryKind::Zip => {
                        self.notify_start(&identifier);
                        if let Some(markdown) = self.expand_archive(&entry, &identifier, state).await {
                            let dest = out_dir.join(artifact_name(&file_base_name(&entry.path), self.run_date));
                            self.write_artifact(&identifier, &dest, &markdown, state).await?;
                        }
                    }
                }
            }
            Ok(())
        }
        .boxed()
    }

    /// Flatten a leaf folder into `out_dir/{base}_{date}.md`.
    async fn convert_leaf(
        &self,
        dir: &Path,
        entries: Vec<TreeEntry>,
        out_dir: &Path,
        base: &str,
        state: &mut RunState,
    ) -> Result<(), BatchError> {
        let leaf_id = self.identifier(dir);
        if entries.is_empty() {
            info!("{}: empty leaf folder, no artifact", dir.display());
            state.report.empty_leaves.push(leaf_id);
            return Ok(());
        }

        self.notify_start(&leaf_id);
        let mut units = Vec::with_capacity(entries.len());
        for entry in &entries {
            let identifier = self.identifier(&entry.path);
            let markdown = match entry.kind {
                EntryKind::Zip => self.expand_archive(entry, &identifier, state).await,
                _ => match self.converter.convert(&entry.path).await {
                    Ok(markdown) => Some(markdown),
                    Err(e) => {
                        self.skip(state, SkippedItem::new(identifier, SkipKind::File, e.source.to_string()));
                        None
                    }
                },
            };
            if let Some(markdown) = markdown {
                units.push(ConversionUnit::new(entry.name.clone(), markdown));
            }
        }

        if units.is_empty() {
            let reason = format!("none of {} file(s) could be converted", entries.len());
            self.skip(state, SkippedItem::new(leaf_id, SkipKind::Leaf, reason));
            return Ok(());
        }

        debug!("{}: combining {} unit(s)", dir.display(), units.len());
        let dest = out_dir.join(artifact_name(base, self.run_date));
        self.write_artifact(&leaf_id, &dest, &combine(&units), state).await
    }

    /// Expand one archive; entry and archive failures are recorded.
    async fn expand_archive(
        &self,
        entry: &TreeEntry,
        identifier: &str,
        state: &mut RunState,
    ) -> Option<String> {
        match self.archives.expand_and_convert(&entry.path).await {
            Ok(outcome) => {
                for item in outcome.skipped {
                    let nested = format!("{}/{}", identifier, item.identifier);
                    self.skip(state, SkippedItem { identifier: nested, ..item });
                }
                Some(outcome.markdown)
            }
            Err(e) => {
                self.skip(state, SkippedItem::new(identifier, SkipKind::Archive, e.to_string()));
                None
            }
        }
    }

    /// Atomic write: temp file next to the destination, then rename.
    async fn write_artifact(
        &self,
        identifier: &str,
        dest: &Path,
        markdown: &str,
        state: &mut RunState,
    ) -> Result<(), BatchError> {
        let write_err = |source| BatchError::OutputWriteFailed {
            path: dest.to_path_buf(),
            source,
        };

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        if !state.written.insert(dest.to_path_buf()) {
            warn!(
                "{}: overwrites an artifact written earlier in this run ({})",
                identifier,
                dest.display()
            );
        }

        let tmp_path = dest.with_extension("md.tmp");
        tokio::fs::write(&tmp_path, markdown).await.map_err(write_err)?;
        tokio::fs::rename(&tmp_path, dest).await.map_err(write_err)?;

        info!("Wrote {} ({} bytes)", dest.display(), markdown.len());
        state.report.artifacts.push(dest.to_path_buf());
        if let Some(cb) = &self.config.progress_callback {
            cb.on_item_written(identifier, dest);
        }
        Ok(())
    }

    fn skip(&self, state: &mut RunState, item: SkippedItem) {
        warn!("Skipped {}: {}", item.identifier, item.reason);
        if let Some(cb) = &self.config.progress_callback {
            cb.on_item_skipped(&item.identifier, &item.reason);
        }
        state.report.skipped.push(item);
    }

    fn notify_start(&self, identifier: &str) {
        if let Some(cb) = &self.config.progress_callback {
            cb.on_item_start(identifier);
        }
    }

    /// `/`-joined path relative to the input root; the root is its own name.
    fn identifier(&self, path: &Path) -> String {
        match path.strip_prefix(&self.config.input_dir) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            _ => self.root_name.clone(),
        }
    }
}

fn check_input_root(root: &Path) -> Result<(), BatchError> {
    let meta = std::fs::metadata(root).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => BatchError::InputRootMissing {
            path: root.to_path_buf(),
        },
        _ => BatchError::InputRootUnreadable {
            path: root.to_path_buf(),
            source,
        },
    })?;
    if !meta.is_dir() {
        return Err(BatchError::InputRootNotADirectory {
            path: root.to_path_buf(),
        });
    }
    Ok(())
}

/// Name of the input root itself. Roots such as `.` or `..` have no file
/// name of their own and are resolved against the filesystem.
fn root_name(input_dir: &Path) -> String {
    dir_base_name(input_dir)
        .or_else(|| {
            std::fs::canonicalize(input_dir)
                .ok()
                .and_then(|abs| dir_base_name(&abs))
        })
        .unwrap_or_else(|| "root".to_string())
}

/// Drop the output root from a listing when it sits inside the input tree.
fn without_output_root(entries: Vec<TreeEntry>, state: &RunState) -> Vec<TreeEntry> {
    let Some(output_root) = state.output_root.as_deref() else {
        return entries;
    };
    entries
        .into_iter()
        .filter(|entry| {
            let is_output = entry.is_dir()
                && std::fs::canonicalize(&entry.path).is_ok_and(|p| p == output_root);
            if is_output {
                debug!("{}: output folder, not walked", entry.path.display());
            }
            !is_output
        })
        .collect()
}
