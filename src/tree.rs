//! Directory listing and leaf classification.
//!
//! A directory is a **leaf** when none of its visible children is a
//! directory; its files are flattened into one combined document. Any other
//! directory is **interior** and gets mirrored into the output tree.
//!
//! Listings preserve the order returned by the operating system. That order is
//! what numbers the sections of a combined leaf document, so it is never
//! re-sorted here.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What a tree entry is, as far as the walker cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// A regular file with a `.zip` extension (any case).
    Zip,
}

/// A visible filesystem node under the input root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: PathBuf,
    pub name: String,
    pub kind: EntryKind,
}

impl TreeEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Whether `name` is hidden under the given prefix.
pub fn is_hidden(name: &str, hidden_prefix: &str) -> bool {
    !hidden_prefix.is_empty() && name.starts_with(hidden_prefix)
}

/// Whether `path` has a `.zip` extension, ignoring case.
pub fn is_zip_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
}

/// List the visible children of `dir` in directory-listing order.
///
/// Hidden entries and symlinks are left out. Entries whose names are not
/// valid UTF-8 are converted lossily.
pub fn list_entries(dir: &Path, hidden_prefix: &str) -> io::Result<Vec<TreeEntry>> {
    let mut entries = Vec::new();

    for dirent in fs::read_dir(dir)? {
        let dirent = dirent?;
        let name = dirent.file_name().to_string_lossy().into_owned();
        if is_hidden(&name, hidden_prefix) {
            continue;
        }

        let file_type = dirent.file_type()?;
        let path = dirent.path();
        let kind = if file_type.is_symlink() {
            debug!("Skipping symlink {}", path.display());
            continue;
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else if is_zip_path(&path) {
            EntryKind::Zip
        } else {
            EntryKind::File
        };

        entries.push(TreeEntry { path, name, kind });
    }

    Ok(entries)
}

/// Leaf classifier: true iff `dir` holds no visible subdirectory.
///
/// Looks at immediate children only. An empty directory is a leaf.
pub fn is_leaf(dir: &Path, hidden_prefix: &str) -> io::Result<bool> {
    Ok(is_leaf_listing(&list_entries(dir, hidden_prefix)?))
}

/// Leaf classification over an existing listing.
pub fn is_leaf_listing(entries: &[TreeEntry]) -> bool {
    !entries.iter().any(TreeEntry::is_dir)
}
