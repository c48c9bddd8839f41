//! Progress-callback trait for batch-run events.
//!
//! Inject an [`Arc<dyn RunProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to be told when
//! the walker starts an item, writes an artifact, or skips something.
//!
//! # Example
//!
//! ```rust
//! use batch2md::{BatchConfig, RunProgressCallback};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     written: AtomicUsize,
//! }
//!
//! impl RunProgressCallback for CountingCallback {
//!     fn on_item_written(&self, identifier: &str, artifact: &Path) {
//!         self.written.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{identifier} → {}", artifact.display());
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { written: AtomicUsize::new(0) });
//!
//! let config = BatchConfig::builder()
//!     .progress_callback(counter as Arc<dyn RunProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::walker::RunReport;
use std::path::Path;
use std::sync::Arc;

/// Called by the tree walker as it processes the input tree.
///
/// The walk is sequential, but implementations must still be `Send + Sync`
/// because the config (and therefore the callback) is shared with OCR tasks.
/// All methods default to no-ops.
pub trait RunProgressCallback: Send + Sync {
    /// Called once after the input and output roots are validated.
    fn on_run_start(&self, input_root: &Path) {
        let _ = input_root;
    }

    /// Called before an item (leaf folder, loose file, archive) is converted.
    ///
    /// `identifier` is the item's path relative to the input root.
    fn on_item_start(&self, identifier: &str) {
        let _ = identifier;
    }

    /// Called after an artifact has been written.
    fn on_item_written(&self, identifier: &str, artifact: &Path) {
        let _ = (identifier, artifact);
    }

    /// Called when an item (or an entry inside an archive) is skipped.
    fn on_item_skipped(&self, identifier: &str, reason: &str) {
        let _ = (identifier, reason);
    }

    /// Called once after the whole tree has been visited.
    fn on_run_complete(&self, report: &RunReport) {
        let _ = report;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RunProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn RunProgressCallback>;
