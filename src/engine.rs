//! Primary conversion engine: any file in, Markdown out.
//!
//! The production engine shells out to the `markitdown` command-line tool,
//! which understands PDF, Office formats, HTML, CSV and more. The trait seam
//! exists so the walker can be driven by an in-process fake in tests.

use crate::error::EngineError;
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// A black-box converter from one file to Markdown text.
#[async_trait]
pub trait PrimaryEngine: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    /// Convert `path` to Markdown. Never returns partial output.
    async fn to_markdown(&self, path: &Path) -> Result<String, EngineError>;
}

/// Runs `<program> <file>` and captures stdout as the Markdown result.
#[derive(Debug, Clone)]
pub struct MarkItDown {
    program: String,
}

impl MarkItDown {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for MarkItDown {
    fn default() -> Self {
        Self::new("markitdown")
    }
}

#[async_trait]
impl PrimaryEngine for MarkItDown {
    fn name(&self) -> &str {
        &self.program
    }

    async fn to_markdown(&self, path: &Path) -> Result<String, EngineError> {
        debug!("Running {} {}", self.program, path.display());

        let output = Command::new(&self.program)
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(EngineError::Failed {
                program: self.program.clone(),
                status: output.status.code(),
                stderr,
            });
        }

        let markdown = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(
            "{} produced {} bytes for {}",
            self.program,
            markdown.len(),
            path.display()
        );
        Ok(markdown)
    }
}
