//! # Design
//!
//! - Provide structured, constant-message errors for the shard pipeline.
//! - Capture operation context (paths, queues, stages) as fields, not in messages.
//! - Only folder-level failures surface as errors; per-file problems are
//!   resolved inside the stage that hits them and never cross a queue.

use std::io;
use std::path::PathBuf;

use pdbsift_config::ConfigError;
use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors produced by the shard pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// IO failures while interacting with the filesystem.
    #[error("pipeline io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Directory traversal failures.
    #[error("pipeline walkdir failure")]
    Walkdir {
        /// Operation that triggered the traversal failure.
        operation: &'static str,
        /// Path involved in the traversal failure.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// A compressed file could not be expanded.
    #[error("decompression failed")]
    Decompress {
        /// Compressed file that failed.
        path: PathBuf,
        /// Underlying decoder or IO error.
        source: io::Error,
    },
    /// JSON serialisation failures for run reports.
    #[error("pipeline json failure")]
    Json {
        /// Operation that triggered the JSON failure.
        operation: &'static str,
        /// Path involved in the JSON failure.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// The receiving side of a stage queue has gone away.
    #[error("stage queue closed")]
    QueueClosed {
        /// Name of the queue whose receiver was dropped.
        queue: &'static str,
    },
    /// The configuration failed validation before the run started.
    #[error("invalid pipeline configuration")]
    Config {
        /// Underlying configuration error.
        #[from]
        source: ConfigError,
    },
    /// Some survivors of a folder could not be moved into the output directory.
    #[error("folder relocation incomplete")]
    RelocationIncomplete {
        /// Folder whose survivors were only partially relocated.
        folder: PathBuf,
        /// Number of survivors that could not be moved.
        failed: usize,
    },
}

impl PipelineError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: serde_json::Error,
    ) -> Self {
        Self::Json {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Render the error with its context fields and source chain for log
    /// fields and reports.
    #[must_use]
    pub fn detail(&self) -> String {
        use std::error::Error as _;

        let mut rendered = self.to_string();
        if let Some(context) = self.context() {
            rendered.push_str(" (");
            rendered.push_str(&context);
            rendered.push(')');
        }
        let mut source = self.source();
        while let Some(cause) = source {
            rendered.push_str(": ");
            rendered.push_str(&cause.to_string());
            source = cause.source();
        }
        rendered
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Io {
                operation, path, ..
            }
            | Self::Walkdir {
                operation, path, ..
            }
            | Self::Json {
                operation, path, ..
            } => Some(format!("operation={operation}, path={}", path.display())),
            Self::Decompress { path, .. } => Some(format!("path={}", path.display())),
            Self::QueueClosed { queue } => Some(format!("queue={queue}")),
            Self::RelocationIncomplete { folder, failed } => {
                Some(format!("folder={}, failed={failed}", folder.display()))
            }
            Self::Config { .. } => None,
        }
    }
}
