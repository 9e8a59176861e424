//! Typed configuration models.
//!
//! # Design
//! - Pure data carriers consumed by the pipeline coordinator and the CLI.
//! - The YAML overlay only carries optional tuning knobs; input and output
//!   directories always come from the command line.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Fully resolved configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineConfig {
    /// Directory whose immediate subdirectories are the shard folders.
    pub root: PathBuf,
    /// Flat directory receiving every file that passes validation.
    pub output_dir: PathBuf,
    /// Suffix identifying compressed files (e.g. `.gz`).
    pub compressed_suffix: String,
    /// Capacity of each bounded stage queue.
    pub queue_capacity: usize,
    /// File that receives a copy of every log line.
    pub log_file: PathBuf,
    /// Log level directive used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Optional log format name (`pretty` or `json`).
    pub log_format: Option<String>,
}

impl PipelineConfig {
    /// Build a configuration with default tuning for the given directories.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            output_dir: output_dir.into(),
            compressed_suffix: defaults::COMPRESSED_SUFFIX.to_string(),
            queue_capacity: defaults::QUEUE_CAPACITY,
            log_file: PathBuf::from(defaults::LOG_FILE),
            log_level: defaults::LOG_LEVEL.to_string(),
            log_format: None,
        }
    }

    /// Apply every value present in `overlay`, leaving the rest untouched.
    pub fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        let ConfigOverlay {
            compressed_suffix,
            queue_capacity,
            log_file,
            log_level,
            log_format,
        } = overlay;
        if let Some(suffix) = compressed_suffix {
            self.compressed_suffix = suffix;
        }
        if let Some(capacity) = queue_capacity {
            self.queue_capacity = capacity;
        }
        if let Some(path) = log_file {
            self.log_file = path;
        }
        if let Some(level) = log_level {
            self.log_level = level;
        }
        if log_format.is_some() {
            self.log_format = log_format;
        }
    }
}

/// Optional settings loaded from a YAML file or supplied as CLI overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverlay {
    /// Override for the compressed file suffix.
    pub compressed_suffix: Option<String>,
    /// Override for the queue capacity.
    pub queue_capacity: Option<usize>,
    /// Override for the log file location.
    pub log_file: Option<PathBuf>,
    /// Override for the log level.
    pub log_level: Option<String>,
    /// Override for the log format.
    pub log_format: Option<String>,
}
