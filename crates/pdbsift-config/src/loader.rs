//! YAML overlay loading.
//!
//! # Design
//! - The overlay is optional; a missing `--config` flag means defaults apply.
//! - Unknown keys are rejected so typos surface instead of silently falling back.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::ConfigOverlay;

/// Read and parse a YAML overlay file.
///
/// An empty file yields an empty overlay.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be read and
/// [`ConfigError::Yaml`] when it is not a valid overlay document.
pub fn load_overlay(path: &Path) -> ConfigResult<ConfigOverlay> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "overlay.read",
        path: path.to_path_buf(),
        source,
    })?;
    let overlay = parse_overlay(&raw).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded configuration overlay");
    Ok(overlay)
}

fn parse_overlay(raw: &str) -> Result<ConfigOverlay, serde_yaml::Error> {
    if raw.trim().is_empty() {
        return Ok(ConfigOverlay::default());
    }
    serde_yaml::from_str(raw)
}
