//! Validation helpers for pipeline configuration.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::model::PipelineConfig;

/// Validate a resolved configuration before any worker starts.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the suffix is empty or contains
/// a path separator, the queue capacity is zero, the log format is unknown,
/// the root is missing or not a directory, or the output directory is the
/// root itself or lives inside it.
/// Returns [`ConfigError::Io`] when paths cannot be resolved.
pub fn validate(config: &PipelineConfig) -> ConfigResult<()> {
    validate_suffix(&config.compressed_suffix)?;
    validate_queue_capacity(config.queue_capacity)?;
    if config.log_level.trim().is_empty() {
        return Err(ConfigError::invalid("log_level", "empty", ""));
    }
    if let Some(format) = &config.log_format {
        validate_log_format(format)?;
    }
    let root = resolve_root(&config.root)?;
    ensure_output_outside_root(&root, &config.output_dir)
}

pub(crate) fn validate_suffix(suffix: &str) -> ConfigResult<()> {
    if suffix.is_empty() {
        return Err(ConfigError::invalid("compressed_suffix", "empty", suffix));
    }
    if suffix.contains('/') || suffix.contains(std::path::MAIN_SEPARATOR) {
        return Err(ConfigError::invalid(
            "compressed_suffix",
            "contains_separator",
            suffix,
        ));
    }
    Ok(())
}

pub(crate) fn validate_queue_capacity(capacity: usize) -> ConfigResult<()> {
    if capacity == 0 {
        return Err(ConfigError::invalid(
            "queue_capacity",
            "must_be_positive",
            capacity.to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_log_format(format: &str) -> ConfigResult<()> {
    match format.trim().to_ascii_lowercase().as_str() {
        "pretty" | "text" | "json" => Ok(()),
        _ => Err(ConfigError::invalid("log_format", "unknown_format", format)),
    }
}

fn resolve_root(root: &Path) -> ConfigResult<PathBuf> {
    let metadata = match root.metadata() {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(ConfigError::invalid(
                "root",
                "missing",
                root.display().to_string(),
            ));
        }
        Err(source) => {
            return Err(ConfigError::Io {
                operation: "validate.root_metadata",
                path: root.to_path_buf(),
                source,
            });
        }
    };
    if !metadata.is_dir() {
        return Err(ConfigError::invalid(
            "root",
            "not_a_directory",
            root.display().to_string(),
        ));
    }
    root.canonicalize().map_err(|source| ConfigError::Io {
        operation: "validate.root_canonicalize",
        path: root.to_path_buf(),
        source,
    })
}

fn ensure_output_outside_root(root: &Path, output_dir: &Path) -> ConfigResult<()> {
    if output_dir.exists() && !output_dir.is_dir() {
        return Err(ConfigError::invalid(
            "output_dir",
            "not_a_directory",
            output_dir.display().to_string(),
        ));
    }
    let resolved = resolve_lenient(output_dir)?;
    if resolved.starts_with(root) {
        return Err(ConfigError::invalid(
            "output_dir",
            "inside_root",
            output_dir.display().to_string(),
        ));
    }
    Ok(())
}

/// Canonicalize the deepest existing ancestor of `path` and re-append the
/// components that do not exist yet.
pub(crate) fn resolve_lenient(path: &Path) -> ConfigResult<PathBuf> {
    let absolute = std::path::absolute(path).map_err(|source| ConfigError::Io {
        operation: "validate.absolute",
        path: path.to_path_buf(),
        source,
    })?;

    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    while !existing.exists() {
        let Some(parent) = existing.parent() else {
            return Ok(absolute);
        };
        if let Some(name) = existing.file_name() {
            missing.push(name.to_os_string());
        }
        existing = parent;
    }

    let mut resolved = existing.canonicalize().map_err(|source| ConfigError::Io {
        operation: "validate.canonicalize",
        path: existing.to_path_buf(),
        source,
    })?;
    for name in missing.into_iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}
