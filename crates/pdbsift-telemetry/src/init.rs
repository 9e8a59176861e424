//! Telemetry initialisation primitives and logging configuration.
//!
//! # Design
//! - Centralises logging setup (fmt or JSON) with a single entry point.
//! - Every event is written to stdout and, when configured, appended to a log file.
//! - Records the build version once so every module reports the same value.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use once_cell::sync::OnceCell;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::error::{Result, TelemetryError};

/// Default logging target when `RUST_LOG` is not provided.
pub const DEFAULT_LOG_LEVEL: &str = "info";

static BUILD_VERSION: OnceCell<String> = OnceCell::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Configure and install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or if the tracing
/// subscriber cannot be installed (for example, because another subscriber has
/// already been set globally).
pub fn init_logging(config: &LoggingConfig<'_>) -> Result<()> {
    BUILD_VERSION
        .set(config.build_version.to_string())
        .ok()
        .or(Some(()));

    let mut layers: Vec<BoxedLayer> = vec![stdout_layer(config.format)];
    if let Some(path) = config.log_file {
        layers.push(file_layer(config.format, path)?);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(build_env_filter(config.level))
        .try_init()
        .map_err(|source| TelemetryError::SubscriberInstall { source })?;

    tracing::debug!(
        level = config.level,
        format = ?config.format,
        log_file = ?config.log_file,
        "logging initialised"
    );
    Ok(())
}

/// Access the build version recorded during logging initialisation.
#[must_use]
pub fn build_version() -> &'static str {
    BUILD_VERSION.get().map_or("dev", String::as_str)
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Log level string (e.g., `info`, `debug`).
    pub level: &'a str,
    /// Output format selection for the tracing subscriber.
    pub format: LogFormat,
    /// Build version recorded in structured logs.
    pub build_version: &'a str,
    /// Optional file that receives a copy of every log line.
    pub log_file: Option<&'a Path>,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::infer(),
            build_version: build_version(),
            log_file: None,
        }
    }
}

/// Available output formats for the logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Emit logs as structured JSON objects.
    Json,
    /// Emit human-readable log lines.
    Pretty,
}

impl LogFormat {
    /// Choose a sensible default for the current build.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }

    /// Resolve a format from its configuration name, falling back to [`LogFormat::infer`]
    /// for unknown values.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" | "text" => Self::Pretty,
            _ => Self::infer(),
        }
    }
}

fn stdout_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(false)
            .with_thread_ids(false)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .boxed(),
    }
}

fn file_layer(format: LogFormat, path: &Path) -> Result<BoxedLayer> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| TelemetryError::LogFileOpen {
            path: path.to_path_buf(),
            source,
        })?;
    let writer = Mutex::new(file);

    let layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false)
            .boxed(),
    };
    Ok(layer)
}

fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_from_name_parses_variants() {
        assert_eq!(LogFormat::from_name("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_name(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::from_name("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_name("unknown"), LogFormat::infer());
    }

    #[test]
    fn file_layer_rejects_missing_parent_directory() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("missing").join("process.log");
        let Err(err) = file_layer(LogFormat::Pretty, &path) else {
            anyhow::bail!("expected log file open failure");
        };
        assert!(matches!(err, TelemetryError::LogFileOpen { .. }));
        Ok(())
    }

    #[test]
    fn init_logging_installs_subscriber_once() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let log_path = temp.path().join("process.log");
        let config = LoggingConfig {
            level: "info",
            format: LogFormat::Pretty,
            build_version: "0.1.0-test",
            log_file: Some(&log_path),
        };
        init_logging(&config)?;
        assert!(log_path.exists());
        assert_eq!(build_version(), "0.1.0-test");

        let second = init_logging(&LoggingConfig {
            build_version: "ignored",
            ..config
        });
        assert!(matches!(
            second,
            Err(TelemetryError::SubscriberInstall { .. })
        ));
        assert_eq!(build_version(), "0.1.0-test");
        Ok(())
    }
}
