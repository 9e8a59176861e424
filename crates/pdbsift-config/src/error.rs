//! Error types for configuration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// File system operation failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// Configuration overlay could not be parsed.
    #[error("invalid configuration file")]
    Yaml {
        /// Overlay file that failed to parse.
        path: PathBuf,
        /// Source YAML error.
        source: serde_yaml::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(
        field: &'static str,
        reason: &'static str,
        value: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            field,
            reason,
            value: Some(value.into()),
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn invalid_helper_captures_value() {
        let err = ConfigError::invalid("queue_capacity", "must_be_positive", "0");
        assert_eq!(err.to_string(), "invalid configuration field");
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "queue_capacity",
                reason: "must_be_positive",
                value: Some(ref value),
            } if value == "0"
        ));
    }

    #[test]
    fn io_variant_exposes_source() {
        let err = ConfigError::Io {
            operation: "overlay.read",
            path: PathBuf::from("pdbsift.yaml"),
            source: io::Error::other("io"),
        };
        assert!(err.source().is_some());
    }
}
