//! CLI error type and exit-code mapping.

use std::fmt::{self, Display, Formatter};

use pdbsift_config::ConfigError;

/// CLI-level error type to distinguish bad input from failed runs.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidField {
                field,
                reason,
                value: Some(value),
            } => Self::validation(format!("invalid {field} ({reason}): {value}")),
            ConfigError::InvalidField {
                field,
                reason,
                value: None,
            } => Self::validation(format!("invalid {field} ({reason})")),
            other => Self::validation(format!("{:#}", anyhow::Error::from(other))),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}
