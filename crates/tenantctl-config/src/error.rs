//! Error types for configuration loading.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was not supplied by any source.
    #[error("missing required setting '{key}'")]
    Missing {
        /// Primary environment key for the setting.
        key: &'static str,
    },
    /// A setting was supplied but failed validation.
    #[error("invalid value for '{field}': {reason}")]
    InvalidField {
        /// Setting that failed validation.
        field: &'static str,
        /// Offending value when it is safe to echo back.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// The env file could not be read.
    #[error("failed to read env file '{}'", path.display())]
    EnvFileRead {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The env file contained a line that is not `KEY=VALUE`.
    #[error("env file '{}' line {line}: {reason}", path.display())]
    EnvFileSyntax {
        /// Path of the offending file.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// Description of the problem.
        reason: &'static str,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
