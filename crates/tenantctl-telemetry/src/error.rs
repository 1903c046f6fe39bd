//! Error types for logging setup.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while installing the logger.
#[derive(Debug)]
pub enum TelemetryError {
    /// The `--log-level` value is not a valid filter directive.
    InvalidLevel {
        /// Directive as given.
        level: String,
        /// Parser diagnostics.
        source: ParseError,
    },
    /// A global subscriber is already installed.
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        source: TryInitError,
    },
}

impl Display for TelemetryError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLevel { level, .. } => {
                write!(formatter, "invalid log level directive '{level}'")
            }
            Self::SubscriberInstall { .. } => formatter.write_str("logger is already installed"),
        }
    }
}

impl Error for TelemetryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidLevel { source, .. } => Some(source),
            Self::SubscriberInstall { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::EnvFilter;

    #[test]
    fn invalid_level_names_the_directive() {
        let Err(source) = EnvFilter::try_new("tenantctl=loudest") else {
            panic!("directive should be rejected");
        };
        let err = TelemetryError::InvalidLevel {
            level: "tenantctl=loudest".to_string(),
            source,
        };
        assert_eq!(
            err.to_string(),
            "invalid log level directive 'tenantctl=loudest'"
        );
        assert!(err.source().is_some());
    }
}
