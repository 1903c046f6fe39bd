//! Remote error model.
//!
//! # Design
//! - Whatever the service reports is kept verbatim in [`RemoteError`].
//! - [`ErrorClass`] is a coarse label derived from status and code; it never
//!   replaces the verbatim fields.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Error reported by the remote service, decoded from the response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteError {
    /// HTTP status code.
    pub status: u16,
    /// Service error code (`42501`, `PGRST116`, `user_not_found`, ...).
    pub code: Option<String>,
    /// Primary human-readable message.
    pub message: String,
    /// Additional detail supplied by the service.
    pub details: Option<String>,
    /// Hint supplied by the service.
    pub hint: Option<String>,
}

impl RemoteError {
    /// Decode a failed response body.
    ///
    /// Accepts the REST shape (`code/message/details/hint`), the auth shape
    /// (`code/error_code/msg`), the OAuth shape (`error/error_description`) and
    /// the storage shape (`statusCode/error/message`). Non-JSON bodies become
    /// the message as-is.
    #[must_use]
    pub fn from_body(status: u16, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body).trim().to_string();
        let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(body) else {
            let message = if text.is_empty() {
                format!("request failed with status {status}")
            } else {
                text
            };
            return Self {
                status,
                code: None,
                message,
                details: None,
                hint: None,
            };
        };

        let string_field = |name: &str| {
            fields.get(name).and_then(|value| match value {
                Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
                Value::Null | Value::String(_) => None,
                other => Some(other.to_string()),
            })
        };
        let textual = |name: &str| {
            fields
                .get(name)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        };

        let code = textual("code")
            .or_else(|| textual("error_code"))
            .or_else(|| string_field("code"));
        let message = textual("message")
            .or_else(|| textual("msg"))
            .or_else(|| textual("error_description"))
            .or_else(|| textual("error"))
            .unwrap_or_else(|| {
                if text.is_empty() {
                    format!("request failed with status {status}")
                } else {
                    text.clone()
                }
            });

        Self {
            status,
            code,
            message,
            details: string_field("details"),
            hint: string_field("hint"),
        }
    }

    /// Coarse classification of this error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        ErrorClass::classify(self.status, self.code.as_deref())
    }
}

/// Coarse error classification used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Record, table, account or object does not exist.
    NotFound,
    /// Row-level security or role check rejected the request.
    PermissionDenied,
    /// The key was missing, malformed or expired.
    Unauthorized,
    /// Unique, foreign key, not-null or check constraint violated.
    ConstraintViolation,
    /// Malformed value, unknown column or bad request shape.
    InvalidInput,
    /// Conflicting state (e.g., account already registered).
    Conflict,
    /// Anything else, including transport failures.
    Other,
}

impl ErrorClass {
    /// Derive a class from status code and optional service code.
    #[must_use]
    pub fn classify(status: u16, code: Option<&str>) -> Self {
        match code {
            Some("PGRST116" | "PGRST205" | "42P01" | "user_not_found") => return Self::NotFound,
            Some("42501") => return Self::PermissionDenied,
            Some("PGRST301" | "PGRST302") => return Self::Unauthorized,
            Some("42703" | "PGRST204" | "validation_failed") => return Self::InvalidInput,
            Some("email_exists" | "user_already_exists") => return Self::Conflict,
            Some(code) if code.len() == 5 && code.starts_with("23") => {
                return Self::ConstraintViolation;
            }
            Some(code) if code.len() == 5 && code.starts_with("22") => return Self::InvalidInput,
            _ => {}
        }
        match status {
            401 => Self::Unauthorized,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            409 => Self::Conflict,
            400 | 422 => Self::InvalidInput,
            _ => Self::Other,
        }
    }

    /// Stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
            Self::Unauthorized => "unauthorized",
            Self::ConstraintViolation => "constraint_violation",
            Self::InvalidInput => "invalid_input",
            Self::Conflict => "conflict",
            Self::Other => "other",
        }
    }
}

/// Errors raised by backend calls.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The service answered with a non-success status.
    #[error("{operation} failed with status {}: {}", .remote.status, .remote.message)]
    Remote {
        /// Operation identifier.
        operation: &'static str,
        /// Verbatim remote error.
        remote: RemoteError,
    },
    /// The request never produced a response.
    #[error("request for {operation} failed")]
    Transport {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying HTTP error.
        source: reqwest::Error,
    },
    /// The response body could not be decoded.
    #[error("failed to decode {operation} response")]
    Decode {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// A count request came back without an exact total.
    #[error("{operation} response did not carry an exact Content-Range total")]
    MissingCount {
        /// Operation identifier.
        operation: &'static str,
    },
    /// A request URL could not be built from the base URL.
    #[error("cannot build URL for {operation}: {reason}")]
    InvalidUrl {
        /// Operation identifier.
        operation: &'static str,
        /// Description of the problem.
        reason: &'static str,
    },
    /// A configured credential cannot be sent as a header.
    #[error("credential for header '{name}' contains invalid characters")]
    InvalidHeader {
        /// Header name.
        name: &'static str,
    },
    /// A table, column, bucket or object name was rejected locally.
    #[error("invalid {kind} '{value}'")]
    InvalidIdentifier {
        /// What kind of name was rejected.
        kind: &'static str,
        /// Offending value.
        value: String,
    },
    /// A filter expression could not be parsed.
    #[error("invalid filter '{input}': {reason}")]
    InvalidFilter {
        /// Raw filter expression.
        input: String,
        /// Description of the problem.
        reason: &'static str,
    },
    /// A bulk mutation was requested without any filter.
    #[error("refusing to {operation} every row of '{table}' without a filter")]
    Unfiltered {
        /// Mutation name.
        operation: &'static str,
        /// Target table.
        table: String,
    },
}

impl BackendError {
    /// Verbatim remote error, when the failure came from the service.
    #[must_use]
    pub const fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote { remote, .. } => Some(remote),
            _ => None,
        }
    }

    /// Coarse classification of this failure.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Remote { remote, .. } => remote.class(),
            Self::InvalidIdentifier { .. } | Self::InvalidFilter { .. } | Self::Unfiltered { .. } => {
                ErrorClass::InvalidInput
            }
            Self::Transport { .. }
            | Self::Decode { .. }
            | Self::MissingCount { .. }
            | Self::InvalidUrl { .. }
            | Self::InvalidHeader { .. } => ErrorClass::Other,
        }
    }
}

/// Convenience alias for backend results.
pub type BackendResult<T> = Result<T, BackendError>;
