//! Structured action results.

use serde::Serialize;
use serde_json::Value;
use tenantctl_backend::{BackendError, ErrorClass, suggest_remedy};

use crate::action::ActionName;

/// Overall result of one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The operation succeeded and, when checked, verified.
    Success,
    /// The remote operation failed.
    Failed,
    /// The operation was accepted but the follow-up read disagrees.
    VerificationFailed,
}

/// Failure details, carried verbatim from the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    /// Coarse classification.
    pub class: ErrorClass,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    /// Service error code.
    pub code: Option<String>,
    /// Primary message.
    pub message: String,
    /// Service-supplied details.
    pub details: Option<String>,
    /// Service-supplied hint.
    pub hint: Option<String>,
    /// Suggested next step for well-known codes.
    pub remedy: Option<&'static str>,
}

impl FailureReport {
    /// Capture a backend failure.
    #[must_use]
    pub fn from_backend(error: &BackendError) -> Self {
        match error.remote() {
            Some(remote) => Self {
                class: remote.class(),
                status: Some(remote.status),
                code: remote.code.clone(),
                message: remote.message.clone(),
                details: remote.details.clone(),
                hint: remote.hint.clone(),
                remedy: suggest_remedy(remote),
            },
            None => Self {
                class: error.class(),
                status: None,
                code: None,
                message: error_chain(error),
                details: None,
                hint: None,
                remedy: None,
            },
        }
    }

    /// Failure produced locally (e.g., no account matched an email).
    #[must_use]
    pub fn local(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            status: None,
            code: None,
            message: message.into(),
            details: None,
            hint: None,
            remedy: None,
        }
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Result of the follow-up read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verification {
    /// What was checked.
    pub check: String,
    /// Whether the remote state matches the request.
    pub passed: bool,
    /// What the follow-up read observed.
    pub observed: Value,
}

impl Verification {
    /// Passing check.
    #[must_use]
    pub fn passed(check: impl Into<String>, observed: Value) -> Self {
        Self {
            check: check.into(),
            passed: true,
            observed,
        }
    }

    /// Failing check.
    #[must_use]
    pub fn failed(check: impl Into<String>, observed: Value) -> Self {
        Self {
            check: check.into(),
            passed: false,
            observed,
        }
    }
}

/// Structured result of one action, rendered by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionReport {
    /// Action that ran; serialized as its dotted name.
    pub action: ActionName,
    /// Success and verified (or not verified at all).
    pub success: bool,
    /// Number of rows, accounts or objects the operation touched or returned.
    pub affected: u64,
    /// Operation payload.
    pub data: Value,
    /// Failure details, when the operation failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReport>,
    /// Follow-up check, when one ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
}

impl ActionReport {
    /// Successful, unverified result.
    #[must_use]
    pub const fn completed(action: ActionName, affected: u64, data: Value) -> Self {
        Self {
            action,
            success: true,
            affected,
            data,
            failure: None,
            verification: None,
        }
    }

    /// Failed result with nothing affected.
    #[must_use]
    pub const fn failed(action: ActionName, failure: FailureReport) -> Self {
        Self {
            action,
            success: false,
            affected: 0,
            data: Value::Null,
            failure: Some(failure),
            verification: None,
        }
    }

    /// Attach a verification result; a failed check clears `success`.
    #[must_use]
    pub fn with_verification(mut self, verification: Verification) -> Self {
        self.success = self.success && verification.passed;
        self.verification = Some(verification);
        self
    }

    /// Overall outcome.
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        if self.failure.is_some() {
            Outcome::Failed
        } else if self
            .verification
            .as_ref()
            .is_some_and(|verification| !verification.passed)
        {
            Outcome::VerificationFailed
        } else {
            Outcome::Success
        }
    }
}
