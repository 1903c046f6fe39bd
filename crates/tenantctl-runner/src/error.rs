//! Errors raised while turning parameters into an action.

use std::io;
use std::path::PathBuf;

use tenantctl_backend::BackendError;
use thiserror::Error;

/// Parameter, scoping and input errors. Remote failures never surface here;
/// they are captured in the action report instead.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The action name is not in the catalogue.
    #[error("unknown action '{name}'")]
    UnknownAction {
        /// Name supplied by the caller.
        name: String,
    },
    /// A required parameter was not supplied.
    #[error("{action} requires parameter '{key}'")]
    MissingParam {
        /// Action being built.
        action: &'static str,
        /// Missing key.
        key: &'static str,
    },
    /// A parameter was supplied but could not be used.
    #[error("invalid parameter '{key}': {reason}")]
    InvalidParam {
        /// Offending key.
        key: String,
        /// Description of the problem.
        reason: String,
    },
    /// A parameter the action does not understand was supplied.
    #[error("{action} does not accept parameter '{key}'")]
    UnexpectedParam {
        /// Action being built.
        action: &'static str,
        /// Unrecognised key.
        key: String,
    },
    /// A record mutation was requested without a tenant.
    #[error("{action} requires a tenant (pass --tenant, or --unscoped to act on every tenant)")]
    TenantRequired {
        /// Action being built.
        action: &'static str,
    },
    /// A value for the tenant column disagrees with the selected tenant.
    #[error("'{column}' is set to '{found}' but the selected tenant is '{tenant}'")]
    TenantConflict {
        /// Tenant column.
        column: String,
        /// Selected tenant.
        tenant: String,
        /// Conflicting value.
        found: String,
    },
    /// A local file named by a parameter could not be read.
    #[error("failed to read '{}'", path.display())]
    ReadFile {
        /// Requested path.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A filter or identifier was rejected by the backend layer.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl RunnerError {
    pub(crate) fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParam {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias for runner results.
pub type RunnerResult<T> = Result<T, RunnerError>;
