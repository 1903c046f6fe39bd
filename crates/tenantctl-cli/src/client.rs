//! Dependency wiring, error types, and telemetry for the CLI.

use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::anyhow;
use rand::{Rng, distr::Alphanumeric};
use reqwest::{Client, Url};
use serde::Serialize;
use tenantctl_backend::{BackendClient, BackendError};
use tenantctl_config::{
    BackendSettings, ConfigError, EnvMap, SettingsOverrides, load_env_file,
};
use tenantctl_runner::{ActionRunner, RunnerError, RunnerOptions, TenantScope};

use crate::cli::{Cli, OutputFormat};

const TELEMETRY_ENDPOINT_ENV: &str = "TENANTCTL_TELEMETRY_ENDPOINT";
const DEFAULT_ENV_FILE: &str = ".env";

/// CLI-level error type separating bad input, remote failures and writes
/// that did not stick.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
    Verification(String),
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
            Self::Verification(_) => 4,
        }
    }

    pub(crate) const fn outcome(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid",
            Self::Failure(_) => "error",
            Self::Verification(_) => "unverified",
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) | Self::Verification(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.display_message())
    }
}

impl std::error::Error for CliError {}

impl From<RunnerError> for CliError {
    fn from(error: RunnerError) -> Self {
        Self::Validation(error.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::EnvFileRead { .. } => {
                Self::Validation(format!("{:#}", anyhow::Error::new(error)))
            }
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<BackendError> for CliError {
    fn from(error: BackendError) -> Self {
        match error {
            BackendError::InvalidHeader { .. }
            | BackendError::InvalidIdentifier { .. }
            | BackendError::InvalidFilter { .. }
            | BackendError::InvalidUrl { .. } => Self::Validation(error.to_string()),
            other => Self::Failure(anyhow::Error::new(other)),
        }
    }
}

/// Settings resolved from flags, the process environment and the env file.
pub(crate) fn resolve_settings(cli: &Cli) -> CliResult<BackendSettings> {
    let file_env = match &cli.env_file {
        Some(path) => load_env_file(path)?,
        None if Path::new(DEFAULT_ENV_FILE).is_file() => load_env_file(Path::new(DEFAULT_ENV_FILE))?,
        None => EnvMap::new(),
    };
    let env = EnvMap::layered(file_env, EnvMap::from_process());
    let overrides = SettingsOverrides {
        api_url: cli.api_url.clone(),
        service_key: cli.service_key.clone(),
        anon_key: cli.anon_key.clone(),
        tenant_column: cli.tenant_column.clone(),
        timeout_secs: cli.timeout,
    };
    Ok(BackendSettings::from_env(&env, &overrides)?)
}

/// Tenant scope selected on the command line.
pub(crate) fn tenant_scope(cli: &Cli, settings: &BackendSettings) -> CliResult<TenantScope> {
    let tenant = cli
        .tenant
        .as_deref()
        .map(str::trim)
        .filter(|tenant| !tenant.is_empty())
        .map(str::to_string);
    if cli.unscoped && tenant.is_some() {
        return Err(CliError::validation(
            "--tenant and --unscoped are mutually exclusive",
        ));
    }
    Ok(TenantScope {
        tenant,
        column: settings.tenant_column.clone(),
        unscoped: cli.unscoped,
    })
}

/// Application context passed to command handlers.
pub(crate) struct AppContext {
    pub(crate) runner: ActionRunner<BackendClient>,
    pub(crate) scope: TenantScope,
    pub(crate) output: OutputFormat,
}

impl AppContext {
    /// Wire the backend client and runner for one invocation.
    pub(crate) fn from_cli(cli: &Cli, settings: &BackendSettings, trace_id: &str) -> CliResult<Self> {
        let backend = BackendClient::new(settings, trace_id)?;
        let options = RunnerOptions {
            verify: !cli.no_verify,
            verify_delay: Duration::from_millis(cli.verify_delay_ms),
        };
        Ok(Self {
            runner: ActionRunner::new(backend, options),
            scope: tenant_scope(cli, settings)?,
            output: cli.output,
        })
    }
}

/// Telemetry emitter used to forward CLI outcomes.
#[derive(Clone)]
pub(crate) struct TelemetryEmitter {
    pub(crate) client: Client,
    pub(crate) endpoint: Url,
}

impl TelemetryEmitter {
    #[must_use]
    pub(crate) fn from_env() -> Option<Self> {
        let endpoint = std::env::var(TELEMETRY_ENDPOINT_ENV).ok()?;
        let endpoint = endpoint.parse().ok()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .ok()?;
        Some(Self { client, endpoint })
    }

    pub(crate) async fn emit(
        &self,
        trace_id: &str,
        command: &str,
        outcome: &str,
        exit_code: i32,
        message: Option<&str>,
    ) {
        let event = TelemetryEvent {
            command,
            outcome,
            trace_id,
            exit_code,
            message,
            timestamp_ms: timestamp_now_ms(),
        };

        if let Err(err) = self
            .client
            .post(self.endpoint.clone())
            .json(&event)
            .send()
            .await
        {
            tracing::debug!(error = %err, "telemetry emit failed");
        }
    }
}

#[derive(Serialize)]
struct TelemetryEvent<'a> {
    command: &'a str,
    outcome: &'a str,
    trace_id: &'a str,
    exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    timestamp_ms: u64,
}

/// Parse a URL flag value.
pub(crate) fn parse_url(input: &str) -> Result<String, String> {
    input
        .parse::<Url>()
        .map(|_| input.to_string())
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

/// Generate a random alphanumeric string of the requested length.
#[must_use]
pub(crate) fn random_string(len: usize) -> String {
    let mut rng = rand::rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric) as char)
        .take(len)
        .collect()
}

/// Millisecond timestamp helper for telemetry.
#[must_use]
pub(crate) fn timestamp_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Failure used when an action reports a remote error.
pub(crate) fn remote_failure(action: &str, message: &str) -> CliError {
    CliError::failure(anyhow!("{action} failed: {message}"))
}
