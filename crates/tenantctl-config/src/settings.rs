//! Typed backend connection settings.
//!
//! # Design
//! - Precedence is explicit override (CLI flag) > layered env map.
//! - Validation happens once here so downstream crates receive a usable URL,
//!   a non-empty privileged key and a safe tenant column name.

use std::time::Duration;

use url::Url;

use crate::env::EnvMap;
use crate::error::{ConfigError, ConfigResult};
use crate::secret::Secret;

/// Column used to scope record queries when none is configured.
pub const DEFAULT_TENANT_COLUMN: &str = "tenant_id";
/// HTTP timeout applied when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
const MAX_TIMEOUT_SECS: u64 = 300;

/// Environment keys, primary name first, fallbacks after.
pub mod keys {
    /// Service endpoint.
    pub const API_URL: &[&str] = &["TENANTCTL_API_URL", "SUPABASE_URL"];
    /// Privileged (row-level-security bypassing) key.
    pub const SERVICE_KEY: &[&str] = &["TENANTCTL_SERVICE_KEY", "SUPABASE_SERVICE_ROLE_KEY"];
    /// Anonymous key.
    pub const ANON_KEY: &[&str] = &["TENANTCTL_ANON_KEY", "SUPABASE_ANON_KEY"];
    /// Tenant partition column.
    pub const TENANT_COLUMN: &[&str] = &["TENANTCTL_TENANT_COLUMN"];
    /// HTTP timeout in seconds.
    pub const TIMEOUT_SECS: &[&str] = &["TENANTCTL_HTTP_TIMEOUT_SECS"];
}

/// Values supplied directly on the command line; these win over any env source.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    /// Service endpoint override.
    pub api_url: Option<String>,
    /// Privileged key override.
    pub service_key: Option<String>,
    /// Anonymous key override.
    pub anon_key: Option<String>,
    /// Tenant column override.
    pub tenant_column: Option<String>,
    /// Timeout override in seconds.
    pub timeout_secs: Option<u64>,
}

/// Resolved connection settings for the remote backend.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Base URL of the service (REST, auth and storage live beneath it).
    pub api_url: Url,
    /// Privileged key sent on every request.
    pub service_key: Secret,
    /// Anonymous key, only reported by `config show`.
    pub anon_key: Option<Secret>,
    /// Column holding the tenant identifier on tenant-scoped tables.
    pub tenant_column: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl BackendSettings {
    /// Resolve settings from overrides and an env map.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when the URL or privileged key is not
    /// supplied anywhere, and [`ConfigError::InvalidField`] when a value fails
    /// validation.
    pub fn from_env(env: &EnvMap, overrides: &SettingsOverrides) -> ConfigResult<Self> {
        let api_url = pick(overrides.api_url.as_deref(), env, keys::API_URL)
            .ok_or(ConfigError::Missing {
                key: keys::API_URL[0],
            })?;
        let service_key = pick(overrides.service_key.as_deref(), env, keys::SERVICE_KEY)
            .ok_or(ConfigError::Missing {
                key: keys::SERVICE_KEY[0],
            })?;
        let anon_key = pick(overrides.anon_key.as_deref(), env, keys::ANON_KEY);
        let tenant_column = pick(overrides.tenant_column.as_deref(), env, keys::TENANT_COLUMN)
            .unwrap_or(DEFAULT_TENANT_COLUMN);

        let timeout_secs = match overrides.timeout_secs {
            Some(value) => value,
            None => env
                .first_of(keys::TIMEOUT_SECS)
                .map(|(_, raw)| {
                    raw.parse::<u64>().map_err(|_| ConfigError::InvalidField {
                        field: "timeout",
                        value: Some(raw.to_string()),
                        reason: "must be an integer number of seconds",
                    })
                })
                .transpose()?
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        };

        let settings = Self {
            api_url: parse_api_url(api_url)?,
            service_key: parse_key("service_key", service_key)?,
            anon_key: anon_key.map(|key| parse_key("anon_key", key)).transpose()?,
            tenant_column: parse_identifier("tenant_column", tenant_column)?,
            timeout: parse_timeout(timeout_secs)?,
        };
        tracing::debug!(
            api_url = %settings.api_url,
            tenant_column = %settings.tenant_column,
            "resolved backend settings"
        );
        Ok(settings)
    }

    /// Redacted key/value view used by `config show`.
    #[must_use]
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        vec![
            ("api_url", self.api_url.to_string()),
            ("service_key", self.service_key.redacted()),
            (
                "anon_key",
                self.anon_key
                    .as_ref()
                    .map_or_else(|| "<unset>".to_string(), Secret::redacted),
            ),
            ("tenant_column", self.tenant_column.clone()),
            ("timeout_secs", self.timeout.as_secs().to_string()),
        ]
    }
}

fn pick<'a>(explicit: Option<&'a str>, env: &'a EnvMap, keys: &[&str]) -> Option<&'a str> {
    explicit
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| env.first_of(keys).map(|(_, value)| value))
}

fn parse_api_url(raw: &str) -> ConfigResult<Url> {
    let url = Url::parse(raw).map_err(|_| ConfigError::InvalidField {
        field: "api_url",
        value: Some(raw.to_string()),
        reason: "must be an absolute URL",
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidField {
            field: "api_url",
            value: Some(raw.to_string()),
            reason: "scheme must be http or https",
        });
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidField {
            field: "api_url",
            value: Some(raw.to_string()),
            reason: "must include a host",
        });
    }
    Ok(url)
}

fn parse_key(field: &'static str, raw: &str) -> ConfigResult<Secret> {
    if raw.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidField {
            field,
            value: None,
            reason: "must not contain whitespace",
        });
    }
    Ok(Secret::new(raw))
}

/// Validate a plain SQL-style identifier (`[A-Za-z_][A-Za-z0-9_]*`).
fn parse_identifier(field: &'static str, raw: &str) -> ConfigResult<String> {
    let mut chars = raw.chars();
    let valid_head = chars
        .next()
        .is_some_and(|ch| ch.is_ascii_alphabetic() || ch == '_');
    if !valid_head || !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        return Err(ConfigError::InvalidField {
            field,
            value: Some(raw.to_string()),
            reason: "must be a plain identifier",
        });
    }
    Ok(raw.to_string())
}

fn parse_timeout(secs: u64) -> ConfigResult<Duration> {
    if !(1..=MAX_TIMEOUT_SECS).contains(&secs) {
        return Err(ConfigError::InvalidField {
            field: "timeout",
            value: Some(secs.to_string()),
            reason: "must be between 1 and 300 seconds",
        });
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> EnvMap {
        pairs.iter().copied().collect()
    }

    #[test]
    fn resolves_primary_keys_with_defaults() -> ConfigResult<()> {
        let settings = BackendSettings::from_env(
            &env(&[
                ("TENANTCTL_API_URL", "https://project.example.co"),
                ("TENANTCTL_SERVICE_KEY", "service-role-key-value"),
            ]),
            &SettingsOverrides::default(),
        )?;
        assert_eq!(settings.api_url.as_str(), "https://project.example.co/");
        assert_eq!(settings.service_key.expose(), "service-role-key-value");
        assert!(settings.anon_key.is_none());
        assert_eq!(settings.tenant_column, DEFAULT_TENANT_COLUMN);
        assert_eq!(settings.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        Ok(())
    }

    #[test]
    fn falls_back_to_legacy_key_names() -> ConfigResult<()> {
        let settings = BackendSettings::from_env(
            &env(&[
                ("SUPABASE_URL", "http://127.0.0.1:54321"),
                ("SUPABASE_SERVICE_ROLE_KEY", "legacy-key"),
                ("SUPABASE_ANON_KEY", "anon-key"),
            ]),
            &SettingsOverrides::default(),
        )?;
        assert_eq!(settings.service_key.expose(), "legacy-key");
        assert_eq!(
            settings.anon_key.as_ref().map(Secret::expose),
            Some("anon-key")
        );
        Ok(())
    }

    #[test]
    fn overrides_win_over_environment() -> ConfigResult<()> {
        let settings = BackendSettings::from_env(
            &env(&[
                ("TENANTCTL_API_URL", "https://env.example.co"),
                ("TENANTCTL_SERVICE_KEY", "env-key"),
                ("TENANTCTL_HTTP_TIMEOUT_SECS", "30"),
            ]),
            &SettingsOverrides {
                api_url: Some("https://flag.example.co".into()),
                tenant_column: Some("company_id".into()),
                timeout_secs: Some(5),
                ..SettingsOverrides::default()
            },
        )?;
        assert_eq!(settings.api_url.host_str(), Some("flag.example.co"));
        assert_eq!(settings.service_key.expose(), "env-key");
        assert_eq!(settings.tenant_column, "company_id");
        assert_eq!(settings.timeout, Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn missing_service_key_is_reported() {
        let err = BackendSettings::from_env(
            &env(&[("TENANTCTL_API_URL", "https://project.example.co")]),
            &SettingsOverrides::default(),
        )
        .expect_err("missing key should fail");
        assert!(matches!(
            err,
            ConfigError::Missing {
                key: "TENANTCTL_SERVICE_KEY"
            }
        ));
    }

    #[test]
    fn rejects_invalid_values() {
        let base = [("TENANTCTL_SERVICE_KEY", "key")];
        let cases: Vec<(Vec<(&str, &str)>, &str)> = vec![
            (vec![("TENANTCTL_API_URL", "ftp://files.example.co")], "api_url"),
            (vec![("TENANTCTL_API_URL", "not a url")], "api_url"),
            (
                vec![
                    ("TENANTCTL_API_URL", "https://x.example.co"),
                    ("TENANTCTL_TENANT_COLUMN", "tenant; drop"),
                ],
                "tenant_column",
            ),
            (
                vec![
                    ("TENANTCTL_API_URL", "https://x.example.co"),
                    ("TENANTCTL_HTTP_TIMEOUT_SECS", "0"),
                ],
                "timeout",
            ),
            (
                vec![
                    ("TENANTCTL_API_URL", "https://x.example.co"),
                    ("TENANTCTL_HTTP_TIMEOUT_SECS", "soon"),
                ],
                "timeout",
            ),
        ];
        for (pairs, expected) in cases {
            let mut map = env(&base);
            for (key, value) in pairs {
                map.insert(key, value);
            }
            let err = BackendSettings::from_env(&map, &SettingsOverrides::default())
                .expect_err("invalid value should fail");
            assert!(
                matches!(err, ConfigError::InvalidField { field, .. } if field == expected),
                "unexpected error for {expected}: {err:?}"
            );
        }
    }

    #[test]
    fn describe_redacts_secrets() -> ConfigResult<()> {
        let settings = BackendSettings::from_env(
            &env(&[
                ("TENANTCTL_API_URL", "https://project.example.co"),
                ("TENANTCTL_SERVICE_KEY", "sbp_0123456789abcdefghij"),
            ]),
            &SettingsOverrides::default(),
        )?;
        let described = settings.describe();
        let key = described
            .iter()
            .find(|(name, _)| *name == "service_key")
            .map(|(_, value)| value.as_str());
        assert_eq!(key, Some("sbp_***"));
        assert!(
            described
                .iter()
                .all(|(_, value)| !value.contains("0123456789"))
        );
        Ok(())
    }
}
