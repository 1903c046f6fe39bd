//! Parameter mapping handed to an action.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{RunnerError, RunnerResult};

/// Keys that may repeat; every occurrence is kept in order.
const REPEATABLE: &[&str] = &["filter", "set", "path"];

/// `key=value` parameters for one action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionParams {
    entries: BTreeMap<String, Vec<String>>,
}

impl ActionParams {
    /// Empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` tokens. Only the first `=` separates key from value,
    /// so `filter=email=eq.a@b.c` is a `filter` entry.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidParam`] for tokens without `=` or with an
    /// empty key, and for non-repeatable keys given twice.
    pub fn parse<I, S>(tokens: I) -> RunnerResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut params = Self::new();
        for token in tokens {
            let token = token.as_ref();
            let (key, value) = token
                .split_once('=')
                .ok_or_else(|| RunnerError::invalid(token, "expected key=value"))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(RunnerError::invalid(token, "key must not be empty"));
            }
            params.insert(key, value)?;
        }
        Ok(params)
    }

    /// Add one entry.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidParam`] when a non-repeatable key is
    /// supplied twice.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) -> RunnerResult<()> {
        let values = self.entries.entry(key.to_string()).or_default();
        if !values.is_empty() && !REPEATABLE.contains(&key) {
            return Err(RunnerError::invalid(key, "given more than once"));
        }
        values.push(value.into());
        Ok(())
    }

    /// Builder-style [`ActionParams::insert`] for optional values.
    ///
    /// # Errors
    ///
    /// See [`ActionParams::insert`].
    pub fn with_opt(mut self, key: &str, value: Option<impl Into<String>>) -> RunnerResult<Self> {
        if let Some(value) = value {
            self.insert(key, value)?;
        }
        Ok(self)
    }

    /// Builder-style insertion of every value under `key`.
    ///
    /// # Errors
    ///
    /// See [`ActionParams::insert`].
    pub fn with_all<V: Into<String>>(
        mut self,
        key: &str,
        values: impl IntoIterator<Item = V>,
    ) -> RunnerResult<Self> {
        for value in values {
            self.insert(key, value)?;
        }
        Ok(self)
    }

    /// Single value for `key`, when present and non-empty.
    #[must_use]
    pub fn optional(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Single value for `key` exactly as given, when not blank.
    #[must_use]
    pub fn verbatim(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Single value for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::MissingParam`] when absent or empty.
    pub fn required(&self, action: &'static str, key: &'static str) -> RunnerResult<&str> {
        self.optional(key)
            .ok_or(RunnerError::MissingParam { action, key })
    }

    /// Every value given for a repeatable key.
    #[must_use]
    pub fn all(&self, key: &str) -> &[String] {
        self.entries.get(key).map_or(&[], Vec::as_slice)
    }

    /// Boolean flag; absent means `default`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidParam`] for values other than
    /// `true/false/yes/no/1/0`.
    pub fn flag(&self, key: &str, default: bool) -> RunnerResult<bool> {
        let Some(raw) = self.optional(key) else {
            return Ok(default);
        };
        match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(RunnerError::invalid(key, format!("expected a boolean, got '{raw}'"))),
        }
    }

    /// Parsed value for `key`, when present.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidParam`] when the value does not parse.
    pub fn parsed<T>(&self, key: &str) -> RunnerResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|err| RunnerError::invalid(key, format!("'{raw}': {err}")))
            })
            .transpose()
    }

    /// Reject keys the action does not accept.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::UnexpectedParam`] naming the first unknown key.
    pub fn ensure_only(&self, action: &'static str, allowed: &[&str]) -> RunnerResult<()> {
        match self.entries.keys().find(|key| !allowed.contains(&key.as_str())) {
            Some(key) => Err(RunnerError::UnexpectedParam {
                action,
                key: key.clone(),
            }),
            None => Ok(()),
        }
    }
}
