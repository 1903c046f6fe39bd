//! Environment-style key/value sources.
//!
//! # Design
//! - An env file is parsed into an [`EnvMap`] without touching the process
//!   environment.
//! - Sources are layered explicitly; the process environment wins over a file.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};

/// Ordered set of environment-style key/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvMap {
    entries: BTreeMap<String, String>,
}

impl EnvMap {
    /// Empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current process environment. Non-UTF-8 entries are skipped.
    #[must_use]
    pub fn from_process() -> Self {
        std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect()
    }

    /// Merge `overlay` on top of `base`; keys in `overlay` win.
    #[must_use]
    pub fn layered(base: Self, overlay: Self) -> Self {
        let mut entries = base.entries;
        entries.extend(overlay.entries);
        Self { entries }
    }

    /// Insert or replace a key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Value for `key`, ignoring entries that are empty after trimming.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .map(String::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// First non-empty value among `keys`, with the key that supplied it.
    #[must_use]
    pub fn first_of<'k>(&self, keys: &[&'k str]) -> Option<(&'k str, &str)> {
        keys.iter()
            .find_map(|key| self.get(key).map(|value| (*key, value)))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// Read and parse an env file.
///
/// # Errors
///
/// Returns [`ConfigError::EnvFileRead`] when the file cannot be read and
/// [`ConfigError::EnvFileSyntax`] for malformed lines.
pub fn load_env_file(path: &Path) -> ConfigResult<EnvMap> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::EnvFileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let map = parse_env_file(path, &text)?;
    tracing::debug!(path = %path.display(), entries = map.len(), "loaded env file");
    Ok(map)
}

/// Parse `KEY=VALUE` lines.
///
/// Blank lines and `#` comments are skipped, an `export ` prefix is accepted,
/// matching single or double quotes around the value are stripped and an
/// unquoted value ends at ` #`.
///
/// # Errors
///
/// Returns [`ConfigError::EnvFileSyntax`] naming the first malformed line.
pub fn parse_env_file(path: &Path, text: &str) -> ConfigResult<EnvMap> {
    let mut map = EnvMap::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let syntax = |reason| ConfigError::EnvFileSyntax {
            path: path.to_path_buf(),
            line: index + 1,
            reason,
        };
        let line = line.strip_prefix("export ").unwrap_or(line);
        let (key, value) = line.split_once('=').ok_or_else(|| syntax("expected KEY=VALUE"))?;
        let key = key.trim();
        if key.is_empty() || key.chars().any(char::is_whitespace) {
            return Err(syntax("key must be a single word"));
        }
        let value = parse_value(value.trim()).ok_or_else(|| syntax("unterminated quote"))?;
        map.insert(key, value);
    }
    Ok(map)
}

fn parse_value(value: &str) -> Option<String> {
    for quote in ['"', '\''] {
        if let Some(rest) = value.strip_prefix(quote) {
            let end = rest.find(quote)?;
            return Some(rest[..end].to_string());
        }
    }
    let unquoted = value
        .find(" #")
        .map_or(value, |position| &value[..position]);
    Some(unquoted.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_comments_quotes_and_exports() -> ConfigResult<()> {
        let text = "\
# service settings
export TENANTCTL_API_URL=https://demo.example.co
TENANTCTL_SERVICE_KEY=\"quoted value\"
TENANTCTL_ANON_KEY='single'
TENANTCTL_TENANT_COLUMN=company_id # trailing comment

EMPTY=
";
        let map = parse_env_file(Path::new(".env"), text)?;
        assert_eq!(map.get("TENANTCTL_API_URL"), Some("https://demo.example.co"));
        assert_eq!(map.get("TENANTCTL_SERVICE_KEY"), Some("quoted value"));
        assert_eq!(map.get("TENANTCTL_ANON_KEY"), Some("single"));
        assert_eq!(map.get("TENANTCTL_TENANT_COLUMN"), Some("company_id"));
        assert_eq!(map.get("EMPTY"), None);
        assert_eq!(map.len(), 5);
        Ok(())
    }

    #[test]
    fn reports_line_number_for_malformed_entries() {
        let err = parse_env_file(Path::new(".env"), "A=1\n\nnot a pair\n")
            .expect_err("missing '=' should fail");
        assert!(matches!(err, ConfigError::EnvFileSyntax { line: 3, .. }));

        let err = parse_env_file(Path::new(".env"), "A=\"open\n")
            .expect_err("unterminated quote should fail");
        assert!(
            matches!(err, ConfigError::EnvFileSyntax { reason, .. } if reason.contains("quote"))
        );
    }

    #[test]
    fn layered_prefers_overlay_values() {
        let file: EnvMap = [("A", "file"), ("B", "file")].into_iter().collect();
        let process: EnvMap = [("B", "process")].into_iter().collect();
        let merged = EnvMap::layered(file, process);
        assert_eq!(merged.get("A"), Some("file"));
        assert_eq!(merged.get("B"), Some("process"));
    }

    #[test]
    fn first_of_skips_blank_values() {
        let map: EnvMap = [("PRIMARY", "  "), ("FALLBACK", "value")].into_iter().collect();
        assert_eq!(
            map.first_of(&["PRIMARY", "FALLBACK"]),
            Some(("FALLBACK", "value"))
        );
    }

    #[test]
    fn load_env_file_reads_from_disk() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "TENANTCTL_API_URL=http://127.0.0.1:54321")?;
        let map = load_env_file(file.path())?;
        assert_eq!(map.get("TENANTCTL_API_URL"), Some("http://127.0.0.1:54321"));

        let missing = load_env_file(Path::new("/nonexistent/tenantctl.env"));
        assert!(matches!(missing, Err(ConfigError::EnvFileRead { .. })));
        Ok(())
    }
}
