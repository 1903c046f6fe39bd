//! Credential newtype that never prints its value.

use std::fmt::{self, Debug, Display, Formatter};

const HINT_MIN_LEN: usize = 16;
const HINT_LEN: usize = 4;

/// Privileged or anonymous API key.
///
/// `Debug` and `Display` only ever render a redacted form; call
/// [`Secret::expose`] at the single point where the raw value is sent.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a raw credential.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw credential value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Redacted rendering: a short prefix for long keys, `***` otherwise.
    #[must_use]
    pub fn redacted(&self) -> String {
        if self.0.len() >= HINT_MIN_LEN && self.0.is_char_boundary(HINT_LEN) {
            format!("{}***", &self.0[..HINT_LEN])
        } else {
            "***".to_string()
        }
    }
}

impl Debug for Secret {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "Secret({})", self.redacted())
    }
}

impl Display for Secret {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.redacted())
    }
}
