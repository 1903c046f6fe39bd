//! Row filter expressions (`column=op.value`).

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::error::{BackendError, BackendResult};

/// Comparison operator understood by the REST layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Equal.
    Eq,
    /// Not equal.
    Neq,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Case-sensitive pattern (`*` wildcard).
    Like,
    /// Case-insensitive pattern (`*` wildcard).
    Ilike,
    /// `IS null|true|false`.
    Is,
    /// Membership in a comma-separated list.
    In,
}

impl FilterOp {
    /// Operator prefix as sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Like => "like",
            Self::Ilike => "ilike",
            Self::Is => "is",
            Self::In => "in",
        }
    }
}

impl FromStr for FilterOp {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "eq" => Self::Eq,
            "neq" => Self::Neq,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "like" => Self::Like,
            "ilike" => Self::Ilike,
            "is" => Self::Is,
            "in" => Self::In,
            _ => return Err(()),
        })
    }
}

/// One predicate on a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// Column name.
    pub column: String,
    /// Comparison operator.
    pub op: FilterOp,
    /// Operand, already normalised (`in` operands carry their parentheses).
    pub value: String,
}

impl Filter {
    /// Equality filter.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidIdentifier`] when `column` is not a plain identifier.
    pub fn eq(column: &str, value: impl Into<String>) -> BackendResult<Self> {
        validate_identifier("column", column)?;
        Ok(Self {
            column: column.to_string(),
            op: FilterOp::Eq,
            value: value.into(),
        })
    }

    /// Parse `column=op.value`, or `column=value` meaning equality.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidFilter`] for malformed expressions and
    /// [`BackendError::InvalidIdentifier`] for bad column names.
    pub fn parse(input: &str) -> BackendResult<Self> {
        let invalid = |reason| BackendError::InvalidFilter {
            input: input.to_string(),
            reason,
        };
        let (column, rest) = input
            .split_once('=')
            .ok_or_else(|| invalid("expected column=op.value"))?;
        let column = column.trim();
        validate_identifier("column", column)?;

        let (op, value) = rest
            .split_once('.')
            .and_then(|(prefix, value)| Some((prefix.parse::<FilterOp>().ok()?, value)))
            .unwrap_or((FilterOp::Eq, rest));

        let value = match op {
            FilterOp::Is => {
                let normalised = value.trim().to_ascii_lowercase();
                if !matches!(normalised.as_str(), "null" | "true" | "false") {
                    return Err(invalid("is expects null, true or false"));
                }
                normalised
            }
            FilterOp::In => {
                let inner = value
                    .trim()
                    .trim_start_matches('(')
                    .trim_end_matches(')')
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .collect::<Vec<_>>();
                if inner.is_empty() {
                    return Err(invalid("in expects at least one value"));
                }
                format!("({})", inner.join(","))
            }
            _ => value.to_string(),
        };

        Ok(Self {
            column: column.to_string(),
            op,
            value,
        })
    }

    /// Query-string value (`eq.acme`, `in.(a,b)`).
    #[must_use]
    pub fn query_value(&self) -> String {
        format!("{}.{}", self.op.as_str(), self.value)
    }
}

impl Display for Filter {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}={}", self.column, self.query_value())
    }
}

impl FromStr for Filter {
    type Err = BackendError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

/// Reject anything but `[A-Za-z_][A-Za-z0-9_]*`.
///
/// # Errors
///
/// Returns [`BackendError::InvalidIdentifier`] tagged with `kind`.
pub fn validate_identifier(kind: &'static str, value: &str) -> BackendResult<()> {
    let mut chars = value.chars();
    let head_ok = chars
        .next()
        .is_some_and(|ch| ch.is_ascii_alphabetic() || ch == '_');
    if head_ok && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        Ok(())
    } else {
        Err(BackendError::InvalidIdentifier {
            kind,
            value: value.to_string(),
        })
    }
}
