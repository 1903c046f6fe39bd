//! Column assignments and value coercion.

use chrono::DateTime;
use serde_json::Value;

use crate::error::{RunnerError, RunnerResult};

/// Interpret a textual value the way an operator would mean it.
///
/// `null`, `true` and `false`, numbers, and JSON objects/arrays become their
/// JSON counterparts; a leading `'` forces the rest to be text; everything
/// else is a string.
#[must_use]
pub fn coerce_value(raw: &str) -> Value {
    if let Some(text) = raw.strip_prefix('\'') {
        return Value::String(text.to_string());
    }
    let trimmed = raw.trim();
    match trimmed {
        "null" => return Value::Null,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    let looks_structured = trimmed.starts_with('{') || trimmed.starts_with('[');
    let looks_numeric = trimmed
        .chars()
        .next()
        .is_some_and(|ch| ch.is_ascii_digit() || ch == '-')
        && !has_leading_zero(trimmed);
    if looks_structured || looks_numeric {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return value;
        }
    }
    Value::String(raw.to_string())
}

// Values such as zip codes or phone numbers keep their leading zero as text.
fn has_leading_zero(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.")
}

/// Parse `column=value` (coerced) or `column:=json` (strict JSON).
///
/// # Errors
///
/// Returns [`RunnerError::InvalidParam`] for missing `=`, an empty column or
/// invalid strict JSON.
pub fn parse_assignment(input: &str) -> RunnerResult<(String, Value)> {
    let (column, raw) = input
        .split_once('=')
        .ok_or_else(|| RunnerError::invalid("set", format!("'{input}' is not column=value")))?;
    let (column, value) = match column.strip_suffix(':') {
        Some(column) => {
            let value = serde_json::from_str::<Value>(raw).map_err(|err| {
                RunnerError::invalid("set", format!("'{input}' is not valid JSON: {err}"))
            })?;
            (column, value)
        }
        None => (column, coerce_value(raw)),
    };
    let column = column.trim();
    if column.is_empty() {
        return Err(RunnerError::invalid("set", format!("'{input}' has no column")));
    }
    Ok((column.to_string(), value))
}

/// Compare a requested value with what the backend reports.
///
/// Absent and `null` are equivalent, and a scalar matches its textual form so
/// that `42` written to a text column still verifies. Two RFC 3339 timestamps
/// match when they name the same instant (`Z` vs `+00:00`).
#[must_use]
pub fn values_match(expected: &Value, actual: Option<&Value>) -> bool {
    let actual = actual.unwrap_or(&Value::Null);
    if expected == actual {
        return true;
    }
    match (expected, actual) {
        (Value::String(text), other) | (other, Value::String(text))
            if matches!(other, Value::Number(_) | Value::Bool(_)) =>
        {
            *text == other.to_string()
        }
        (Value::String(left), Value::String(right)) => same_instant(left, right),
        (Value::Number(left), Value::Number(right)) => left
            .as_f64()
            .zip(right.as_f64())
            .is_some_and(|(left, right)| (left - right).abs() < f64::EPSILON),
        _ => false,
    }
}

fn same_instant(left: &str, right: &str) -> bool {
    match (
        DateTime::parse_from_rfc3339(left.trim()),
        DateTime::parse_from_rfc3339(right.trim()),
    ) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerce_recognises_scalars_and_json() {
        assert_eq!(coerce_value("true"), json!(true));
        assert_eq!(coerce_value("null"), Value::Null);
        assert_eq!(coerce_value("42"), json!(42));
        assert_eq!(coerce_value("-3.5"), json!(-3.5));
        assert_eq!(coerce_value(r#"{"theme":"dark"}"#), json!({"theme": "dark"}));
        assert_eq!(coerce_value("[1,2]"), json!([1, 2]));
        assert_eq!(coerce_value("Acme Corp"), json!("Acme Corp"));
        assert_eq!(coerce_value("2024-01-01"), json!("2024-01-01"));
    }

    #[test]
    fn coerce_keeps_leading_zeros_and_forced_text() {
        assert_eq!(coerce_value("007"), json!("007"));
        assert_eq!(coerce_value("0.5"), json!(0.5));
        assert_eq!(coerce_value("0"), json!(0));
        assert_eq!(coerce_value("'true"), json!("true"));
        assert_eq!(coerce_value("{broken"), json!("{broken"));
    }

    #[test]
    fn assignments_support_strict_json() -> RunnerResult<()> {
        assert_eq!(
            parse_assignment("active=true")?,
            ("active".to_string(), json!(true))
        );
        assert_eq!(
            parse_assignment("settings:={\"a\":1}")?,
            ("settings".to_string(), json!({"a": 1}))
        );
        assert!(parse_assignment("settings:={oops").is_err());
        assert!(parse_assignment("=1").is_err());
        assert!(parse_assignment("novalue").is_err());
        Ok(())
    }

    #[test]
    fn values_match_treats_absent_as_null_and_text_as_scalar() {
        assert!(values_match(&Value::Null, None));
        assert!(values_match(&json!(true), Some(&json!(true))));
        assert!(values_match(&json!(42), Some(&json!("42"))));
        assert!(values_match(&json!("true"), Some(&json!(true))));
        assert!(values_match(&json!(1), Some(&json!(1.0))));
        assert!(!values_match(&json!(true), Some(&json!(false))));
        assert!(!values_match(&json!(true), None));
    }

    #[test]
    fn values_match_compares_timestamps_as_instants() {
        assert!(values_match(
            &json!("2026-01-05T10:00:00Z"),
            Some(&json!("2026-01-05T10:00:00+00:00"))
        ));
        assert!(values_match(
            &json!("2026-01-05T12:00:00+02:00"),
            Some(&json!("2026-01-05T10:00:00.000000+00:00"))
        ));
        assert!(!values_match(
            &json!("2026-01-05T10:00:00Z"),
            Some(&json!("2026-01-05T10:00:01+00:00"))
        ));
        assert!(!values_match(&json!("acme"), Some(&json!("globex"))));
    }
}
