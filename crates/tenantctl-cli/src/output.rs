//! Output renderers and formatting helpers for CLI commands.

use anyhow::anyhow;
use serde::Serialize;
use serde_json::Value;
use tenantctl_backend::StoredObject;
use tenantctl_runner::{ActionName, ActionReport, FailureReport, TenantScope, Verification};

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

const MAX_CELL_WIDTH: usize = 40;

pub(crate) fn render_report(report: &ActionReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            print_json(report)?;
            if let Some(failure) = &report.failure {
                print_failure(report.action.as_str(), failure);
            }
        }
        OutputFormat::Table => {
            if let Some(failure) = &report.failure {
                print_failure(report.action.as_str(), failure);
                return Ok(());
            }
            render_data(report.action, &report.data);
            println!("{}: {} affected", report.action, report.affected);
            if let Some(verification) = &report.verification {
                print_verification(verification);
            }
        }
    }
    Ok(())
}

pub(crate) fn render_settings(
    entries: &[(&'static str, String)],
    scope: &TenantScope,
    format: OutputFormat,
) -> CliResult<()> {
    let tenant = match (&scope.tenant, scope.unscoped) {
        (_, true) => "<unscoped>".to_string(),
        (Some(tenant), false) => tenant.clone(),
        (None, false) => "<unset>".to_string(),
    };
    match format {
        OutputFormat::Json => {
            let mut object = entries
                .iter()
                .map(|(key, value)| ((*key).to_string(), Value::String(value.clone())))
                .collect::<serde_json::Map<_, _>>();
            object.insert("tenant".to_string(), Value::String(tenant));
            print_json(&object)?;
        }
        OutputFormat::Table => {
            for (key, value) in entries {
                println!("{key}: {value}");
            }
            println!("tenant: {tenant}");
        }
    }
    Ok(())
}

fn print_json(value: &impl Serialize) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

fn render_data(action: ActionName, data: &Value) {
    if action == ActionName::RecordsCount {
        println!("count: {}", data.get("count").unwrap_or(&Value::Null));
        return;
    }
    if let Some(columns) = table_columns(action) {
        let rows = match action {
            ActionName::AccountsList => data.get("accounts").and_then(Value::as_array),
            _ => data.as_array(),
        }
        .map_or(&[][..], Vec::as_slice);
        if action == ActionName::StorageList {
            let rows = rows.iter().map(object_row).collect::<Vec<_>>();
            print_table(columns, &rows);
        } else {
            print_table(columns, rows);
        }
        if let Some(total) = data.get("total").and_then(Value::as_u64) {
            println!("total accounts: {total}");
        }
        return;
    }
    match data {
        Value::Array(rows) => {
            let columns = collect_columns(rows);
            let columns = columns.iter().map(String::as_str).collect::<Vec<_>>();
            print_table(&columns, rows);
        }
        Value::Object(fields) => {
            for (key, value) in fields {
                println!("{key}: {}", cell(value));
            }
        }
        Value::Null => {}
        other => println!("{}", cell(other)),
    }
}

/// Fixed table layout for actions whose payload shape is known.
const fn table_columns(action: ActionName) -> Option<&'static [&'static str]> {
    match action {
        ActionName::AccountsList => Some(&[
            "id",
            "email",
            "created_at",
            "last_sign_in_at",
            "banned_until",
        ]),
        ActionName::StorageBuckets => Some(&["id", "name", "public", "created_at"]),
        ActionName::StorageList => Some(&["name", "size", "updated_at"]),
        ActionName::StorageRemove => Some(&["name"]),
        _ => None,
    }
}

fn object_row(object: &Value) -> Value {
    let size = serde_json::from_value::<StoredObject>(object.clone())
        .ok()
        .filter(|stored| !stored.is_folder())
        .and_then(|stored| stored.size())
        .map_or_else(|| "-".to_string(), format_bytes);
    serde_json::json!({
        "name": object.get("name").cloned().unwrap_or(Value::Null),
        "size": size,
        "updated_at": object.get("updated_at").cloned().unwrap_or(Value::Null),
    })
}

fn collect_columns(rows: &[Value]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        if let Some(fields) = row.as_object() {
            for key in fields.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
    }
    columns
}

fn print_table(columns: &[&str], rows: &[Value]) {
    if rows.is_empty() {
        println!("(no rows)");
        return;
    }
    let cells = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| row.get(*column).map_or_else(String::new, cell))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    let widths = columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            cells
                .iter()
                .map(|row| row[index].chars().count())
                .chain(std::iter::once(column.len()))
                .max()
                .unwrap_or(0)
        })
        .collect::<Vec<_>>();

    let header = columns
        .iter()
        .zip(widths.iter().copied())
        .map(|(column, width)| format!("{:<width$}", column.to_uppercase()))
        .collect::<Vec<_>>();
    println!("{}", header.join("  ").trim_end());
    for row in cells {
        let line = row
            .iter()
            .zip(widths.iter().copied())
            .map(|(value, width)| format!("{value:<width$}"))
            .collect::<Vec<_>>();
        println!("{}", line.join("  ").trim_end());
    }
}

/// Render one JSON value as a table cell.
#[must_use]
pub(crate) fn cell(value: &Value) -> String {
    let text = match value {
        Value::Null => "-".to_string(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    truncate(&text, MAX_CELL_WIDTH)
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut shortened = text.chars().take(max.saturating_sub(1)).collect::<String>();
    shortened.push('…');
    shortened
}

/// Print the remote error verbatim, plus a suggested next step when known.
pub(crate) fn print_failure(action: &str, failure: &FailureReport) {
    eprintln!("{action} failed: {}", failure.message);
    if let Some(status) = failure.status {
        eprintln!("  status: {status}");
    }
    if let Some(code) = &failure.code {
        eprintln!("  code: {code}");
    }
    if let Some(details) = &failure.details {
        eprintln!("  details: {details}");
    }
    if let Some(hint) = &failure.hint {
        eprintln!("  hint: {hint}");
    }
    eprintln!("  class: {}", failure.class.as_str());
    if let Some(remedy) = failure.remedy {
        eprintln!("  suggestion: {remedy}");
    }
}

fn print_verification(verification: &Verification) {
    if verification.passed {
        println!("verified: {}", verification.check);
    } else {
        eprintln!("verification failed: {}", verification.check);
        eprintln!("  observed: {}", verification.observed);
    }
}

#[must_use]
pub(crate) fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;
    let value = bytes_to_f64(bytes);
    if value >= GIB {
        format!("{:.2} GiB", value / GIB)
    } else if value >= MIB {
        format!("{:.2} MiB", value / MIB)
    } else if value >= KIB {
        format!("{:.2} KiB", value / KIB)
    } else {
        format!("{bytes} B")
    }
}

fn bytes_to_f64(value: u64) -> f64 {
    let high = u32::try_from(value >> 32).unwrap_or(u32::MAX);
    let low = u32::try_from(value & 0xFFFF_FFFF).unwrap_or(u32::MAX);
    f64::from(high) * 4_294_967_296.0 + f64::from(low)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cells_render_scalars_and_truncate() {
        assert_eq!(cell(&Value::Null), "-");
        assert_eq!(cell(&json!("acme")), "acme");
        assert_eq!(cell(&json!(true)), "true");
        let long = "x".repeat(60);
        let rendered = cell(&json!(long));
        assert_eq!(rendered.chars().count(), MAX_CELL_WIDTH);
        assert!(rendered.ends_with('…'));
    }

    #[test]
    fn columns_follow_first_appearance() {
        let rows = vec![json!({"id": 1, "name": "a"}), json!({"id": 2, "seats": 3})];
        assert_eq!(collect_columns(&rows), ["id", "name", "seats"]);
    }

    #[test]
    fn object_rows_format_size() {
        let row = object_row(&json!({"name": "logo.png", "id": "obj-1", "metadata": {"size": 2048}}));
        assert_eq!(row["size"], json!("2.00 KiB"));
        let folder = object_row(&json!({"name": "acme", "id": null, "metadata": {"size": 0}}));
        assert_eq!(folder["size"], json!("-"));
    }

    #[test]
    fn table_layout_follows_action_name() {
        assert_eq!(
            table_columns(ActionName::StorageList),
            Some(&["name", "size", "updated_at"][..])
        );
        assert_eq!(table_columns(ActionName::StorageRemove), Some(&["name"][..]));
        assert!(table_columns(ActionName::RecordsSelect).is_none());
        assert!(table_columns(ActionName::RecordsCount).is_none());
    }

    #[test]
    fn format_bytes_picks_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MiB");
    }
}
