//! Operator hints for well-known remote error codes.

use crate::error::RemoteError;

/// Suggest a next step for the operator, when the error is a known one.
#[must_use]
pub fn suggest_remedy(error: &RemoteError) -> Option<&'static str> {
    let by_code = match error.code.as_deref() {
        Some("42501") => Some(
            "row-level security rejected the request; make sure the privileged service key is configured, not the anonymous key",
        ),
        Some("42P01" | "PGRST205") => {
            Some("the table does not exist in the exposed schema; check the table name")
        }
        Some("42703" | "PGRST204") => Some(
            "a referenced column does not exist; check the column name or reload the schema cache after a migration",
        ),
        Some("23505") => Some(
            "a row with the same unique key already exists; update that row instead of inserting",
        ),
        Some("23503") => {
            Some("a referenced row is missing; create the parent record first or fix the foreign key value")
        }
        Some("23502") => Some("a required column was left empty; supply it with --set column=value"),
        Some("PGRST116") => Some("the filter matched no rows or more than one row; narrow the filter"),
        Some("PGRST301" | "PGRST302") => {
            Some("the key was rejected; check that it belongs to this project and has not expired")
        }
        Some("user_not_found") => Some("no account has that id; look it up with `accounts find --email`"),
        Some("email_exists" | "user_already_exists") => {
            Some("an account with this email already exists; update it instead of creating a new one")
        }
        _ => None,
    };
    by_code.or_else(|| {
        if error.status == 401 {
            Some("the service rejected the key; check TENANTCTL_SERVICE_KEY")
        } else if error
            .message
            .to_ascii_lowercase()
            .contains("bucket not found")
        {
            Some("the bucket does not exist; list buckets with `storage buckets`")
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(status: u16, code: Option<&str>, message: &str) -> RemoteError {
        RemoteError {
            status,
            code: code.map(str::to_string),
            message: message.to_string(),
            details: None,
            hint: None,
        }
    }

    #[test]
    fn known_codes_have_remedies() {
        for code in ["42501", "42P01", "42703", "23505", "23503", "23502", "PGRST116"] {
            assert!(
                suggest_remedy(&remote(400, Some(code), "boom")).is_some(),
                "missing remedy for {code}"
            );
        }
        let rls = suggest_remedy(&remote(403, Some("42501"), "denied")).unwrap_or_default();
        assert!(rls.contains("service key"));
    }

    #[test]
    fn falls_back_to_status_and_message() {
        assert!(suggest_remedy(&remote(401, None, "Invalid API key")).is_some());
        assert!(suggest_remedy(&remote(400, None, "Bucket not found")).is_some());
        assert!(suggest_remedy(&remote(404, None, "Object not found")).is_none());
        assert!(suggest_remedy(&remote(500, Some("XX000"), "internal")).is_none());
    }
}
