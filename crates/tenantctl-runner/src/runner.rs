//! Action execution and post-write verification.
//!
//! # Design
//! - Each action performs exactly one remote operation; a failure is captured
//!   in the report verbatim and nothing is retried.
//! - Mutations are followed by an independent read that checks the remote
//!   state actually changed. A write the service acknowledged but did not
//!   apply (row-level security filtering the target away, a trigger reverting
//!   it) surfaces as a failed verification instead of a silent success.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value, json};
use tenantctl_backend::storage::split_object_path;
use tenantctl_backend::{
    Account, AccountPatch, BackendError, BlobStore, ErrorClass, Filter, FilterOp, IdentityAdmin,
    RecordQuery, RecordStore, Row,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::action::Action;
use crate::report::{ActionReport, FailureReport, Verification};
use crate::values::values_match;

const FIND_PAGE_SIZE: u32 = 200;
const FIND_MAX_PAGES: u32 = 50;
const VERIFY_LIST_LIMIT: u32 = 1000;

/// Everything an action may need from the remote service.
pub trait Backend: RecordStore + IdentityAdmin + BlobStore {}

impl<T> Backend for T where T: RecordStore + IdentityAdmin + BlobStore + ?Sized {}

/// Runner behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Follow mutations with a verification read.
    pub verify: bool,
    /// Pause before the verification read, for replicated backends.
    pub verify_delay: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            verify: true,
            verify_delay: Duration::ZERO,
        }
    }
}

/// Executes actions against a backend.
pub struct ActionRunner<B> {
    backend: B,
    options: RunnerOptions,
}

/// What a successful operation produced, plus how to check it.
struct Performed {
    affected: u64,
    data: Value,
    check: Option<Check>,
}

impl Performed {
    fn new(affected: usize, data: impl Serialize) -> Self {
        Self {
            affected: affected as u64,
            data: to_data(&data),
            check: None,
        }
    }

    fn checked(mut self, check: Check) -> Self {
        self.check = Some(check);
        self
    }
}

enum Check {
    Updated {
        table: String,
        filters: Vec<Filter>,
        changes: Row,
        returned: Vec<Row>,
    },
    Deleted {
        table: String,
        filters: Vec<Filter>,
    },
    Inserted {
        table: String,
        requested: Row,
        returned: Vec<Row>,
    },
    AccountMatches {
        id: Uuid,
        email: Option<String>,
        patch: Option<AccountPatch>,
    },
    AccountGone {
        id: Uuid,
    },
    ObjectsPresent {
        bucket: String,
        paths: Vec<String>,
    },
    ObjectsGone {
        bucket: String,
        paths: Vec<String>,
    },
}

impl<B: Backend> ActionRunner<B> {
    /// Runner over `backend`.
    pub const fn new(backend: B, options: RunnerOptions) -> Self {
        Self { backend, options }
    }

    /// Underlying backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Perform `action` once and report what happened.
    pub async fn execute(&self, action: Action) -> ActionReport {
        let name = action.name();
        info!(
            action = name.as_str(),
            mutation = name.is_mutation(),
            "executing action"
        );
        let performed = match self.perform(action).await {
            Ok(performed) => performed,
            Err(failure) => {
                warn!(
                    action = name.as_str(),
                    class = failure.class.as_str(),
                    code = failure.code.as_deref().unwrap_or("-"),
                    message = %failure.message,
                    "action failed"
                );
                return ActionReport::failed(name, failure);
            }
        };

        let report = ActionReport::completed(name, performed.affected, performed.data);
        let Some(check) = performed.check.filter(|_| self.options.verify) else {
            return report;
        };
        if !self.options.verify_delay.is_zero() {
            tokio::time::sleep(self.options.verify_delay).await;
        }
        let verification = self.verify(check).await;
        if verification.passed {
            debug!(action = name.as_str(), check = %verification.check, "verification passed");
        } else {
            warn!(
                action = name.as_str(),
                check = %verification.check,
                observed = %verification.observed,
                "verification failed"
            );
        }
        report.with_verification(verification)
    }

    async fn perform(&self, action: Action) -> Result<Performed, FailureReport> {
        let failed = |error: BackendError| FailureReport::from_backend(&error);
        match action {
            Action::SelectRecords { query } => {
                let rows = self.backend.select(&query).await.map_err(failed)?;
                Ok(Performed::new(rows.len(), &rows))
            }
            Action::CountRecords { table, filters } => {
                let count = self.backend.count(&table, &filters).await.map_err(failed)?;
                Ok(Performed {
                    affected: count,
                    data: json!({ "count": count }),
                    check: None,
                })
            }
            Action::InsertRecord { table, row } => {
                let rows = self
                    .backend
                    .insert(&table, std::slice::from_ref(&row))
                    .await
                    .map_err(failed)?;
                Ok(Performed::new(rows.len(), &rows).checked(Check::Inserted {
                    table,
                    requested: row,
                    returned: rows,
                }))
            }
            Action::UpdateRecords {
                table,
                filters,
                changes,
            } => {
                let rows = self
                    .backend
                    .update(&table, &filters, &changes)
                    .await
                    .map_err(failed)?;
                Ok(Performed::new(rows.len(), &rows).checked(Check::Updated {
                    table,
                    filters,
                    changes,
                    returned: rows,
                }))
            }
            Action::DeleteRecords { table, filters } => {
                let rows = self.backend.delete(&table, &filters).await.map_err(failed)?;
                Ok(Performed::new(rows.len(), &rows).checked(Check::Deleted { table, filters }))
            }
            Action::ListAccounts { page, per_page } => {
                let listing = self
                    .backend
                    .list_accounts(page, per_page)
                    .await
                    .map_err(failed)?;
                Ok(Performed::new(listing.accounts.len(), &listing))
            }
            Action::FindAccount { email } => {
                let account = self.find_account(&email).await.map_err(failed)?;
                account.map_or_else(
                    || {
                        Err(FailureReport::local(
                            ErrorClass::NotFound,
                            format!("no account with email '{email}'"),
                        ))
                    },
                    |account| Ok(Performed::new(1, &account)),
                )
            }
            Action::CreateAccount { account } => {
                let created = self
                    .backend
                    .create_account(&account)
                    .await
                    .map_err(failed)?;
                let check = Check::AccountMatches {
                    id: created.id,
                    email: Some(account.email),
                    patch: None,
                };
                Ok(Performed::new(1, &created).checked(check))
            }
            Action::UpdateAccount { id, patch } => {
                let updated = self
                    .backend
                    .update_account(id, &patch)
                    .await
                    .map_err(failed)?;
                let check = Check::AccountMatches {
                    id,
                    email: patch.email.clone(),
                    patch: Some(patch),
                };
                Ok(Performed::new(1, &updated).checked(check))
            }
            Action::DeleteAccount { id } => {
                self.backend.delete_account(id).await.map_err(failed)?;
                Ok(Performed::new(1, json!({ "id": id })).checked(Check::AccountGone { id }))
            }
            Action::ListBuckets => {
                let buckets = self.backend.list_buckets().await.map_err(failed)?;
                Ok(Performed::new(buckets.len(), &buckets))
            }
            Action::ListObjects {
                bucket,
                prefix,
                limit,
            } => {
                let objects = self
                    .backend
                    .list_objects(&bucket, &prefix, limit, 0)
                    .await
                    .map_err(failed)?;
                Ok(Performed::new(objects.len(), &objects))
            }
            Action::UploadObject { request } => {
                let receipt = self.backend.upload(&request).await.map_err(failed)?;
                let check = Check::ObjectsPresent {
                    bucket: request.bucket,
                    paths: vec![request.path],
                };
                Ok(Performed::new(1, &receipt).checked(check))
            }
            Action::RemoveObjects { bucket, paths } => {
                let removed = self
                    .backend
                    .remove(&bucket, &paths)
                    .await
                    .map_err(failed)?;
                Ok(Performed::new(removed.len(), &removed)
                    .checked(Check::ObjectsGone { bucket, paths }))
            }
        }
    }

    async fn find_account(&self, email: &str) -> Result<Option<Account>, BackendError> {
        for page in 1..=FIND_MAX_PAGES {
            let listing = self.backend.list_accounts(page, FIND_PAGE_SIZE).await?;
            if let Some(account) = listing.accounts.iter().find(|account| {
                account
                    .email
                    .as_deref()
                    .is_some_and(|candidate| candidate.eq_ignore_ascii_case(email))
            }) {
                return Ok(Some(account.clone()));
            }
            if !listing.has_more() {
                break;
            }
        }
        Ok(None)
    }

    async fn verify(&self, check: Check) -> Verification {
        match check {
            Check::Updated {
                table,
                filters,
                changes,
                returned,
            } => self.verify_update(&table, &filters, &changes, &returned).await,
            Check::Deleted { table, filters } => {
                let label = "no rows match the delete filters";
                match self.backend.count(&table, &filters).await {
                    Ok(0) => Verification::passed(label, json!({ "remaining": 0 })),
                    Ok(remaining) => Verification::failed(label, json!({ "remaining": remaining })),
                    Err(error) => read_failed(label, &error),
                }
            }
            Check::Inserted {
                table,
                requested,
                returned,
            } => self.verify_insert(&table, &requested, &returned).await,
            Check::AccountMatches { id, email, patch } => {
                let label = "account reflects the requested state";
                match self.backend.get_account(id).await {
                    Ok(account) => {
                        let mismatches = account_mismatches(&account, email.as_deref(), patch.as_ref());
                        let observed = json!({
                            "id": account.id,
                            "email": account.email,
                            "email_confirmed_at": account.email_confirmed_at,
                            "banned_until": account.banned_until,
                            "mismatches": mismatches,
                        });
                        if mismatches.is_empty() {
                            Verification::passed(label, observed)
                        } else {
                            Verification::failed(label, observed)
                        }
                    }
                    Err(error) => read_failed(label, &error),
                }
            }
            Check::AccountGone { id } => {
                let label = "account no longer exists";
                match self.backend.get_account(id).await {
                    Ok(account) => Verification::failed(label, json!({ "found": account.id })),
                    Err(error) if error.class() == ErrorClass::NotFound => {
                        Verification::passed(label, json!({ "found": null }))
                    }
                    Err(error) => read_failed(label, &error),
                }
            }
            Check::ObjectsPresent { bucket, paths } => {
                self.verify_objects(&bucket, &paths, true).await
            }
            Check::ObjectsGone { bucket, paths } => {
                self.verify_objects(&bucket, &paths, false).await
            }
        }
    }

    async fn verify_update(
        &self,
        table: &str,
        filters: &[Filter],
        changes: &Row,
        returned: &[Row],
    ) -> Verification {
        let label = "updated rows carry the requested values";
        if returned.is_empty() {
            return Verification::failed(
                label,
                json!({ "matched": 0, "reason": "no rows were updated; the filter or access policy excluded every row" }),
            );
        }

        // Re-read by primary key when the rows carry one; otherwise reuse the
        // filters, minus those on columns the update just changed.
        let reread = id_filter(returned).map_or_else(
            || {
                filters
                    .iter()
                    .filter(|filter| !changes.contains_key(&filter.column))
                    .cloned()
                    .collect::<Vec<_>>()
            },
            |filter| vec![filter],
        );
        let rows = match self
            .backend
            .select(&RecordQuery::new(table, reread))
            .await
        {
            Ok(rows) => rows,
            Err(error) => return read_failed(label, &error),
        };

        let mismatches = rows
            .iter()
            .flat_map(|row| row_mismatches(row, changes))
            .collect::<Vec<_>>();
        let observed = json!({ "rows": rows.len(), "mismatches": mismatches });
        if !rows.is_empty() && mismatches.is_empty() {
            Verification::passed(label, observed)
        } else {
            Verification::failed(label, observed)
        }
    }

    async fn verify_insert(&self, table: &str, requested: &Row, returned: &[Row]) -> Verification {
        let label = "inserted row is readable";
        let Some(filter) = id_filter(returned) else {
            // Without a key, trust the representation the service returned.
            let mismatches = returned
                .iter()
                .flat_map(|row| row_mismatches(row, requested))
                .collect::<Vec<_>>();
            let observed = json!({ "rows": returned.len(), "mismatches": mismatches });
            return if !returned.is_empty() && mismatches.is_empty() {
                Verification::passed(label, observed)
            } else {
                Verification::failed(label, observed)
            };
        };
        match self
            .backend
            .select(&RecordQuery::new(table, vec![filter]))
            .await
        {
            Ok(rows) => {
                let mismatches = rows
                    .iter()
                    .flat_map(|row| row_mismatches(row, requested))
                    .collect::<Vec<_>>();
                let observed = json!({ "rows": rows.len(), "mismatches": mismatches });
                if rows.len() == returned.len() && mismatches.is_empty() {
                    Verification::passed(label, observed)
                } else {
                    Verification::failed(label, observed)
                }
            }
            Err(error) => read_failed(label, &error),
        }
    }

    async fn verify_objects(&self, bucket: &str, paths: &[String], present: bool) -> Verification {
        let label = if present {
            "uploaded object is listed"
        } else {
            "removed objects are no longer listed"
        };
        let folders = paths
            .iter()
            .map(|path| split_object_path(path).0)
            .collect::<BTreeSet<_>>();
        let mut listed = BTreeSet::new();
        for folder in folders {
            let mut offset = 0;
            loop {
                let page = match self
                    .backend
                    .list_objects(bucket, folder, VERIFY_LIST_LIMIT, offset)
                    .await
                {
                    Ok(page) => page,
                    Err(error) => return read_failed(label, &error),
                };
                let full = page.len() >= VERIFY_LIST_LIMIT as usize;
                listed.extend(page.into_iter().map(|object| {
                    if folder.is_empty() {
                        object.name
                    } else {
                        format!("{folder}/{}", object.name)
                    }
                }));
                if !full {
                    break;
                }
                offset += VERIFY_LIST_LIMIT;
            }
        }
        let wrong = paths
            .iter()
            .filter(|path| listed.contains(*path) != present)
            .cloned()
            .collect::<Vec<_>>();
        let key = if present { "missing" } else { "still_present" };
        let observed = json!({ key: wrong });
        if wrong.is_empty() {
            Verification::passed(label, observed)
        } else {
            Verification::failed(label, observed)
        }
    }
}

fn to_data(value: &impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn read_failed(check: &str, error: &BackendError) -> Verification {
    Verification::failed(
        check,
        json!({ "error": error.to_string(), "class": error.class() }),
    )
}

/// `id=in.(...)` over the rows' primary keys, when every row has one.
fn id_filter(rows: &[Row]) -> Option<Filter> {
    let ids = rows
        .iter()
        .map(|row| match row.get("id")? {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    if ids.is_empty() {
        return None;
    }
    Some(Filter {
        column: "id".to_string(),
        op: FilterOp::In,
        value: format!("({})", ids.join(",")),
    })
}

fn row_mismatches(row: &Row, expected: &Row) -> Vec<Value> {
    expected
        .iter()
        .filter(|(column, value)| !values_match(value, row.get(column.as_str())))
        .map(|(column, value)| {
            json!({
                "column": column,
                "expected": value,
                "actual": row.get(column).cloned().unwrap_or(Value::Null),
            })
        })
        .collect()
}

fn account_mismatches(
    account: &Account,
    email: Option<&str>,
    patch: Option<&AccountPatch>,
) -> Vec<&'static str> {
    let mut mismatches = Vec::new();
    if let Some(email) = email {
        if !account
            .email
            .as_deref()
            .is_some_and(|actual| actual.eq_ignore_ascii_case(email))
        {
            mismatches.push("email");
        }
    }
    let Some(patch) = patch else {
        return mismatches;
    };
    if patch.email_confirm == Some(true) && account.email_confirmed_at.is_none() {
        mismatches.push("email_confirm");
    }
    if let Some(ban) = patch.ban_duration.as_deref() {
        let banned = account.is_banned_at(chrono::Utc::now());
        if banned != (ban != "none") {
            mismatches.push("ban");
        }
    }
    if let Some(expected) = &patch.user_metadata {
        if !metadata_contains(&account.user_metadata, expected) {
            mismatches.push("user_metadata");
        }
    }
    if let Some(expected) = &patch.app_metadata {
        if !metadata_contains(&account.app_metadata, expected) {
            mismatches.push("app_metadata");
        }
    }
    mismatches
}

// The identity service merges metadata, so only the requested keys are compared.
fn metadata_contains(actual: &Value, expected: &Value) -> bool {
    let empty = Map::new();
    let actual = actual.as_object().unwrap_or(&empty);
    expected.as_object().is_none_or(|expected| {
        expected
            .iter()
            .all(|(key, value)| values_match(value, actual.get(key)))
    })
}
