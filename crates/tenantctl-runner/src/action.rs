//! Action catalogue: one variant per remote operation.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Serialize, Serializer};
use serde_json::Value;
use tenantctl_backend::storage::{validate_bucket, validate_object_path};
use tenantctl_backend::{
    AccountPatch, Filter, NewAccount, RecordQuery, Row, UploadRequest, validate_identifier,
};
use tenantctl_config::Secret;
use tracing::warn;
use uuid::Uuid;

use crate::error::{RunnerError, RunnerResult};
use crate::params::ActionParams;
use crate::scope::TenantScope;
use crate::values::parse_assignment;

const MAX_PAGE_SIZE: u32 = 1000;
const DEFAULT_ACCOUNT_PAGE_SIZE: u32 = 50;
const DEFAULT_OBJECT_LIMIT: u32 = 100;

/// Stable dotted action names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionName {
    /// `records.select`
    RecordsSelect,
    /// `records.count`
    RecordsCount,
    /// `records.insert`
    RecordsInsert,
    /// `records.update`
    RecordsUpdate,
    /// `records.delete`
    RecordsDelete,
    /// `accounts.list`
    AccountsList,
    /// `accounts.find`
    AccountsFind,
    /// `accounts.create`
    AccountsCreate,
    /// `accounts.update`
    AccountsUpdate,
    /// `accounts.delete`
    AccountsDelete,
    /// `storage.buckets`
    StorageBuckets,
    /// `storage.list`
    StorageList,
    /// `storage.upload`
    StorageUpload,
    /// `storage.remove`
    StorageRemove,
}

impl ActionName {
    /// Every action, in catalogue order.
    pub const ALL: [Self; 14] = [
        Self::RecordsSelect,
        Self::RecordsCount,
        Self::RecordsInsert,
        Self::RecordsUpdate,
        Self::RecordsDelete,
        Self::AccountsList,
        Self::AccountsFind,
        Self::AccountsCreate,
        Self::AccountsUpdate,
        Self::AccountsDelete,
        Self::StorageBuckets,
        Self::StorageList,
        Self::StorageUpload,
        Self::StorageRemove,
    ];

    /// Dotted name (`records.update`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RecordsSelect => "records.select",
            Self::RecordsCount => "records.count",
            Self::RecordsInsert => "records.insert",
            Self::RecordsUpdate => "records.update",
            Self::RecordsDelete => "records.delete",
            Self::AccountsList => "accounts.list",
            Self::AccountsFind => "accounts.find",
            Self::AccountsCreate => "accounts.create",
            Self::AccountsUpdate => "accounts.update",
            Self::AccountsDelete => "accounts.delete",
            Self::StorageBuckets => "storage.buckets",
            Self::StorageList => "storage.list",
            Self::StorageUpload => "storage.upload",
            Self::StorageRemove => "storage.remove",
        }
    }

    /// Whether the action changes remote state.
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        matches!(
            self,
            Self::RecordsInsert
                | Self::RecordsUpdate
                | Self::RecordsDelete
                | Self::AccountsCreate
                | Self::AccountsUpdate
                | Self::AccountsDelete
                | Self::StorageUpload
                | Self::StorageRemove
        )
    }

    /// Parameter keys the action accepts.
    #[must_use]
    pub const fn accepted_params(self) -> &'static [&'static str] {
        match self {
            Self::RecordsSelect => &["table", "filter", "columns", "order", "limit"],
            Self::RecordsCount | Self::RecordsDelete => &["table", "filter"],
            Self::RecordsInsert => &["table", "set"],
            Self::RecordsUpdate => &["table", "filter", "set"],
            Self::AccountsList => &["page", "per_page"],
            Self::AccountsFind => &["email"],
            Self::AccountsCreate => &[
                "email",
                "password",
                "confirm",
                "user_metadata",
                "app_metadata",
            ],
            Self::AccountsUpdate => &[
                "id",
                "email",
                "password",
                "confirm",
                "ban",
                "user_metadata",
                "app_metadata",
            ],
            Self::AccountsDelete => &["id"],
            Self::StorageBuckets => &[],
            Self::StorageList => &["bucket", "prefix", "limit"],
            Self::StorageUpload => &["bucket", "path", "file", "content_type", "upsert"],
            Self::StorageRemove => &["bucket", "path"],
        }
    }
}

impl Display for ActionName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl Serialize for ActionName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl FromStr for ActionName {
    type Err = RunnerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim();
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == wanted)
            .ok_or_else(|| RunnerError::UnknownAction {
                name: value.to_string(),
            })
    }
}

/// A fully validated administrative action.
#[derive(Debug, Clone)]
pub enum Action {
    /// Read rows.
    SelectRecords {
        /// Table, filters (tenant predicate included) and projection.
        query: RecordQuery,
    },
    /// Count rows.
    CountRecords {
        /// Target table.
        table: String,
        /// Predicates, tenant included.
        filters: Vec<Filter>,
    },
    /// Insert one row.
    InsertRecord {
        /// Target table.
        table: String,
        /// Row to insert, tenant column stamped.
        row: Row,
    },
    /// Update every matching row.
    UpdateRecords {
        /// Target table.
        table: String,
        /// Predicates, tenant included.
        filters: Vec<Filter>,
        /// Column values to write.
        changes: Row,
    },
    /// Delete every matching row.
    DeleteRecords {
        /// Target table.
        table: String,
        /// Predicates, tenant included.
        filters: Vec<Filter>,
    },
    /// List one page of accounts.
    ListAccounts {
        /// 1-based page.
        page: u32,
        /// Page size.
        per_page: u32,
    },
    /// Find an account by email.
    FindAccount {
        /// Email to look for, compared case-insensitively.
        email: String,
    },
    /// Create an account.
    CreateAccount {
        /// Creation payload.
        account: NewAccount,
    },
    /// Update an account.
    UpdateAccount {
        /// Account id.
        id: Uuid,
        /// Requested changes.
        patch: AccountPatch,
    },
    /// Delete an account.
    DeleteAccount {
        /// Account id.
        id: Uuid,
    },
    /// List buckets.
    ListBuckets,
    /// List objects under a prefix.
    ListObjects {
        /// Bucket.
        bucket: String,
        /// Folder prefix; empty lists the root.
        prefix: String,
        /// Maximum entries.
        limit: u32,
    },
    /// Upload a local file.
    UploadObject {
        /// Upload payload.
        request: UploadRequest,
    },
    /// Remove objects.
    RemoveObjects {
        /// Bucket.
        bucket: String,
        /// Full object paths.
        paths: Vec<String>,
    },
}

impl Action {
    /// Name of this action.
    #[must_use]
    pub const fn name(&self) -> ActionName {
        match self {
            Self::SelectRecords { .. } => ActionName::RecordsSelect,
            Self::CountRecords { .. } => ActionName::RecordsCount,
            Self::InsertRecord { .. } => ActionName::RecordsInsert,
            Self::UpdateRecords { .. } => ActionName::RecordsUpdate,
            Self::DeleteRecords { .. } => ActionName::RecordsDelete,
            Self::ListAccounts { .. } => ActionName::AccountsList,
            Self::FindAccount { .. } => ActionName::AccountsFind,
            Self::CreateAccount { .. } => ActionName::AccountsCreate,
            Self::UpdateAccount { .. } => ActionName::AccountsUpdate,
            Self::DeleteAccount { .. } => ActionName::AccountsDelete,
            Self::ListBuckets => ActionName::StorageBuckets,
            Self::ListObjects { .. } => ActionName::StorageList,
            Self::UploadObject { .. } => ActionName::StorageUpload,
            Self::RemoveObjects { .. } => ActionName::StorageRemove,
        }
    }

    /// Build an action from its dotted name and parameter mapping.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] for unknown actions, missing or malformed
    /// parameters, and tenant scoping violations. Nothing is sent remotely.
    pub fn from_params(name: &str, params: &ActionParams, scope: &TenantScope) -> RunnerResult<Self> {
        Self::build(name.parse()?, params, scope)
    }

    /// [`Action::from_params`] with an already resolved name.
    ///
    /// # Errors
    ///
    /// See [`Action::from_params`].
    pub fn build(name: ActionName, params: &ActionParams, scope: &TenantScope) -> RunnerResult<Self> {
        let label = name.as_str();
        params.ensure_only(label, name.accepted_params())?;
        match name {
            ActionName::RecordsSelect => {
                let table = table_param(params, label)?;
                warn_unscoped_read(scope, label);
                let columns = params.optional("columns").map(str::to_string);
                let order = params.optional("order").map(str::to_string);
                let limit = params.parsed::<u32>("limit")?;
                Ok(Self::SelectRecords {
                    query: RecordQuery {
                        filters: scope.apply(filter_params(params)?)?,
                        table,
                        columns,
                        order,
                        limit,
                    },
                })
            }
            ActionName::RecordsCount => {
                let table = table_param(params, label)?;
                warn_unscoped_read(scope, label);
                Ok(Self::CountRecords {
                    table,
                    filters: scope.apply(filter_params(params)?)?,
                })
            }
            ActionName::RecordsInsert => {
                let table = table_param(params, label)?;
                scope.require_for(label)?;
                let mut row = assignment_params(params, label)?;
                scope.stamp(&mut row)?;
                Ok(Self::InsertRecord { table, row })
            }
            ActionName::RecordsUpdate => {
                let table = table_param(params, label)?;
                scope.require_for(label)?;
                let filters = required_filters(params, label)?;
                let changes = assignment_params(params, label)?;
                scope.guard_changes(&changes)?;
                Ok(Self::UpdateRecords {
                    table,
                    filters: scope.apply(filters)?,
                    changes,
                })
            }
            ActionName::RecordsDelete => {
                let table = table_param(params, label)?;
                scope.require_for(label)?;
                let filters = required_filters(params, label)?;
                Ok(Self::DeleteRecords {
                    table,
                    filters: scope.apply(filters)?,
                })
            }
            ActionName::AccountsList => {
                let page = params.parsed::<u32>("page")?.unwrap_or(1);
                if page == 0 {
                    return Err(RunnerError::invalid("page", "pages start at 1"));
                }
                let per_page = params
                    .parsed::<u32>("per_page")?
                    .unwrap_or(DEFAULT_ACCOUNT_PAGE_SIZE);
                check_page_size("per_page", per_page)?;
                Ok(Self::ListAccounts { page, per_page })
            }
            ActionName::AccountsFind => Ok(Self::FindAccount {
                email: email_param(params.required(label, "email")?)?,
            }),
            ActionName::AccountsCreate => Ok(Self::CreateAccount {
                account: NewAccount {
                    email: email_param(params.required(label, "email")?)?,
                    password: params.verbatim("password").map(Secret::new),
                    email_confirm: params.flag("confirm", true)?,
                    user_metadata: metadata_param(params, "user_metadata")?,
                    app_metadata: metadata_param(params, "app_metadata")?,
                },
            }),
            ActionName::AccountsUpdate => {
                let id = id_param(params, label)?;
                let patch = AccountPatch {
                    email: params.optional("email").map(email_param).transpose()?,
                    password: params.verbatim("password").map(Secret::new),
                    email_confirm: params
                        .optional("confirm")
                        .map(|_| params.flag("confirm", false))
                        .transpose()?,
                    ban_duration: params.optional("ban").map(ban_param).transpose()?,
                    user_metadata: metadata_param(params, "user_metadata")?,
                    app_metadata: metadata_param(params, "app_metadata")?,
                };
                if patch.is_empty() {
                    return Err(RunnerError::invalid(
                        label,
                        "nothing to change; pass email, password, confirm, ban or metadata",
                    ));
                }
                Ok(Self::UpdateAccount { id, patch })
            }
            ActionName::AccountsDelete => Ok(Self::DeleteAccount {
                id: id_param(params, label)?,
            }),
            ActionName::StorageBuckets => Ok(Self::ListBuckets),
            ActionName::StorageList => {
                let bucket = bucket_param(params, label)?;
                let prefix = params
                    .optional("prefix")
                    .map(|prefix| prefix.trim_matches('/').to_string())
                    .unwrap_or_default();
                if !prefix.is_empty() {
                    validate_object_path(&prefix)?;
                }
                let limit = params.parsed::<u32>("limit")?.unwrap_or(DEFAULT_OBJECT_LIMIT);
                check_page_size("limit", limit)?;
                Ok(Self::ListObjects {
                    bucket,
                    prefix,
                    limit,
                })
            }
            ActionName::StorageUpload => {
                let bucket = bucket_param(params, label)?;
                let path = params.required(label, "path")?.to_string();
                validate_object_path(&path)?;
                let file = PathBuf::from(params.required(label, "file")?);
                let bytes = std::fs::read(&file).map_err(|source| RunnerError::ReadFile {
                    path: file.clone(),
                    source,
                })?;
                let content_type = params
                    .optional("content_type")
                    .map_or_else(|| guess_content_type(&file).to_string(), str::to_string);
                Ok(Self::UploadObject {
                    request: UploadRequest {
                        bucket,
                        path,
                        bytes,
                        content_type,
                        upsert: params.flag("upsert", false)?,
                    },
                })
            }
            ActionName::StorageRemove => {
                let bucket = bucket_param(params, label)?;
                let paths = params
                    .all("path")
                    .iter()
                    .map(|path| path.trim().to_string())
                    .filter(|path| !path.is_empty())
                    .collect::<Vec<_>>();
                if paths.is_empty() {
                    return Err(RunnerError::MissingParam { action: label, key: "path" });
                }
                for path in &paths {
                    validate_object_path(path)?;
                }
                Ok(Self::RemoveObjects { bucket, paths })
            }
        }
    }
}

fn table_param(params: &ActionParams, action: &'static str) -> RunnerResult<String> {
    let table = params.required(action, "table")?;
    validate_identifier("table", table)?;
    Ok(table.to_string())
}

fn bucket_param(params: &ActionParams, action: &'static str) -> RunnerResult<String> {
    let bucket = params.required(action, "bucket")?;
    validate_bucket(bucket)?;
    Ok(bucket.to_string())
}

fn filter_params(params: &ActionParams) -> RunnerResult<Vec<Filter>> {
    params
        .all("filter")
        .iter()
        .map(|raw| Filter::parse(raw).map_err(RunnerError::from))
        .collect()
}

// Bulk mutations always need a caller filter; the tenant predicate alone
// would touch every row the tenant owns.
fn required_filters(params: &ActionParams, action: &'static str) -> RunnerResult<Vec<Filter>> {
    let filters = filter_params(params)?;
    if filters.is_empty() {
        return Err(RunnerError::MissingParam { action, key: "filter" });
    }
    Ok(filters)
}

fn assignment_params(params: &ActionParams, action: &'static str) -> RunnerResult<Row> {
    let mut row = Row::new();
    for raw in params.all("set") {
        let (column, value) = parse_assignment(raw)?;
        validate_identifier("column", &column)?;
        if row.insert(column.clone(), value).is_some() {
            return Err(RunnerError::invalid("set", format!("column '{column}' assigned twice")));
        }
    }
    if row.is_empty() {
        return Err(RunnerError::MissingParam { action, key: "set" });
    }
    Ok(row)
}

fn warn_unscoped_read(scope: &TenantScope, action: &'static str) {
    if scope.tenant.is_none() {
        warn!(action, "no tenant selected; reading across every tenant");
    }
}

fn check_page_size(key: &str, value: u32) -> RunnerResult<()> {
    if value == 0 || value > MAX_PAGE_SIZE {
        return Err(RunnerError::invalid(
            key,
            format!("must be between 1 and {MAX_PAGE_SIZE}"),
        ));
    }
    Ok(())
}

fn id_param(params: &ActionParams, action: &'static str) -> RunnerResult<Uuid> {
    let raw = params.required(action, "id")?;
    Uuid::parse_str(raw).map_err(|err| RunnerError::invalid("id", format!("'{raw}': {err}")))
}

fn email_param(raw: &str) -> RunnerResult<String> {
    let email = raw.trim();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'))
        && !email.chars().any(char::is_whitespace);
    if !valid {
        return Err(RunnerError::invalid("email", format!("'{email}' is not an email address")));
    }
    Ok(email.to_string())
}

fn metadata_param(params: &ActionParams, key: &str) -> RunnerResult<Option<Value>> {
    params
        .optional(key)
        .map(|raw| match serde_json::from_str::<Value>(raw) {
            Ok(value @ Value::Object(_)) => Ok(value),
            Ok(_) => Err(RunnerError::invalid(key, "expected a JSON object")),
            Err(err) => Err(RunnerError::invalid(key, format!("invalid JSON: {err}"))),
        })
        .transpose()
}

/// Accept `none` (lift a ban) or a duration such as `24h` or `1h30m`.
fn ban_param(raw: &str) -> RunnerResult<String> {
    let value = raw.trim().to_ascii_lowercase();
    if value == "none" || is_duration(&value) {
        return Ok(value);
    }
    Err(RunnerError::invalid(
        "ban",
        format!("'{raw}' is not a duration like 24h or 30m, or none"),
    ))
}

fn is_duration(value: &str) -> bool {
    let mut rest = value;
    let mut parts = 0;
    while !rest.is_empty() {
        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        if digits == 0 {
            return false;
        }
        rest = &rest[digits..];
        let Some(unit) = ["ms", "h", "m", "s"]
            .into_iter()
            .find(|unit| rest.starts_with(unit))
        else {
            return false;
        };
        rest = &rest[unit.len()..];
        parts += 1;
    }
    parts > 0
}

fn guess_content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "csv" => "text/csv",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        _ => "application/octet-stream",
    }
}
