//! Administrative identity service contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tenantctl_config::Secret;
use uuid::Uuid;

use crate::error::BackendResult;

/// Authentication account as reported by the identity service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Account identifier.
    pub id: Uuid,
    /// Login email, when the account has one.
    #[serde(default)]
    pub email: Option<String>,
    /// Login phone, when the account has one.
    #[serde(default)]
    pub phone: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Most recent sign-in.
    #[serde(default)]
    pub last_sign_in_at: Option<DateTime<Utc>>,
    /// When the email was confirmed; unconfirmed accounts cannot sign in.
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
    /// Ban expiry, when banned.
    #[serde(default)]
    pub banned_until: Option<DateTime<Utc>>,
    /// User-editable metadata.
    #[serde(default)]
    pub user_metadata: Value,
    /// Service-managed metadata (roles, tenant claims).
    #[serde(default)]
    pub app_metadata: Value,
}

impl Account {
    /// Whether the account is banned at `now`.
    #[must_use]
    pub fn is_banned_at(&self, now: DateTime<Utc>) -> bool {
        self.banned_until.is_some_and(|until| until > now)
    }
}

/// One page of the account listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountPage {
    /// Accounts on this page.
    pub accounts: Vec<Account>,
    /// 1-based page number.
    pub page: u32,
    /// Requested page size.
    pub per_page: u32,
    /// Total accounts, when the service reports it.
    pub total: Option<u64>,
}

impl AccountPage {
    /// Whether another page may follow.
    #[must_use]
    pub fn has_more(&self) -> bool {
        match self.total {
            Some(total) => u64::from(self.page) * u64::from(self.per_page) < total,
            None => self.accounts.len() >= self.per_page as usize,
        }
    }
}

/// Account creation payload.
#[derive(Debug, Clone, Serialize)]
pub struct NewAccount {
    /// Login email.
    pub email: String,
    /// Initial password.
    #[serde(
        serialize_with = "serialize_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub password: Option<Secret>,
    /// Mark the email as confirmed immediately.
    pub email_confirm: bool,
    /// Initial user metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<Value>,
    /// Initial app metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_metadata: Option<Value>,
}

/// Partial account update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccountPatch {
    /// New login email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// New password.
    #[serde(
        serialize_with = "serialize_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub password: Option<Secret>,
    /// Confirm the email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_confirm: Option<bool>,
    /// Ban duration (`24h`, `876000h`), or `none` to lift a ban.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ban_duration: Option<String>,
    /// Replacement user metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<Value>,
    /// Replacement app metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_metadata: Option<Value>,
}

impl AccountPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password.is_none()
            && self.email_confirm.is_none()
            && self.ban_duration.is_none()
            && self.user_metadata.is_none()
            && self.app_metadata.is_none()
    }
}

#[allow(clippy::ref_option)]
fn serialize_secret<S: Serializer>(secret: &Option<Secret>, serializer: S) -> Result<S::Ok, S::Error> {
    match secret {
        Some(secret) => serializer.serialize_str(secret.expose()),
        None => serializer.serialize_none(),
    }
}

/// Account management on the identity service, independent of the record store.
#[async_trait]
pub trait IdentityAdmin: Send + Sync {
    /// One page of accounts (`page` is 1-based).
    async fn list_accounts(&self, page: u32, per_page: u32) -> BackendResult<AccountPage>;

    /// Single account by id.
    async fn get_account(&self, id: Uuid) -> BackendResult<Account>;

    /// Create an account.
    async fn create_account(&self, account: &NewAccount) -> BackendResult<Account>;

    /// Apply a partial update.
    async fn update_account(&self, id: Uuid, patch: &AccountPatch) -> BackendResult<Account>;

    /// Delete an account.
    async fn delete_account(&self, id: Uuid) -> BackendResult<()>;
}
