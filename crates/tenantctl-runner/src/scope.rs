//! Tenant scoping for record operations.

use serde_json::Value;
use tenantctl_backend::{Filter, FilterOp, Row, validate_identifier};
use tenantctl_config::DEFAULT_TENANT_COLUMN;

use crate::error::{RunnerError, RunnerResult};
use crate::values::values_match;

/// Which tenant record actions are confined to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantScope {
    /// Selected tenant identifier.
    pub tenant: Option<String>,
    /// Column holding the tenant identifier.
    pub column: String,
    /// Explicit opt-out: mutations may touch every tenant.
    pub unscoped: bool,
}

impl Default for TenantScope {
    fn default() -> Self {
        Self {
            tenant: None,
            column: DEFAULT_TENANT_COLUMN.to_string(),
            unscoped: false,
        }
    }
}

impl TenantScope {
    /// Scope confined to `tenant` on `column`.
    #[must_use]
    pub fn tenant(tenant: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            tenant: Some(tenant.into()),
            column: column.into(),
            unscoped: false,
        }
    }

    /// Scope that deliberately spans every tenant.
    #[must_use]
    pub fn unscoped(column: impl Into<String>) -> Self {
        Self {
            tenant: None,
            column: column.into(),
            unscoped: true,
        }
    }

    /// Tenant to apply, ignoring it when the scope is explicitly unscoped.
    fn active_tenant(&self) -> Option<&str> {
        if self.unscoped {
            None
        } else {
            self.tenant.as_deref()
        }
    }

    /// Append the tenant predicate to `filters`.
    ///
    /// A caller-supplied filter on the tenant column is a conflict, not an
    /// intersection, unless it is `eq` on the selected tenant.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::TenantConflict`] or a backend identifier error
    /// for an invalid tenant column.
    pub fn apply(&self, mut filters: Vec<Filter>) -> RunnerResult<Vec<Filter>> {
        let Some(tenant) = self.active_tenant() else {
            return Ok(filters);
        };
        if let Some(existing) = filters
            .iter()
            .find(|filter| {
                filter.column == self.column
                    && (filter.op != FilterOp::Eq || filter.value != tenant)
            })
        {
            return Err(RunnerError::TenantConflict {
                column: self.column.clone(),
                tenant: tenant.to_string(),
                found: existing.to_string(),
            });
        }
        let predicate = Filter::eq(&self.column, tenant)?;
        if !filters.contains(&predicate) {
            filters.push(predicate);
        }
        Ok(filters)
    }

    /// Refuse a mutation that would span every tenant by accident.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::TenantRequired`] when no tenant is selected and
    /// the scope is not explicitly unscoped.
    pub const fn require_for(&self, action: &'static str) -> RunnerResult<()> {
        if self.tenant.is_none() && !self.unscoped {
            return Err(RunnerError::TenantRequired { action });
        }
        Ok(())
    }

    /// Stamp the tenant column on a row about to be inserted.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::TenantConflict`] when the row names another tenant.
    pub fn stamp(&self, row: &mut Row) -> RunnerResult<()> {
        let Some(tenant) = self.active_tenant() else {
            return Ok(());
        };
        validate_identifier("column", &self.column)?;
        match row.get(&self.column) {
            None | Some(Value::Null) => {
                row.insert(self.column.clone(), Value::String(tenant.to_string()));
                Ok(())
            }
            Some(found) => self.check_value(found),
        }
    }

    /// Reject a change that moves rows to another tenant.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::TenantConflict`] when `changes` rewrites the
    /// tenant column to a different value.
    pub fn guard_changes(&self, changes: &Row) -> RunnerResult<()> {
        match changes.get(&self.column) {
            Some(found) if self.active_tenant().is_some() => self.check_value(found),
            _ => Ok(()),
        }
    }

    fn check_value(&self, found: &Value) -> RunnerResult<()> {
        let Some(tenant) = self.active_tenant() else {
            return Ok(());
        };
        if values_match(&Value::String(tenant.to_string()), Some(found)) {
            return Ok(());
        }
        Err(RunnerError::TenantConflict {
            column: self.column.clone(),
            tenant: tenant.to_string(),
            found: match found {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            },
        })
    }
}
