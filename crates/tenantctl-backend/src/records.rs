//! Tenant-scoped record store contract.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::BackendResult;
use crate::filter::Filter;

/// A table row as returned by the REST layer.
pub type Row = Map<String, Value>;

/// Filtered read request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    /// Table name.
    pub table: String,
    /// Predicates, combined with AND.
    pub filters: Vec<Filter>,
    /// Column projection (`select=`); all columns when `None`.
    pub columns: Option<String>,
    /// Ordering clause (`created_at.desc`).
    pub order: Option<String>,
    /// Maximum number of rows.
    pub limit: Option<u32>,
}

impl RecordQuery {
    /// Query every column of `table` matching `filters`.
    #[must_use]
    pub fn new(table: impl Into<String>, filters: Vec<Filter>) -> Self {
        Self {
            table: table.into(),
            filters,
            ..Self::default()
        }
    }
}

/// Filtered read, insert, update and delete over tables.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Rows matching the query.
    async fn select(&self, query: &RecordQuery) -> BackendResult<Vec<Row>>;

    /// Exact number of rows matching `filters`.
    async fn count(&self, table: &str, filters: &[Filter]) -> BackendResult<u64>;

    /// Insert rows and return them as stored.
    async fn insert(&self, table: &str, rows: &[Row]) -> BackendResult<Vec<Row>>;

    /// Apply `changes` to every row matching `filters`; returns the updated rows.
    async fn update(&self, table: &str, filters: &[Filter], changes: &Row)
    -> BackendResult<Vec<Row>>;

    /// Delete every row matching `filters`; returns the deleted rows.
    async fn delete(&self, table: &str, filters: &[Filter]) -> BackendResult<Vec<Row>>;
}

/// Total from a `Content-Range` header (`0-24/3573`, `*/0`).
#[must_use]
pub fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}
