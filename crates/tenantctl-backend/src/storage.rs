//! Blob storage contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BackendError, BackendResult};

/// Storage bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    /// Bucket identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Whether objects are served without a key.
    #[serde(default)]
    pub public: bool,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Object (or folder placeholder) inside a bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Object name relative to the listed prefix.
    pub name: String,
    /// Object identifier; folders have none.
    #[serde(default)]
    pub id: Option<String>,
    /// Last modification time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Size, content type and similar metadata.
    #[serde(default)]
    pub metadata: Value,
}

impl StoredObject {
    /// Size in bytes from metadata, when reported.
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        self.metadata.get("size").and_then(Value::as_u64)
    }

    /// Whether this entry is a folder placeholder.
    #[must_use]
    pub const fn is_folder(&self) -> bool {
        self.id.is_none()
    }
}

/// Object upload request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Target bucket.
    pub bucket: String,
    /// Object path inside the bucket.
    pub path: String,
    /// Object content.
    pub bytes: Vec<u8>,
    /// MIME type sent with the object.
    pub content_type: String,
    /// Overwrite an existing object.
    pub upsert: bool,
}

/// Acknowledgement returned after an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Full object key (`bucket/path`).
    #[serde(rename = "Key", alias = "key")]
    pub key: String,
}

/// Bucket listing, object upload and removal.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Every bucket in the project.
    async fn list_buckets(&self) -> BackendResult<Vec<Bucket>>;

    /// Objects directly under `prefix` (empty prefix lists the bucket root),
    /// sorted by name and starting `offset` entries into the listing.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        limit: u32,
        offset: u32,
    ) -> BackendResult<Vec<StoredObject>>;

    /// Upload one object.
    async fn upload(&self, request: &UploadRequest) -> BackendResult<UploadReceipt>;

    /// Remove objects by full path; returns what was removed.
    async fn remove(&self, bucket: &str, paths: &[String]) -> BackendResult<Vec<StoredObject>>;
}

/// Validate a bucket name (non-empty, no slashes).
///
/// # Errors
///
/// Returns [`BackendError::InvalidIdentifier`] for rejected names.
pub fn validate_bucket(bucket: &str) -> BackendResult<()> {
    if bucket.trim().is_empty() || bucket.contains('/') || bucket.chars().any(char::is_whitespace) {
        return Err(BackendError::InvalidIdentifier {
            kind: "bucket",
            value: bucket.to_string(),
        });
    }
    Ok(())
}

/// Validate an object path (relative, no empty or `..` segments).
///
/// # Errors
///
/// Returns [`BackendError::InvalidIdentifier`] for rejected paths.
pub fn validate_object_path(path: &str) -> BackendResult<()> {
    let valid = !path.is_empty()
        && !path.starts_with('/')
        && path
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if valid {
        Ok(())
    } else {
        Err(BackendError::InvalidIdentifier {
            kind: "object path",
            value: path.to_string(),
        })
    }
}

/// Split `a/b/c.png` into (`a/b`, `c.png`).
#[must_use]
pub fn split_object_path(path: &str) -> (&str, &str) {
    path.rsplit_once('/').unwrap_or(("", path))
}
