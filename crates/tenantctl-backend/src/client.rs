//! HTTP implementation of the backend contracts.
//!
//! # Design
//! - One `reqwest::Client` carries the privileged key and trace id as default headers.
//! - Every call is a single request/response; there is no retry.
//! - Non-success responses are decoded into [`RemoteError`] verbatim.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use tenantctl_config::BackendSettings;
use uuid::Uuid;

use crate::error::{BackendError, BackendResult, RemoteError};
use crate::filter::{Filter, validate_identifier};
use crate::identity::{Account, AccountPage, AccountPatch, IdentityAdmin, NewAccount};
use crate::records::{RecordQuery, RecordStore, Row, parse_content_range_total};
use crate::storage::{
    BlobStore, Bucket, StoredObject, UploadReceipt, UploadRequest, validate_bucket,
    validate_object_path,
};

const HEADER_API_KEY: &str = "apikey";
const HEADER_REQUEST_ID: &str = "x-request-id";
const HEADER_PREFER: &str = "Prefer";
const HEADER_UPSERT: &str = "x-upsert";
const HEADER_TOTAL_COUNT: &str = "x-total-count";
const HEADER_CONTENT_RANGE: &str = "content-range";
const RETURN_REPRESENTATION: &str = "return=representation";

/// Client for the REST, identity and storage endpoints of one project.
#[derive(Clone, Debug)]
pub struct BackendClient {
    http: Client,
    base_url: Url,
}

impl BackendClient {
    /// Build a client from resolved settings.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidHeader`] when a credential cannot be sent
    /// as a header and [`BackendError::Transport`] when the client cannot be built.
    pub fn new(settings: &BackendSettings, trace_id: &str) -> BackendResult<Self> {
        let key = settings.service_key.expose();
        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(key).map_err(|_| BackendError::InvalidHeader {
            name: HEADER_API_KEY,
        })?;
        api_key.set_sensitive(true);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| {
            BackendError::InvalidHeader {
                name: "authorization",
            }
        })?;
        bearer.set_sensitive(true);
        let request_id = HeaderValue::from_str(trace_id).map_err(|_| {
            BackendError::InvalidHeader {
                name: HEADER_REQUEST_ID,
            }
        })?;
        headers.insert(HEADER_API_KEY, api_key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(HEADER_REQUEST_ID, request_id);

        let http = Client::builder()
            .timeout(settings.timeout)
            .default_headers(headers)
            .build()
            .map_err(|source| BackendError::Transport {
                operation: "client.build",
                source,
            })?;
        Ok(Self::with_client(http, settings.api_url.clone()))
    }

    /// Wrap an existing HTTP client; callers supply any auth headers themselves.
    #[must_use]
    pub const fn with_client(http: Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    fn endpoint(&self, operation: &'static str, segments: &[&str]) -> BackendResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| BackendError::InvalidUrl {
                operation,
                reason: "base URL cannot carry a path",
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn table_url(&self, operation: &'static str, table: &str, filters: &[Filter]) -> BackendResult<Url> {
        validate_identifier("table", table)?;
        let mut url = self.endpoint(operation, &["rest", "v1", table])?;
        if !filters.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for filter in filters {
                pairs.append_pair(&filter.column, &filter.query_value());
            }
        }
        Ok(url)
    }

    async fn execute(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> BackendResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|source| BackendError::Transport { operation, source })?;
        let status = response.status();
        tracing::debug!(
            operation,
            path = response.url().path(),
            status = status.as_u16(),
            "backend call completed"
        );
        if status.is_success() {
            return Ok(response);
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(err) => {
                tracing::debug!(operation, error = %err, "failed to read error body");
                Vec::new()
            }
        };
        let remote = RemoteError::from_body(status.as_u16(), &bytes);
        tracing::warn!(
            operation,
            status = remote.status,
            code = remote.code.as_deref().unwrap_or("-"),
            "backend call rejected"
        );
        Err(BackendError::Remote { operation, remote })
    }

    async fn decode<T: DeserializeOwned>(
        operation: &'static str,
        response: Response,
    ) -> BackendResult<T> {
        let bytes = response
            .bytes()
            .await
            .map_err(|source| BackendError::Transport { operation, source })?;
        serde_json::from_slice(&bytes)
            .map_err(|source| BackendError::Decode { operation, source })
    }

    fn require_filters(operation: &'static str, table: &str, filters: &[Filter]) -> BackendResult<()> {
        if filters.is_empty() {
            return Err(BackendError::Unfiltered {
                operation,
                table: table.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for BackendClient {
    async fn select(&self, query: &RecordQuery) -> BackendResult<Vec<Row>> {
        const OP: &str = "records.select";
        let mut url = self.table_url(OP, &query.table, &query.filters)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", query.columns.as_deref().unwrap_or("*"));
            if let Some(order) = &query.order {
                pairs.append_pair("order", order);
            }
            if let Some(limit) = query.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
        }
        let response = self.execute(OP, self.http.get(url)).await?;
        Self::decode(OP, response).await
    }

    async fn count(&self, table: &str, filters: &[Filter]) -> BackendResult<u64> {
        const OP: &str = "records.count";
        let mut url = self.table_url(OP, table, filters)?;
        url.query_pairs_mut().append_pair("select", "*");
        let response = self
            .execute(OP, self.http.head(url).header(HEADER_PREFER, "count=exact"))
            .await?;
        response
            .headers()
            .get(HEADER_CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or(BackendError::MissingCount { operation: OP })
    }

    async fn insert(&self, table: &str, rows: &[Row]) -> BackendResult<Vec<Row>> {
        const OP: &str = "records.insert";
        let url = self.table_url(OP, table, &[])?;
        let request = self
            .http
            .post(url)
            .header(HEADER_PREFER, RETURN_REPRESENTATION)
            .json(rows);
        let response = self.execute(OP, request).await?;
        Self::decode(OP, response).await
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        changes: &Row,
    ) -> BackendResult<Vec<Row>> {
        const OP: &str = "records.update";
        Self::require_filters("update", table, filters)?;
        let url = self.table_url(OP, table, filters)?;
        let request = self
            .http
            .patch(url)
            .header(HEADER_PREFER, RETURN_REPRESENTATION)
            .json(changes);
        let response = self.execute(OP, request).await?;
        Self::decode(OP, response).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> BackendResult<Vec<Row>> {
        const OP: &str = "records.delete";
        Self::require_filters("delete", table, filters)?;
        let url = self.table_url(OP, table, filters)?;
        let request = self
            .http
            .delete(url)
            .header(HEADER_PREFER, RETURN_REPRESENTATION);
        let response = self.execute(OP, request).await?;
        Self::decode(OP, response).await
    }
}

#[derive(serde::Deserialize)]
struct AccountList {
    #[serde(default)]
    users: Vec<Account>,
}

#[async_trait]
impl IdentityAdmin for BackendClient {
    async fn list_accounts(&self, page: u32, per_page: u32) -> BackendResult<AccountPage> {
        const OP: &str = "accounts.list";
        let mut url = self.endpoint(OP, &["auth", "v1", "admin", "users"])?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &per_page.to_string());
        let response = self.execute(OP, self.http.get(url)).await?;
        let total = response
            .headers()
            .get(HEADER_TOTAL_COUNT)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok());
        let list: AccountList = Self::decode(OP, response).await?;
        Ok(AccountPage {
            accounts: list.users,
            page,
            per_page,
            total,
        })
    }

    async fn get_account(&self, id: Uuid) -> BackendResult<Account> {
        const OP: &str = "accounts.get";
        let id = id.to_string();
        let url = self.endpoint(OP, &["auth", "v1", "admin", "users", &id])?;
        let response = self.execute(OP, self.http.get(url)).await?;
        Self::decode(OP, response).await
    }

    async fn create_account(&self, account: &NewAccount) -> BackendResult<Account> {
        const OP: &str = "accounts.create";
        let url = self.endpoint(OP, &["auth", "v1", "admin", "users"])?;
        let response = self.execute(OP, self.http.post(url).json(account)).await?;
        Self::decode(OP, response).await
    }

    async fn update_account(&self, id: Uuid, patch: &AccountPatch) -> BackendResult<Account> {
        const OP: &str = "accounts.update";
        let id = id.to_string();
        let url = self.endpoint(OP, &["auth", "v1", "admin", "users", &id])?;
        let response = self.execute(OP, self.http.put(url).json(patch)).await?;
        Self::decode(OP, response).await
    }

    async fn delete_account(&self, id: Uuid) -> BackendResult<()> {
        const OP: &str = "accounts.delete";
        let id = id.to_string();
        let url = self.endpoint(OP, &["auth", "v1", "admin", "users", &id])?;
        self.execute(OP, self.http.delete(url)).await?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for BackendClient {
    async fn list_buckets(&self) -> BackendResult<Vec<Bucket>> {
        const OP: &str = "storage.buckets";
        let url = self.endpoint(OP, &["storage", "v1", "bucket"])?;
        let response = self.execute(OP, self.http.get(url)).await?;
        Self::decode(OP, response).await
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        limit: u32,
        offset: u32,
    ) -> BackendResult<Vec<StoredObject>> {
        const OP: &str = "storage.list";
        validate_bucket(bucket)?;
        let url = self.endpoint(OP, &["storage", "v1", "object", "list", bucket])?;
        let body = json!({
            "prefix": prefix,
            "limit": limit,
            "offset": offset,
            "sortBy": {"column": "name", "order": "asc"}
        });
        let response = self.execute(OP, self.http.post(url).json(&body)).await?;
        Self::decode(OP, response).await
    }

    async fn upload(&self, request: &UploadRequest) -> BackendResult<UploadReceipt> {
        const OP: &str = "storage.upload";
        validate_bucket(&request.bucket)?;
        validate_object_path(&request.path)?;
        let mut segments = vec!["storage", "v1", "object", request.bucket.as_str()];
        segments.extend(request.path.split('/'));
        let url = self.endpoint(OP, &segments)?;
        let builder = self
            .http
            .post(url)
            .header(CONTENT_TYPE, request.content_type.as_str())
            .header(HEADER_UPSERT, if request.upsert { "true" } else { "false" })
            .body(request.bytes.clone());
        let response = self.execute(OP, builder).await?;
        Self::decode(OP, response).await
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> BackendResult<Vec<StoredObject>> {
        const OP: &str = "storage.remove";
        validate_bucket(bucket)?;
        for path in paths {
            validate_object_path(path)?;
        }
        let url = self.endpoint(OP, &["storage", "v1", "object", bucket])?;
        let body = json!({ "prefixes": paths });
        let response = self.execute(OP, self.http.delete(url).json(&body)).await?;
        Self::decode(OP, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use httpmock::prelude::*;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tenantctl_config::Secret;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn client_for(server: &MockServer) -> Result<BackendClient, Box<dyn std::error::Error>> {
        client_at(&server.base_url())
    }

    fn client_at(base_url: &str) -> Result<BackendClient, Box<dyn std::error::Error>> {
        let settings = BackendSettings {
            api_url: base_url.parse()?,
            service_key: Secret::new("service-key"),
            anon_key: None,
            tenant_column: "tenant_id".into(),
            timeout: Duration::from_secs(5),
        };
        Ok(BackendClient::new(&settings, "trace-1")?)
    }

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[tokio::test]
    async fn select_sends_filters_and_auth_headers() -> TestResult {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v1/user_settings")
                .query_param("tenant_id", "eq.acme")
                .query_param("active", "is.false")
                .query_param("select", "*")
                .query_param("limit", "5")
                .header("apikey", "service-key")
                .header("authorization", "Bearer service-key")
                .header("x-request-id", "trace-1");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([{"id": 1, "tenant_id": "acme", "active": false}]));
        });

        let client = client_for(&server)?;
        let query = RecordQuery {
            limit: Some(5),
            ..RecordQuery::new(
                "user_settings",
                vec![Filter::eq("tenant_id", "acme")?, Filter::parse("active=is.false")?],
            )
        };
        let rows = client.select(&query).await?;
        mock.assert();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("active"), Some(&Value::Bool(false)));
        Ok(())
    }

    #[tokio::test]
    async fn count_reads_content_range_total() -> TestResult {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::HEAD)
                .path("/rest/v1/login_attempts")
                .query_param("tenant_id", "eq.acme")
                .header("prefer", "count=exact");
            then.status(200).header("content-range", "*/0");
        });

        let client = client_for(&server)?;
        let total = client
            .count("login_attempts", &[Filter::eq("tenant_id", "acme")?])
            .await?;
        mock.assert();
        assert_eq!(total, 0);
        Ok(())
    }

    #[tokio::test]
    async fn count_without_content_range_is_rejected() -> TestResult {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(httpmock::Method::HEAD).path("/rest/v1/login_attempts");
            then.status(200);
        });

        let client = client_for(&server)?;
        let err = client
            .count("login_attempts", &[Filter::eq("tenant_id", "acme")?])
            .await
            .expect_err("no total");
        assert!(matches!(
            err,
            BackendError::MissingCount {
                operation: "records.count"
            }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn malformed_body_keeps_json_error_as_source() -> TestResult {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/storage/v1/bucket");
            then.status(200)
                .header("content-type", "application/json")
                .body("[{\"id\":");
        });

        let client = client_for(&server)?;
        let err = client.list_buckets().await.expect_err("truncated body");
        let BackendError::Decode { operation, source } = &err else {
            panic!("expected decode error, got {err:?}");
        };
        assert_eq!(*operation, "storage.buckets");
        assert!(source.is_eof());
        assert!(std::error::Error::source(&err).is_some());
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_error_body_falls_back_to_status_message() -> TestResult {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await?;
            let mut request = [0_u8; 4096];
            let read = socket.read(&mut request).await?;
            assert!(read > 0);
            socket
                .write_all(b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 64\r\n\r\n{\"mess")
                .await?;
            socket.shutdown().await?;
            Ok::<_, std::io::Error>(())
        });

        let client = client_at(&format!("http://{address}"))?;
        let err = client.list_buckets().await.expect_err("server error");
        let remote = err.remote().expect("remote error");
        assert_eq!(remote.status, 500);
        assert_eq!(remote.message, "request failed with status 500");
        server.await??;
        Ok(())
    }

    #[tokio::test]
    async fn update_patches_and_returns_representation() -> TestResult {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(PATCH)
                .path("/rest/v1/profiles")
                .query_param("id", "eq.42")
                .header("prefer", "return=representation")
                .json_body(json!({"active": true}));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([{"id": 42, "active": true}]));
        });

        let client = client_for(&server)?;
        let rows = client
            .update(
                "profiles",
                &[Filter::eq("id", "42")?],
                &row(json!({"active": true})),
            )
            .await?;
        mock.assert();
        assert_eq!(rows.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn unfiltered_mutations_never_reach_the_server() -> TestResult {
        let server = MockServer::start_async().await;
        let client = client_for(&server)?;
        let err = client
            .delete("profiles", &[])
            .await
            .expect_err("unfiltered delete should be rejected");
        assert!(matches!(err, BackendError::Unfiltered { .. }));
        let err = client
            .update("profiles", &[], &row(json!({"active": false})))
            .await
            .expect_err("unfiltered update should be rejected");
        assert!(matches!(err, BackendError::Unfiltered { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn remote_errors_are_surfaced_verbatim() -> TestResult {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/rest/v1/user_settings");
            then.status(409)
                .header("content-type", "application/json")
                .json_body(json!({
                    "code": "23505",
                    "message": "duplicate key value violates unique constraint \"user_settings_user_id_key\"",
                    "details": "Key (user_id)=(7) already exists.",
                    "hint": null
                }));
        });

        let client = client_for(&server)?;
        let err = client
            .insert("user_settings", &[row(json!({"user_id": 7}))])
            .await
            .expect_err("conflict should fail");
        let remote = err.remote().cloned().ok_or("expected remote error")?;
        assert_eq!(remote.status, 409);
        assert_eq!(remote.code.as_deref(), Some("23505"));
        assert_eq!(
            remote.details.as_deref(),
            Some("Key (user_id)=(7) already exists.")
        );
        assert_eq!(err.class(), ErrorClass::ConstraintViolation);
        Ok(())
    }

    #[tokio::test]
    async fn invalid_table_names_are_rejected_locally() -> TestResult {
        let server = MockServer::start_async().await;
        let client = client_for(&server)?;
        let err = client
            .select(&RecordQuery::new("users;drop", Vec::new()))
            .await
            .expect_err("bad table should fail");
        assert!(matches!(err, BackendError::InvalidIdentifier { kind: "table", .. }));
        Ok(())
    }

    #[tokio::test]
    async fn list_accounts_reads_users_and_total() -> TestResult {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/auth/v1/admin/users")
                .query_param("page", "1")
                .query_param("per_page", "2");
            then.status(200)
                .header("content-type", "application/json")
                .header("x-total-count", "3")
                .json_body(json!({
                    "users": [
                        {"id": "8f0c1d9e-3c44-4a51-9a4e-0b6f6a4d2f10", "email": "a@acme.test"},
                        {"id": "1b7e2a55-9d0f-4c8e-8d1e-5a2f9c3b4d60", "email": "b@acme.test"}
                    ],
                    "aud": "authenticated"
                }));
        });

        let client = client_for(&server)?;
        let page = client.list_accounts(1, 2).await?;
        mock.assert();
        assert_eq!(page.accounts.len(), 2);
        assert_eq!(page.total, Some(3));
        assert!(page.has_more());
        Ok(())
    }

    #[tokio::test]
    async fn update_account_puts_patch() -> TestResult {
        let server = MockServer::start_async().await;
        let id = Uuid::parse_str("8f0c1d9e-3c44-4a51-9a4e-0b6f6a4d2f10")?;
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path(format!("/auth/v1/admin/users/{id}"))
                .json_body(json!({"email_confirm": true}));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "id": id,
                    "email": "a@acme.test",
                    "email_confirmed_at": "2026-01-05T10:00:00Z"
                }));
        });

        let client = client_for(&server)?;
        let account = client
            .update_account(
                id,
                &AccountPatch {
                    email_confirm: Some(true),
                    ..AccountPatch::default()
                },
            )
            .await?;
        mock.assert();
        assert!(account.email_confirmed_at.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn delete_account_surfaces_not_found() -> TestResult {
        let server = MockServer::start_async().await;
        let id = Uuid::new_v4();
        server.mock(|when, then| {
            when.method(DELETE).path(format!("/auth/v1/admin/users/{id}"));
            then.status(404)
                .header("content-type", "application/json")
                .json_body(json!({"code": 404, "error_code": "user_not_found", "msg": "User not found"}));
        });

        let client = client_for(&server)?;
        let err = client
            .delete_account(id)
            .await
            .expect_err("missing account should fail");
        assert_eq!(err.class(), ErrorClass::NotFound);
        Ok(())
    }

    #[tokio::test]
    async fn upload_posts_bytes_with_upsert_flag() -> TestResult {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/storage/v1/object/company-assets/acme/logo.png")
                .header("content-type", "image/png")
                .header("x-upsert", "true")
                .body("png-bytes");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"Key": "company-assets/acme/logo.png"}));
        });

        let client = client_for(&server)?;
        let receipt = client
            .upload(&UploadRequest {
                bucket: "company-assets".into(),
                path: "acme/logo.png".into(),
                bytes: b"png-bytes".to_vec(),
                content_type: "image/png".into(),
                upsert: true,
            })
            .await?;
        mock.assert();
        assert_eq!(receipt.key, "company-assets/acme/logo.png");
        Ok(())
    }

    #[tokio::test]
    async fn remove_and_list_objects() -> TestResult {
        let server = MockServer::start_async().await;
        let remove = server.mock(|when, then| {
            when.method(DELETE)
                .path("/storage/v1/object/company-assets")
                .json_body(json!({"prefixes": ["acme/logo.png"]}));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([{"name": "acme/logo.png", "id": "1"}]));
        });
        let list = server.mock(|when, then| {
            when.method(POST)
                .path("/storage/v1/object/list/company-assets")
                .json_body(json!({
                    "prefix": "acme",
                    "limit": 100,
                    "offset": 200,
                    "sortBy": {"column": "name", "order": "asc"}
                }));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([]));
        });

        let client = client_for(&server)?;
        let removed = client
            .remove("company-assets", &["acme/logo.png".to_string()])
            .await?;
        assert_eq!(removed.len(), 1);
        let remaining = client.list_objects("company-assets", "acme", 100, 200).await?;
        assert!(remaining.is_empty());
        remove.assert();
        list.assert();
        Ok(())
    }
}
