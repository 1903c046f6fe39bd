use tenantctl_runner::{ActionName, ActionParams};

use crate::cli::{RecordsFilterArgs, RecordsInsertArgs, RecordsSelectArgs, RecordsUpdateArgs};
use crate::client::{AppContext, CliResult};
use crate::commands::execute_named;

pub(crate) async fn handle_records_select(
    ctx: &AppContext,
    args: RecordsSelectArgs,
) -> CliResult<()> {
    let params = ActionParams::new()
        .with_opt("table", Some(args.table))?
        .with_all("filter", args.filters)?
        .with_opt("columns", args.columns)?
        .with_opt("order", args.order)?
        .with_opt("limit", args.limit.map(|limit| limit.to_string()))?;
    execute_named(ctx, ActionName::RecordsSelect, &params).await
}

pub(crate) async fn handle_records_count(ctx: &AppContext, args: RecordsFilterArgs) -> CliResult<()> {
    execute_named(ctx, ActionName::RecordsCount, &filter_params(args)?).await
}

pub(crate) async fn handle_records_insert(
    ctx: &AppContext,
    args: RecordsInsertArgs,
) -> CliResult<()> {
    let params = ActionParams::new()
        .with_opt("table", Some(args.table))?
        .with_all("set", args.sets)?;
    execute_named(ctx, ActionName::RecordsInsert, &params).await
}

pub(crate) async fn handle_records_update(
    ctx: &AppContext,
    args: RecordsUpdateArgs,
) -> CliResult<()> {
    let params = ActionParams::new()
        .with_opt("table", Some(args.table))?
        .with_all("filter", args.filters)?
        .with_all("set", args.sets)?;
    execute_named(ctx, ActionName::RecordsUpdate, &params).await
}

pub(crate) async fn handle_records_delete(
    ctx: &AppContext,
    args: RecordsFilterArgs,
) -> CliResult<()> {
    execute_named(ctx, ActionName::RecordsDelete, &filter_params(args)?).await
}

fn filter_params(args: RecordsFilterArgs) -> CliResult<ActionParams> {
    Ok(ActionParams::new()
        .with_opt("table", Some(args.table))?
        .with_all("filter", args.filters)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{context_with, tenant_context};
    use anyhow::Result;
    use httpmock::prelude::*;
    use serde_json::json;
    use tenantctl_runner::TenantScope;

    fn update_args() -> RecordsUpdateArgs {
        RecordsUpdateArgs {
            table: "user_settings".to_string(),
            filters: vec!["email=eq.owner@acme.test".to_string()],
            sets: vec!["active=true".to_string()],
        }
    }

    #[tokio::test]
    async fn update_is_scoped_and_verified() -> Result<()> {
        let server = MockServer::start_async().await;
        let patch = server.mock(|when, then| {
            when.method(PATCH)
                .path("/rest/v1/user_settings")
                .query_param("email", "eq.owner@acme.test")
                .query_param("tenant_id", "eq.acme")
                .header("prefer", "return=representation")
                .json_body(json!({"active": true}));
            then.status(200).json_body(json!([
                {"id": 1, "tenant_id": "acme", "email": "owner@acme.test", "active": true}
            ]));
        });
        let reread = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v1/user_settings")
                .query_param("id", "in.(1)");
            then.status(200).json_body(json!([
                {"id": 1, "tenant_id": "acme", "email": "owner@acme.test", "active": true}
            ]));
        });

        let ctx = tenant_context(&server)?;
        handle_records_update(&ctx, update_args())
            .await
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;

        patch.assert();
        reread.assert();
        Ok(())
    }

    #[tokio::test]
    async fn stale_update_reports_verification_failure() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(PATCH).path("/rest/v1/user_settings");
            then.status(200).json_body(json!([
                {"id": 1, "tenant_id": "acme", "active": true}
            ]));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v1/user_settings")
                .query_param("id", "in.(1)");
            then.status(200).json_body(json!([
                {"id": 1, "tenant_id": "acme", "active": false}
            ]));
        });

        let ctx = tenant_context(&server)?;
        let err = handle_records_update(&ctx, update_args())
            .await
            .expect_err("stale read should fail verification");
        assert_eq!(err.exit_code(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn update_matching_no_rows_fails_verification() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(PATCH).path("/rest/v1/user_settings");
            then.status(200).json_body(json!([]));
        });

        let ctx = tenant_context(&server)?;
        let err = handle_records_update(&ctx, update_args())
            .await
            .expect_err("zero updated rows should not pass");
        assert_eq!(err.exit_code(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn permission_errors_are_remote_failures() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(DELETE).path("/rest/v1/sessions");
            then.status(403).json_body(json!({
                "code": "42501",
                "message": "permission denied for table sessions",
                "details": null,
                "hint": null
            }));
        });

        let ctx = tenant_context(&server)?;
        let err = handle_records_delete(
            &ctx,
            RecordsFilterArgs {
                table: "sessions".to_string(),
                filters: vec!["expired=is.true".to_string()],
            },
        )
        .await
        .expect_err("denied delete should fail");

        mock.assert();
        assert_eq!(err.exit_code(), 3);
        assert!(err.display_message().contains("permission denied"));
        Ok(())
    }

    #[tokio::test]
    async fn delete_counts_remaining_rows() -> Result<()> {
        let server = MockServer::start_async().await;
        let delete = server.mock(|when, then| {
            when.method(DELETE)
                .path("/rest/v1/sessions")
                .query_param("expired", "is.true")
                .query_param("tenant_id", "eq.acme");
            then.status(200)
                .json_body(json!([{"id": 7, "tenant_id": "acme", "expired": true}]));
        });
        let count = server.mock(|when, then| {
            when.method(httpmock::Method::HEAD)
                .path("/rest/v1/sessions")
                .query_param("expired", "is.true")
                .header("prefer", "count=exact");
            then.status(200).header("content-range", "*/0");
        });

        let ctx = tenant_context(&server)?;
        handle_records_delete(
            &ctx,
            RecordsFilterArgs {
                table: "sessions".to_string(),
                filters: vec!["expired=is.true".to_string()],
            },
        )
        .await
        .map_err(|err| anyhow::anyhow!(err.display_message()))?;

        delete.assert();
        count.assert();
        Ok(())
    }

    #[tokio::test]
    async fn delete_without_tenant_is_rejected_before_any_request() -> Result<()> {
        let server = MockServer::start_async().await;
        let ctx = context_with(&server, TenantScope::default())?;
        let err = handle_records_delete(
            &ctx,
            RecordsFilterArgs {
                table: "sessions".to_string(),
                filters: vec!["expired=is.true".to_string()],
            },
        )
        .await
        .expect_err("unscoped delete needs --unscoped");

        assert_eq!(err.exit_code(), 2);
        assert!(err.display_message().contains("--unscoped"));
        Ok(())
    }

    #[tokio::test]
    async fn count_reads_content_range() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::HEAD)
                .path("/rest/v1/projects")
                .query_param("tenant_id", "eq.acme");
            then.status(200).header("content-range", "0-24/42");
        });

        let ctx = tenant_context(&server)?;
        handle_records_count(
            &ctx,
            RecordsFilterArgs {
                table: "projects".to_string(),
                filters: Vec::new(),
            },
        )
        .await
        .map_err(|err| anyhow::anyhow!(err.display_message()))?;

        mock.assert();
        Ok(())
    }
}
