use std::io::{self, IsTerminal};

use anyhow::anyhow;
use tenantctl_runner::{ActionName, ActionParams};

use crate::cli::{
    AccountsCreateArgs, AccountsDeleteArgs, AccountsFindArgs, AccountsListArgs, AccountsUpdateArgs,
};
use crate::client::{AppContext, CliError, CliResult, random_string};
use crate::commands::execute_named;

const GENERATED_PASSWORD_LEN: usize = 24;

pub(crate) async fn handle_accounts_list(ctx: &AppContext, args: AccountsListArgs) -> CliResult<()> {
    let params = ActionParams::new()
        .with_opt("page", Some(args.page.to_string()))?
        .with_opt("per_page", Some(args.per_page.to_string()))?;
    execute_named(ctx, ActionName::AccountsList, &params).await
}

pub(crate) async fn handle_accounts_find(ctx: &AppContext, args: AccountsFindArgs) -> CliResult<()> {
    let params = ActionParams::new().with_opt("email", Some(args.email))?;
    execute_named(ctx, ActionName::AccountsFind, &params).await
}

pub(crate) async fn handle_accounts_create(
    ctx: &AppContext,
    args: AccountsCreateArgs,
) -> CliResult<()> {
    let supplied = resolve_password(args.password.as_deref(), args.prompt_password)?;
    let generated = supplied
        .is_none()
        .then(|| random_string(GENERATED_PASSWORD_LEN));
    let password = supplied.or_else(|| generated.clone());
    let params = ActionParams::new()
        .with_opt("email", Some(args.email))?
        .with_opt("password", password)?
        .with_opt("confirm", Some(if args.no_confirm { "false" } else { "true" }))?
        .with_opt("user_metadata", args.user_metadata)?
        .with_opt("app_metadata", args.app_metadata)?;
    execute_named(ctx, ActionName::AccountsCreate, &params).await?;
    if let Some(generated) = generated {
        eprintln!("Generated password (shown once): {generated}");
    }
    Ok(())
}

pub(crate) async fn handle_accounts_update(
    ctx: &AppContext,
    args: AccountsUpdateArgs,
) -> CliResult<()> {
    let password = resolve_password(args.password.as_deref(), args.prompt_password)?;
    let ban = if args.unban {
        Some("none".to_string())
    } else {
        args.ban
    };
    let params = ActionParams::new()
        .with_opt("id", Some(args.id))?
        .with_opt("email", args.email)?
        .with_opt("password", password)?
        .with_opt("confirm", args.confirm.then_some("true"))?
        .with_opt("ban", ban)?
        .with_opt("user_metadata", args.user_metadata)?
        .with_opt("app_metadata", args.app_metadata)?;
    execute_named(ctx, ActionName::AccountsUpdate, &params).await
}

pub(crate) async fn handle_accounts_delete(
    ctx: &AppContext,
    args: AccountsDeleteArgs,
) -> CliResult<()> {
    let params = ActionParams::new().with_opt("id", Some(args.id))?;
    execute_named(ctx, ActionName::AccountsDelete, &params).await
}

/// Password from the flag, or from the terminal when `prompt` is set.
fn resolve_password(flag: Option<&str>, prompt: bool) -> CliResult<Option<String>> {
    if let Some(value) = flag {
        return non_empty_password(value.to_string()).map(Some);
    }
    if !prompt {
        return Ok(None);
    }

    if io::stdin().is_terminal() {
        let pass = rpassword::prompt_password("Account password: ").map_err(|err| {
            CliError::failure(anyhow!("failed to read password from stdin: {err}"))
        })?;
        non_empty_password(pass).map(Some)
    } else {
        Err(CliError::validation(
            "password prompt needs a terminal; supply --password when running non-interactively",
        ))
    }
}

/// Passwords are sent exactly as typed; only an all-blank value is refused.
fn non_empty_password(value: String) -> CliResult<String> {
    if value.trim().is_empty() {
        return Err(CliError::validation("password cannot be empty"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::tenant_context;
    use anyhow::Result;
    use httpmock::prelude::*;
    use serde_json::json;
    use uuid::Uuid;

    fn account_json(id: Uuid, email: &str) -> serde_json::Value {
        json!({
            "id": id,
            "email": email,
            "email_confirmed_at": "2026-01-05T10:00:00Z",
            "created_at": "2026-01-05T10:00:00Z",
            "user_metadata": {"plan": "team"},
            "app_metadata": {"tenant": "acme"}
        })
    }

    #[test]
    fn resolve_password_prefers_flag_value() -> CliResult<()> {
        assert_eq!(
            resolve_password(Some("hunter-two"), false)?,
            Some("hunter-two".to_string())
        );
        assert_eq!(resolve_password(None, false)?, None);
        let err = resolve_password(Some("   "), false).expect_err("blank password");
        assert_eq!(err.exit_code(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn create_posts_account_and_verifies() -> Result<()> {
        let server = MockServer::start_async().await;
        let id = Uuid::new_v4();
        let create = server.mock(|when, then| {
            when.method(POST).path("/auth/v1/admin/users");
            then.status(200)
                .json_body(account_json(id, "new.owner@acme.test"));
        });
        let reread = server.mock(|when, then| {
            when.method(GET).path(format!("/auth/v1/admin/users/{id}"));
            then.status(200)
                .json_body(account_json(id, "new.owner@acme.test"));
        });

        let ctx = tenant_context(&server)?;
        handle_accounts_create(
            &ctx,
            AccountsCreateArgs {
                email: "new.owner@acme.test".to_string(),
                password: Some("correct-horse-battery".to_string()),
                ..AccountsCreateArgs::default()
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;

        create.assert();
        reread.assert();
        Ok(())
    }

    #[test]
    fn surrounding_spaces_are_part_of_the_password() -> CliResult<()> {
        assert_eq!(
            resolve_password(Some(" two words "), false)?,
            Some(" two words ".to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn invalid_email_is_rejected_before_any_request() -> Result<()> {
        let server = MockServer::start_async().await;
        let create = server.mock(|when, then| {
            when.method(POST).path("/auth/v1/admin/users");
            then.status(200).json_body(json!({}));
        });

        let ctx = tenant_context(&server)?;
        let err = handle_accounts_create(
            &ctx,
            AccountsCreateArgs {
                email: "not-an-email".to_string(),
                ..AccountsCreateArgs::default()
            },
        )
        .await
        .expect_err("invalid email");
        assert_eq!(err.exit_code(), 2);
        create.assert_calls(0);
        Ok(())
    }

    #[tokio::test]
    async fn generated_password_is_sent_with_the_account() -> Result<()> {
        let server = MockServer::start_async().await;
        let id = Uuid::new_v4();
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/auth/v1/admin/users")
                .body_includes("new.owner@acme.test")
                .body_includes(r#""password":""#);
            then.status(200)
                .json_body(account_json(id, "new.owner@acme.test"));
        });
        server.mock(|when, then| {
            when.method(GET).path(format!("/auth/v1/admin/users/{id}"));
            then.status(200)
                .json_body(account_json(id, "new.owner@acme.test"));
        });

        let ctx = tenant_context(&server)?;
        handle_accounts_create(
            &ctx,
            AccountsCreateArgs {
                email: "new.owner@acme.test".to_string(),
                ..AccountsCreateArgs::default()
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;
        create.assert();
        Ok(())
    }

    #[tokio::test]
    async fn find_matches_email_case_insensitively() -> Result<()> {
        let server = MockServer::start_async().await;
        let id = Uuid::new_v4();
        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/auth/v1/admin/users")
                .query_param("page", "1");
            then.status(200)
                .header("x-total-count", "2")
                .json_body(json!({"users": [account_json(id, "Owner@Acme.test")]}));
        });

        let ctx = tenant_context(&server)?;
        handle_accounts_find(
            &ctx,
            AccountsFindArgs {
                email: "owner@acme.test".to_string(),
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;

        first.assert();
        Ok(())
    }

    #[tokio::test]
    async fn missing_account_is_a_failure() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/auth/v1/admin/users");
            then.status(200).json_body(json!({"users": []}));
        });

        let ctx = tenant_context(&server)?;
        let err = handle_accounts_find(
            &ctx,
            AccountsFindArgs {
                email: "ghost@acme.test".to_string(),
            },
        )
        .await
        .expect_err("no match");
        assert_eq!(err.exit_code(), 3);
        assert!(err.display_message().contains("ghost@acme.test"));
        Ok(())
    }

    #[tokio::test]
    async fn delete_verifies_account_is_gone() -> Result<()> {
        let server = MockServer::start_async().await;
        let id = Uuid::new_v4();
        let delete = server.mock(|when, then| {
            when.method(DELETE).path(format!("/auth/v1/admin/users/{id}"));
            then.status(200).json_body(json!({}));
        });
        let reread = server.mock(|when, then| {
            when.method(GET).path(format!("/auth/v1/admin/users/{id}"));
            then.status(404)
                .json_body(json!({"code": 404, "msg": "User not found"}));
        });

        let ctx = tenant_context(&server)?;
        handle_accounts_delete(&ctx, AccountsDeleteArgs { id: id.to_string() })
            .await
            .map_err(|err| anyhow!(err.display_message()))?;

        delete.assert();
        reread.assert();
        Ok(())
    }

    #[tokio::test]
    async fn update_rejects_malformed_ids() -> Result<()> {
        let server = MockServer::start_async().await;
        let ctx = tenant_context(&server)?;
        let err = handle_accounts_update(
            &ctx,
            AccountsUpdateArgs {
                id: "not-a-uuid".to_string(),
                confirm: true,
                ..AccountsUpdateArgs::default()
            },
        )
        .await
        .expect_err("bad id");
        assert_eq!(err.exit_code(), 2);
        Ok(())
    }
}
