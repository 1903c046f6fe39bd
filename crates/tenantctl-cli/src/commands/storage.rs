use std::path::Path;

use tenantctl_runner::{ActionName, ActionParams};

use crate::cli::{StorageListArgs, StorageRemoveArgs, StorageUploadArgs};
use crate::client::{AppContext, CliError, CliResult};
use crate::commands::execute_named;

pub(crate) async fn handle_storage_buckets(ctx: &AppContext) -> CliResult<()> {
    execute_named(ctx, ActionName::StorageBuckets, &ActionParams::new()).await
}

pub(crate) async fn handle_storage_list(ctx: &AppContext, args: StorageListArgs) -> CliResult<()> {
    let params = ActionParams::new()
        .with_opt("bucket", Some(args.bucket))?
        .with_opt("prefix", args.prefix)?
        .with_opt("limit", args.limit.map(|limit| limit.to_string()))?;
    execute_named(ctx, ActionName::StorageList, &params).await
}

pub(crate) async fn handle_storage_upload(
    ctx: &AppContext,
    args: StorageUploadArgs,
) -> CliResult<()> {
    let params = ActionParams::new()
        .with_opt("bucket", Some(args.bucket))?
        .with_opt("path", Some(args.path))?
        .with_opt("file", Some(path_to_string(&args.file)?))?
        .with_opt("content_type", args.content_type)?
        .with_opt("upsert", Some(if args.upsert { "true" } else { "false" }))?;
    execute_named(ctx, ActionName::StorageUpload, &params).await
}

pub(crate) async fn handle_storage_remove(
    ctx: &AppContext,
    args: StorageRemoveArgs,
) -> CliResult<()> {
    let params = ActionParams::new()
        .with_opt("bucket", Some(args.bucket))?
        .with_all("path", args.paths)?;
    execute_named(ctx, ActionName::StorageRemove, &params).await
}

fn path_to_string(path: &Path) -> CliResult<String> {
    path.to_str().map(str::to_string).ok_or_else(|| {
        CliError::validation(format!("path '{}' is not valid UTF-8", path.display()))
    })
}
