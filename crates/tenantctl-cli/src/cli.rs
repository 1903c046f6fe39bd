//! Argument parsing and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tenantctl_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, init_logging};
use uuid::Uuid;

use crate::client::{AppContext, CliResult, TelemetryEmitter, parse_url, resolve_settings};
use crate::commands::accounts::{
    handle_accounts_create, handle_accounts_delete, handle_accounts_find, handle_accounts_list,
    handle_accounts_update,
};
use crate::commands::config::handle_config_show;
use crate::commands::records::{
    handle_records_count, handle_records_delete, handle_records_insert, handle_records_select,
    handle_records_update,
};
use crate::commands::run::handle_run;
use crate::commands::storage::{
    handle_storage_buckets, handle_storage_list, handle_storage_remove, handle_storage_upload,
};

const DEFAULT_LOG_FORMAT: &str = "text";

/// Parses CLI arguments, executes the requested command, and handles
/// user-facing telemetry emission. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let logging = LoggingConfig {
        level: &cli.log_level,
        format: LogFormat::parse(&cli.log_format),
        build_sha: option_env!("TENANTCTL_BUILD_SHA").unwrap_or("dev"),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: {err}");
    }

    let command_name = command_label(&cli.command);
    let trace_id = Uuid::new_v4().to_string();
    let telemetry = TelemetryEmitter::from_env();
    tracing::debug!(command = command_name, trace_id = %trace_id, "starting command");

    let result = dispatch(cli, &trace_id).await;

    let (exit_code, message, outcome) = match result {
        Ok(()) => (0, None, "success"),
        Err(err) => {
            let exit_code = err.exit_code();
            let message = err.display_message();
            eprintln!("error: {message}");
            (exit_code, Some(message), err.outcome())
        }
    };

    if let Some(emitter) = &telemetry {
        emitter
            .emit(
                &trace_id,
                command_name,
                outcome,
                exit_code,
                message.as_deref(),
            )
            .await;
    }

    exit_code
}

async fn dispatch(cli: Cli, trace_id: &str) -> CliResult<()> {
    let settings = resolve_settings(&cli)?;
    let ctx = AppContext::from_cli(&cli, &settings, trace_id)?;

    match cli.command {
        Command::Records(records) => match records {
            RecordsCommand::Select(args) => handle_records_select(&ctx, args).await,
            RecordsCommand::Count(args) => handle_records_count(&ctx, args).await,
            RecordsCommand::Insert(args) => handle_records_insert(&ctx, args).await,
            RecordsCommand::Update(args) => handle_records_update(&ctx, args).await,
            RecordsCommand::Delete(args) => handle_records_delete(&ctx, args).await,
        },
        Command::Accounts(accounts) => match accounts {
            AccountsCommand::List(args) => handle_accounts_list(&ctx, args).await,
            AccountsCommand::Find(args) => handle_accounts_find(&ctx, args).await,
            AccountsCommand::Create(args) => handle_accounts_create(&ctx, args).await,
            AccountsCommand::Update(args) => handle_accounts_update(&ctx, args).await,
            AccountsCommand::Delete(args) => handle_accounts_delete(&ctx, args).await,
        },
        Command::Storage(storage) => match storage {
            StorageCommand::Buckets => handle_storage_buckets(&ctx).await,
            StorageCommand::List(args) => handle_storage_list(&ctx, args).await,
            StorageCommand::Upload(args) => handle_storage_upload(&ctx, args).await,
            StorageCommand::Remove(args) => handle_storage_remove(&ctx, args).await,
        },
        Command::Run(args) => handle_run(&ctx, args).await,
        Command::Config(ConfigCommand::Show) => handle_config_show(&ctx, &settings),
    }
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Records(records) => match records {
            RecordsCommand::Select(_) => "records.select",
            RecordsCommand::Count(_) => "records.count",
            RecordsCommand::Insert(_) => "records.insert",
            RecordsCommand::Update(_) => "records.update",
            RecordsCommand::Delete(_) => "records.delete",
        },
        Command::Accounts(accounts) => match accounts {
            AccountsCommand::List(_) => "accounts.list",
            AccountsCommand::Find(_) => "accounts.find",
            AccountsCommand::Create(_) => "accounts.create",
            AccountsCommand::Update(_) => "accounts.update",
            AccountsCommand::Delete(_) => "accounts.delete",
        },
        Command::Storage(storage) => match storage {
            StorageCommand::Buckets => "storage.buckets",
            StorageCommand::List(_) => "storage.list",
            StorageCommand::Upload(_) => "storage.upload",
            StorageCommand::Remove(_) => "storage.remove",
        },
        Command::Run(_) => "run",
        Command::Config(ConfigCommand::Show) => "config.show",
    }
}

#[derive(Parser)]
#[command(
    name = "tenantctl",
    about = "Tenant-scoped administrative actions against a hosted backend",
    version
)]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        value_parser = parse_url,
        help = "Service URL (falls back to TENANTCTL_API_URL or SUPABASE_URL)"
    )]
    pub(crate) api_url: Option<String>,
    #[arg(
        long,
        global = true,
        help = "Privileged key (falls back to TENANTCTL_SERVICE_KEY or SUPABASE_SERVICE_ROLE_KEY)"
    )]
    pub(crate) service_key: Option<String>,
    #[arg(long, global = true)]
    pub(crate) anon_key: Option<String>,
    #[arg(
        long,
        global = true,
        env = "TENANTCTL_ENV_FILE",
        help = "Env file with settings (./.env is read when present)"
    )]
    pub(crate) env_file: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        env = "TENANTCTL_TENANT",
        help = "Confine record actions to this tenant"
    )]
    pub(crate) tenant: Option<String>,
    #[arg(long, global = true)]
    pub(crate) tenant_column: Option<String>,
    #[arg(long, global = true, help = "Allow record mutations across every tenant")]
    pub(crate) unscoped: bool,
    #[arg(long, global = true, help = "Request timeout in seconds")]
    pub(crate) timeout: Option<u64>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[arg(long, global = true, env = "TENANTCTL_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub(crate) log_level: String,
    #[arg(long, global = true, env = "TENANTCTL_LOG_FORMAT", default_value = DEFAULT_LOG_FORMAT)]
    pub(crate) log_format: String,
    #[arg(long, global = true, help = "Skip the follow-up read after mutations")]
    pub(crate) no_verify: bool,
    #[arg(
        long,
        global = true,
        env = "TENANTCTL_VERIFY_DELAY_MS",
        default_value_t = 0,
        help = "Milliseconds to wait before the verification read"
    )]
    pub(crate) verify_delay_ms: u64,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Read and modify table rows.
    #[command(subcommand)]
    Records(RecordsCommand),
    /// Manage authentication accounts.
    #[command(subcommand)]
    Accounts(AccountsCommand),
    /// Inspect and modify stored objects.
    #[command(subcommand)]
    Storage(StorageCommand),
    /// Run an action by name with key=value parameters.
    Run(RunArgs),
    /// Inspect resolved configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
pub(crate) enum RecordsCommand {
    Select(RecordsSelectArgs),
    Count(RecordsFilterArgs),
    Insert(RecordsInsertArgs),
    Update(RecordsUpdateArgs),
    Delete(RecordsFilterArgs),
}

#[derive(Subcommand)]
pub(crate) enum AccountsCommand {
    List(AccountsListArgs),
    Find(AccountsFindArgs),
    Create(AccountsCreateArgs),
    Update(AccountsUpdateArgs),
    Delete(AccountsDeleteArgs),
}

#[derive(Subcommand)]
pub(crate) enum StorageCommand {
    Buckets,
    List(StorageListArgs),
    Upload(StorageUploadArgs),
    Remove(StorageRemoveArgs),
}

#[derive(Subcommand)]
pub(crate) enum ConfigCommand {
    /// Print settings with secrets redacted.
    Show,
}

#[derive(Args, Default)]
pub(crate) struct RecordsSelectArgs {
    pub(crate) table: String,
    #[arg(long = "filter", short = 'f', help = "column=op.value, repeatable")]
    pub(crate) filters: Vec<String>,
    #[arg(long)]
    pub(crate) columns: Option<String>,
    #[arg(long, help = "Ordering such as created_at.desc")]
    pub(crate) order: Option<String>,
    #[arg(long)]
    pub(crate) limit: Option<u32>,
}

#[derive(Args, Default)]
pub(crate) struct RecordsFilterArgs {
    pub(crate) table: String,
    #[arg(long = "filter", short = 'f', help = "column=op.value, repeatable")]
    pub(crate) filters: Vec<String>,
}

#[derive(Args, Default)]
pub(crate) struct RecordsInsertArgs {
    pub(crate) table: String,
    #[arg(long = "set", short = 's', required = true, help = "column=value or column:=json")]
    pub(crate) sets: Vec<String>,
}

#[derive(Args, Default)]
pub(crate) struct RecordsUpdateArgs {
    pub(crate) table: String,
    #[arg(long = "filter", short = 'f', required = true)]
    pub(crate) filters: Vec<String>,
    #[arg(long = "set", short = 's', required = true, help = "column=value or column:=json")]
    pub(crate) sets: Vec<String>,
}

#[derive(Args)]
pub(crate) struct AccountsListArgs {
    #[arg(long, default_value_t = 1)]
    pub(crate) page: u32,
    #[arg(long, default_value_t = 50)]
    pub(crate) per_page: u32,
}

#[derive(Args)]
pub(crate) struct AccountsFindArgs {
    #[arg(long)]
    pub(crate) email: String,
}

#[derive(Args, Default)]
pub(crate) struct AccountsCreateArgs {
    #[arg(long)]
    pub(crate) email: String,
    #[arg(long, conflicts_with = "prompt_password")]
    pub(crate) password: Option<String>,
    #[arg(long, help = "Read the password from the terminal")]
    pub(crate) prompt_password: bool,
    #[arg(long, help = "Leave the email unconfirmed")]
    pub(crate) no_confirm: bool,
    #[arg(long, help = "JSON object")]
    pub(crate) user_metadata: Option<String>,
    #[arg(long, help = "JSON object")]
    pub(crate) app_metadata: Option<String>,
}

#[derive(Args, Default)]
pub(crate) struct AccountsUpdateArgs {
    pub(crate) id: String,
    #[arg(long)]
    pub(crate) email: Option<String>,
    #[arg(long, conflicts_with = "prompt_password")]
    pub(crate) password: Option<String>,
    #[arg(long)]
    pub(crate) prompt_password: bool,
    #[arg(long, help = "Mark the email as confirmed")]
    pub(crate) confirm: bool,
    #[arg(long, conflicts_with = "unban", help = "Ban duration such as 24h")]
    pub(crate) ban: Option<String>,
    #[arg(long)]
    pub(crate) unban: bool,
    #[arg(long, help = "JSON object merged into user metadata")]
    pub(crate) user_metadata: Option<String>,
    #[arg(long, help = "JSON object merged into app metadata")]
    pub(crate) app_metadata: Option<String>,
}

#[derive(Args)]
pub(crate) struct AccountsDeleteArgs {
    pub(crate) id: String,
}

#[derive(Args, Default)]
pub(crate) struct StorageListArgs {
    pub(crate) bucket: String,
    #[arg(long)]
    pub(crate) prefix: Option<String>,
    #[arg(long)]
    pub(crate) limit: Option<u32>,
}

#[derive(Args)]
pub(crate) struct StorageUploadArgs {
    pub(crate) bucket: String,
    pub(crate) path: String,
    #[arg(long)]
    pub(crate) file: PathBuf,
    #[arg(long)]
    pub(crate) content_type: Option<String>,
    #[arg(long, help = "Overwrite an existing object")]
    pub(crate) upsert: bool,
}

#[derive(Args)]
pub(crate) struct StorageRemoveArgs {
    pub(crate) bucket: String,
    #[arg(required = true)]
    pub(crate) paths: Vec<String>,
}

#[derive(Args)]
pub(crate) struct RunArgs {
    /// Dotted action name, e.g. records.update.
    pub(crate) action: String,
    /// Parameters as key=value; filter, set and path may repeat.
    #[arg(allow_hyphen_values = true)]
    pub(crate) params: Vec<String>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[cfg(test)]
impl Cli {
    pub(crate) fn for_tests(args: &[&str]) -> Self {
        Self::try_parse_from(args).unwrap_or_else(|err| panic!("arguments should parse: {err}"))
    }
}
