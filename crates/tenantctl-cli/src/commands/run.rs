use tenantctl_runner::{Action, ActionParams};

use crate::cli::RunArgs;
use crate::client::{AppContext, CliResult};
use crate::commands::execute_action;

/// Run any action by its dotted name with `key=value` parameters.
pub(crate) async fn handle_run(ctx: &AppContext, args: RunArgs) -> CliResult<()> {
    let params = ActionParams::parse(&args.params)?;
    let action = Action::from_params(&args.action, &params, &ctx.scope)?;
    execute_action(ctx, action).await
}
