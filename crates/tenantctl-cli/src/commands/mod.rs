//! Command handlers grouped by concern.

pub(crate) mod accounts;
pub(crate) mod config;
pub(crate) mod records;
pub(crate) mod run;
pub(crate) mod storage;

use tenantctl_runner::{Action, ActionName, ActionParams, Outcome};

use crate::client::{AppContext, CliError, CliResult, remote_failure};
use crate::output::render_report;

/// Build `name` from `params` under the context's tenant scope and run it.
pub(crate) async fn execute_named(
    ctx: &AppContext,
    name: ActionName,
    params: &ActionParams,
) -> CliResult<()> {
    let action = Action::build(name, params, &ctx.scope)?;
    execute_action(ctx, action).await
}

/// Run a validated action, render its report, and map the outcome onto
/// the CLI error kinds.
pub(crate) async fn execute_action(ctx: &AppContext, action: Action) -> CliResult<()> {
    let report = ctx.runner.execute(action).await;
    render_report(&report, ctx.output)?;
    match report.outcome() {
        Outcome::Success => Ok(()),
        Outcome::Failed => {
            let message = report
                .failure
                .as_ref()
                .map_or("unknown failure", |failure| failure.message.as_str());
            Err(remote_failure(report.action.as_str(), message))
        }
        Outcome::VerificationFailed => {
            let check = report
                .verification
                .as_ref()
                .map_or("follow-up read", |verification| verification.check.as_str());
            Err(CliError::Verification(format!(
                "{} was accepted but did not verify: {check}",
                report.action
            )))
        }
    }
}
