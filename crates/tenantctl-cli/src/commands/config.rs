use tenantctl_config::BackendSettings;
use tenantctl_telemetry::build_sha;

use crate::client::{AppContext, CliResult};
use crate::output::render_settings;

/// Print the resolved settings; keys are redacted by `describe`.
pub(crate) fn handle_config_show(ctx: &AppContext, settings: &BackendSettings) -> CliResult<()> {
    render_settings(&settings_entries(settings), &ctx.scope, ctx.output)
}

fn settings_entries(settings: &BackendSettings) -> Vec<(&'static str, String)> {
    let mut entries = settings.describe();
    entries.push(("build", build_sha().to_string()));
    entries
}
