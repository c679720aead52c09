use remconn::{Error as CoreError, LaunchPlanInput, resolve_launch_plan};

use super::emit_success;
use crate::cli::PlanArgs;
use crate::context::CommandContext;
use crate::error::Result;
use crate::output::PlanData;

/// Shows what `launch` would run, without running anything.
pub fn execute(ctx: &CommandContext, args: PlanArgs) -> Result<()> {
	let (registry, diagnostics) = ctx.load_for_read();
	let PlanArgs { target, os } = args;

	let Some(connection) = registry.get(&target.category, &target.name) else {
		return Err(CoreError::ConnectionNotFound {
			category: target.category,
			name: target.name,
		}
		.into());
	};

	let os = os.map(Into::into).unwrap_or(ctx.settings.os);
	let plan = resolve_launch_plan(LaunchPlanInput {
		os,
		session_name: &target.name,
		command: &connection.command,
	});
	let toolchain = &ctx.settings.toolchain;
	let probe = plan.session().map(|session| toolchain.session_probe(session).invocation);
	let steps = plan.steps(toolchain);

	emit_success(
		ctx,
		"plan",
		PlanData {
			category: target.category,
			name: target.name,
			os,
			plan,
			probe,
			steps,
		},
		diagnostics,
	);
	Ok(())
}
