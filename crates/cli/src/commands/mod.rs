mod category;
mod connection;
mod launch;
mod list;
mod plan;

use std::sync::Arc;

use remconn::SystemRunner;
use serde::Serialize;

use crate::cli::{Cli, Commands};
use crate::context::CommandContext;
use crate::error::Result;
use crate::output::{self, Diagnostic, ResultBuilder, TextOutput};

pub async fn dispatch(cli: Cli) -> Result<()> {
	let ctx = CommandContext::from(&cli);

	match cli.command {
		Commands::List(args) => list::list(&ctx, args),
		Commands::Show(target) => list::show(&ctx, target),
		Commands::Plan(args) => plan::execute(&ctx, args),
		Commands::Launch(args) => launch::execute(&ctx, args, Arc::new(SystemRunner)).await,
		Commands::Add(args) => connection::add(&ctx, args),
		Commands::Edit(args) => connection::edit(&ctx, args),
		Commands::Rm(args) => connection::remove(&ctx, args),
		Commands::Category(action) => category::execute(&ctx, action),
	}
}

/// Prints a successful envelope for `command`.
pub(crate) fn emit_success<T: Serialize + TextOutput>(
	ctx: &CommandContext,
	command: &str,
	data: T,
	diagnostics: Vec<Diagnostic>,
) {
	let result = ResultBuilder::new(command).data(data).diagnostics(diagnostics).build();
	output::print_result(&result, ctx.format);
}
