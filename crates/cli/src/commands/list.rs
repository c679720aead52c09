use remconn::{Error as CoreError, Registry};
use tracing::debug;

use super::emit_success;
use crate::cli::{ConnectionRef, ListArgs};
use crate::context::CommandContext;
use crate::error::Result;
use crate::output::{CategoryListing, ConnectionData, ListData};

pub fn list(ctx: &CommandContext, args: ListArgs) -> Result<()> {
	let (registry, diagnostics) = ctx.load_for_read();

	let categories: Vec<&str> = match args.category.as_deref() {
		Some(category) if registry.contains_category(category) => vec![category],
		Some(category) => return Err(CoreError::CategoryNotFound(category.to_string()).into()),
		None => registry.categories().collect(),
	};
	let query = args.filter.as_deref().unwrap_or_default();

	let categories: Vec<CategoryListing> = categories
		.into_iter()
		.map(|category| CategoryListing {
			name: category.to_string(),
			connections: registry
				.filter(category, query)
				.into_iter()
				.filter_map(|name| connection_data(&registry, category, name))
				.collect(),
		})
		.filter(|listing| query.is_empty() || !listing.connections.is_empty())
		.collect();

	let connection_count = categories.iter().map(|c| c.connections.len()).sum();
	debug!(target = "remconn_cli", categories = categories.len(), connection_count, "listing registry");

	emit_success(
		ctx,
		"list",
		ListData {
			categories,
			connection_count,
		},
		diagnostics,
	);
	Ok(())
}

pub fn show(ctx: &CommandContext, target: ConnectionRef) -> Result<()> {
	let (registry, diagnostics) = ctx.load_for_read();
	let data = connection_data(&registry, &target.category, &target.name).ok_or(CoreError::ConnectionNotFound {
		category: target.category,
		name: target.name,
	})?;
	emit_success(ctx, "show", data, diagnostics);
	Ok(())
}

pub(crate) fn connection_data(registry: &Registry, category: &str, name: &str) -> Option<ConnectionData> {
	registry.get(category, name).map(|connection| ConnectionData {
		category: category.to_string(),
		name: name.to_string(),
		command: connection.command.clone(),
	})
}
