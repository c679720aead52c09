//! Connection add/edit/remove. Each command saves the registry with a backup.

use remconn::{ConnectionUpdate, Error as CoreError};
use tracing::info;

use super::emit_success;
use super::list::connection_data;
use crate::cli::{AddArgs, EditArgs, RemoveArgs};
use crate::context::CommandContext;
use crate::error::{CliError, Result};
use crate::output::{ChangeData, ConnectionData, Diagnostic, DiagnosticLevel, SavedData};

pub fn add(ctx: &CommandContext, args: AddArgs) -> Result<()> {
	let mut registry = ctx.load_for_update()?;
	let AddArgs { target, command, force } = args;

	let replaced = registry.insert_connection(&target.category, &target.name, &command, force)?;
	let saved = ctx.save(&registry)?;
	info!(target = "remconn_cli", category = %target.category, name = %target.name, replaced = replaced.is_some(), "connection added");

	let mut diagnostics = Vec::new();
	if let Some(previous) = replaced {
		diagnostics.push(note(format!("replaced previous command: {}", previous.command)));
	}
	let change = connection_data(&registry, target.category.trim(), target.name.trim()).unwrap_or(ConnectionData {
		category: target.category,
		name: target.name,
		command,
	});
	emit_success(
		ctx,
		"add",
		SavedData {
			change,
			config: ctx.config_path.clone(),
			backup: saved.backup,
		},
		diagnostics,
	);
	Ok(())
}

pub fn edit(ctx: &CommandContext, args: EditArgs) -> Result<()> {
	let EditArgs {
		target,
		to_category,
		rename,
		command,
	} = args;
	if to_category.is_none() && rename.is_none() && command.is_none() {
		return Err(CliError::NothingToEdit);
	}

	let mut registry = ctx.load_for_update()?;
	let Some(existing) = registry.get(&target.category, &target.name) else {
		return Err(CoreError::ConnectionNotFound {
			category: target.category,
			name: target.name,
		}
		.into());
	};

	let update = ConnectionUpdate {
		category: to_category.unwrap_or_else(|| target.category.clone()),
		name: rename.unwrap_or_else(|| target.name.clone()),
		command: command.unwrap_or_else(|| existing.command.clone()),
	};
	let (category, name) = (update.category.trim().to_string(), update.name.trim().to_string());
	registry.update_connection(&target.category, &target.name, update)?;
	let saved = ctx.save(&registry)?;
	info!(target = "remconn_cli", from = %format!("{}/{}", target.category, target.name), to = %format!("{category}/{name}"), "connection updated");

	let change = connection_data(&registry, &category, &name).ok_or(CoreError::ConnectionNotFound { category, name })?;
	emit_success(
		ctx,
		"edit",
		SavedData {
			change,
			config: ctx.config_path.clone(),
			backup: saved.backup,
		},
		Vec::new(),
	);
	Ok(())
}

pub fn remove(ctx: &CommandContext, args: RemoveArgs) -> Result<()> {
	let mut registry = ctx.load_for_update()?;
	let RemoveArgs { target, prune } = args;

	let removal = registry.remove_connection(&target.category, &target.name)?;
	let mut diagnostics = Vec::new();
	let mut summary = format!("Removed {}/{}", target.category, target.name);

	if removal.offer_category_removal {
		if prune {
			registry.remove_category(&target.category)?;
			summary.push_str(&format!(" and empty category {}", target.category));
		} else {
			diagnostics.push(note(format!(
				"category {} is now empty; pass --prune to remove it",
				target.category
			)));
		}
	}

	let saved = ctx.save(&registry)?;
	info!(target = "remconn_cli", category = %target.category, name = %target.name, prune, "connection removed");

	emit_success(
		ctx,
		"rm",
		SavedData {
			change: ChangeData {
				summary,
				removed_connections: vec![target.name],
			},
			config: ctx.config_path.clone(),
			backup: saved.backup,
		},
		diagnostics,
	);
	Ok(())
}

fn note(message: String) -> Diagnostic {
	Diagnostic {
		level: DiagnosticLevel::Info,
		message,
		source: None,
	}
}
