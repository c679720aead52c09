use remconn::DEFAULT_CATEGORIES;
use tracing::info;

use super::emit_success;
use crate::cli::CategoryAction;
use crate::context::CommandContext;
use crate::error::Result;
use crate::output::{ChangeData, Diagnostic, DiagnosticLevel, SavedData};

pub fn execute(ctx: &CommandContext, action: CategoryAction) -> Result<()> {
	let mut registry = ctx.load_for_update()?;
	let mut diagnostics = Vec::new();

	let change = match action {
		CategoryAction::Add { name } => {
			registry.add_category(&name)?;
			info!(target = "remconn_cli", category = %name, "category added");
			ChangeData {
				summary: format!("Added category {}", name.trim()),
				removed_connections: Vec::new(),
			}
		}
		CategoryAction::Rm { name } => {
			let removed = registry.remove_category(&name)?;
			info!(target = "remconn_cli", category = %name, connections = removed.len(), "category removed");
			if DEFAULT_CATEGORIES.contains(&name.as_str()) {
				diagnostics.push(Diagnostic {
					level: DiagnosticLevel::Warning,
					message: format!("{name} is a default category"),
					source: None,
				});
			}
			ChangeData {
				summary: format!("Removed category {name} ({} connections)", removed.len()),
				removed_connections: removed.into_keys().collect(),
			}
		}
	};

	let saved = ctx.save(&registry)?;
	emit_success(
		ctx,
		"category",
		SavedData {
			change,
			config: ctx.config_path.clone(),
			backup: saved.backup,
		},
		diagnostics,
	);
	Ok(())
}
