//! Command context: resolved configuration shared by every command.

use std::path::{Path, PathBuf};

use remconn::store::{self, Loaded, Saved};
use remconn::{LaunchSettings, Registry};
use tracing::debug;

use crate::cli::Cli;
use crate::error::{CliError, Result};
use crate::output::{Diagnostic, DiagnosticLevel, OutputFormat};

/// Settings resolved from flags and environment.
#[derive(Debug, Clone)]
pub struct CommandContext {
	pub config_path: PathBuf,
	pub settings: LaunchSettings,
	pub format: OutputFormat,
}

impl From<&Cli> for CommandContext {
	fn from(cli: &Cli) -> Self {
		let settings = LaunchSettings::default()
			.with_multiplexer(cli.multiplexer.into())
			.with_multiplexer_program(cli.multiplexer_bin.clone());
		Self {
			config_path: cli.config.clone(),
			settings,
			format: cli.format,
		}
	}
}

impl CommandContext {
	pub fn config_path(&self) -> &Path {
		&self.config_path
	}

	/// Loads the registry for a read-only command.
	///
	/// A damaged file yields an empty registry plus a warning diagnostic.
	pub fn load_for_read(&self) -> (Registry, Vec<Diagnostic>) {
		let Loaded { registry, error } = store::load_registry(&self.config_path);
		let diagnostics = error
			.map(|err| Diagnostic {
				level: DiagnosticLevel::Warning,
				message: format!("{err}; continuing with an empty registry"),
				source: Some("config".to_string()),
			})
			.into_iter()
			.collect();
		(registry, diagnostics)
	}

	/// Loads the registry for a command that will save it back.
	///
	/// Refuses when loading reported any problem so that a damaged file is
	/// never replaced by an empty registry.
	pub fn load_for_update(&self) -> Result<Registry> {
		let Loaded { registry, error } = store::load_registry(&self.config_path);
		match error {
			Some(source) => Err(CliError::DamagedConfig {
				path: self.config_path.clone(),
				source,
			}),
			None => Ok(registry),
		}
	}

	pub fn save(&self, registry: &Registry) -> Result<Saved> {
		let saved = store::save_registry(&self.config_path, registry)?;
		debug!(target = "remconn_cli", path = %self.config_path.display(), backup = ?saved.backup, "registry written");
		Ok(saved)
	}
}
