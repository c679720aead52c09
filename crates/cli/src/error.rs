use std::path::PathBuf;

use remconn::{Error as CoreError, StructureIssue};
use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	/// Command failed but output has already been printed.
	/// Used to signal exit code 1 without additional output.
	#[error("")]
	OutputAlreadyPrinted,

	/// A mutating command found the registry file unusable.
	#[error("refusing to modify {}: {source}", path.display())]
	DamagedConfig {
		path: PathBuf,
		#[source]
		source: CoreError,
	},

	#[error("nothing to change: pass --to-category, --rename or --cmd")]
	NothingToEdit,

	#[error(transparent)]
	Core(#[from] CoreError),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl CliError {
	/// Check if this error indicates output has already been printed.
	pub fn is_output_already_printed(&self) -> bool {
		matches!(self, CliError::OutputAlreadyPrinted)
	}

	/// Convert this error to a CommandError for structured output
	pub fn to_command_error(&self) -> CommandError {
		let (code, message, details) = match self {
			CliError::OutputAlreadyPrinted => (ErrorCode::InternalError, String::new(), None),
			CliError::DamagedConfig { path, source } => (
				ErrorCode::ConfigInvalid,
				self.to_string(),
				Some(serde_json::json!({
					"path": path,
					"hint": "fix the file or restore a backup; it was not overwritten",
					"cause": core_code(source).to_string(),
				})),
			),
			CliError::NothingToEdit => (ErrorCode::InvalidInput, self.to_string(), None),
			CliError::Core(err) => (core_code(err), err.to_string(), core_details(err)),
			CliError::Io(err) => (ErrorCode::IoError, err.to_string(), None),
		};

		CommandError { code, message, details }
	}
}

fn core_code(err: &CoreError) -> ErrorCode {
	match err {
		CoreError::ConnectionNotFound { .. } => ErrorCode::ConnectionNotFound,
		CoreError::CategoryNotFound(_) => ErrorCode::CategoryNotFound,
		CoreError::CategoryExists(_) | CoreError::ConnectionExists { .. } => ErrorCode::AlreadyExists,
		CoreError::EmptyField(_) => ErrorCode::InvalidInput,
		CoreError::Spawn { .. }
		| CoreError::ExitStatus { .. }
		| CoreError::SessionExists(_)
		| CoreError::SessionMissing(_) => {
			ErrorCode::LaunchFailed
		}
		CoreError::Read { .. } | CoreError::Parse { .. } | CoreError::Structure { .. } => ErrorCode::ConfigInvalid,
		CoreError::Write { .. } => ErrorCode::WriteFailed,
	}
}

fn core_details(err: &CoreError) -> Option<serde_json::Value> {
	match err {
		CoreError::ConnectionNotFound { category, name } | CoreError::ConnectionExists { category, name } => {
			Some(serde_json::json!({ "category": category, "name": name }))
		}
		CoreError::Structure { path, issue } => Some(structure_details(path, issue)),
		CoreError::Read { path, .. } | CoreError::Parse { path, .. } | CoreError::Write { path, .. } => {
			Some(serde_json::json!({ "path": path }))
		}
		_ => None,
	}
}

fn structure_details(path: &std::path::Path, issue: &StructureIssue) -> serde_json::Value {
	serde_json::json!({
		"path": path,
		"category": issue.category(),
		"connection": issue.connection(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn not_found_maps_to_code_with_details() {
		let err = CliError::from(CoreError::ConnectionNotFound {
			category: "Lab".into(),
			name: "db9".into(),
		});
		let cmd = err.to_command_error();
		assert_eq!(cmd.code, ErrorCode::ConnectionNotFound);
		assert_eq!(cmd.message, "session 'db9' not found in Lab configuration");
		assert_eq!(cmd.details.unwrap()["name"], "db9");
	}

	#[test]
	fn damaged_config_names_file() {
		let err = CliError::DamagedConfig {
			path: PathBuf::from("config.json"),
			source: CoreError::Structure {
				path: PathBuf::from("config.json"),
				issue: StructureIssue::CategoryNotMapping { category: "A".into() },
			},
		};
		let cmd = err.to_command_error();
		assert_eq!(cmd.code, ErrorCode::ConfigInvalid);
		assert!(cmd.message.starts_with("refusing to modify config.json: "));
		assert_eq!(cmd.details.unwrap()["cause"], "CONFIG_INVALID");
	}

	#[test]
	fn structure_error_details_point_at_category() {
		let err = CliError::from(CoreError::Structure {
			path: PathBuf::from("config.json"),
			issue: StructureIssue::MissingCommand {
				category: "Lab".into(),
				connection: "db1".into(),
			},
		});
		let details = err.to_command_error().details.unwrap();
		assert_eq!(details["category"], "Lab");
		assert_eq!(details["connection"], "db1");
	}
}
