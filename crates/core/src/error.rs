//! Error types for remconn core.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the registry, launch and persistence layers.
///
/// None of these are fatal to the process: every path that produces one
/// leaves the registry and tracker in a usable state.
#[derive(Debug, Error)]
pub enum Error {
	/// Requested connection is not in the registry.
	#[error("session '{name}' not found in {category} configuration")]
	ConnectionNotFound { category: String, name: String },

	#[error("category '{0}' not found")]
	CategoryNotFound(String),

	#[error("category '{0}' already exists")]
	CategoryExists(String),

	#[error("connection '{name}' already exists in category '{category}'")]
	ConnectionExists { category: String, name: String },

	/// A name or command was empty after trimming.
	#[error("{0} must not be empty")]
	EmptyField(&'static str),

	/// External process could not be started at all.
	#[error("failed to start {program}: {source}")]
	Spawn {
		program: String,
		#[source]
		source: std::io::Error,
	},

	/// A checked plan step exited unsuccessfully.
	#[error("{program} exited with {}{}", fmt_code(*code), fmt_stderr(stderr))]
	ExitStatus {
		program: String,
		code: Option<i32>,
		stderr: String,
	},

	/// The multiplexer already has a session under this name.
	#[error("multiplexer session '{0}' already exists")]
	SessionExists(String),

	/// The session was created but no longer shows up by exact name.
	#[error("multiplexer session '{0}' not found after creating it")]
	SessionMissing(String),

	#[error("failed to read {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// The file is not valid JSON.
	#[error("{path} is not valid JSON: {source}")]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	/// The file is JSON but does not describe a registry.
	#[error("{path} has an invalid structure: {issue}")]
	Structure { path: PathBuf, issue: StructureIssue },

	#[error("failed to write {path}: {source}")]
	Write {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

/// Coarse error classification handed to presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// Missing or conflicting registry entries; reported synchronously.
	Configuration,
	/// A plan step failed; reported as a terminal session outcome.
	Launch,
	/// Reading, parsing, validating or writing the registry file.
	Persistence,
}

impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::ConnectionNotFound { .. }
			| Error::CategoryNotFound(_)
			| Error::CategoryExists(_)
			| Error::ConnectionExists { .. }
			| Error::EmptyField(_) => ErrorKind::Configuration,
			Error::Spawn { .. } | Error::ExitStatus { .. } | Error::SessionExists(_) | Error::SessionMissing(_) => {
				ErrorKind::Launch
			}
			Error::Read { .. } | Error::Parse { .. } | Error::Structure { .. } | Error::Write { .. } => {
				ErrorKind::Persistence
			}
		}
	}
}

/// Why a parsed registry document was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureIssue {
	TopLevelNotMapping,
	CategoryNotMapping { category: String },
	EmptyCategoryName,
	EmptyConnectionName { category: String },
	ConnectionNotMapping { category: String, connection: String },
	MissingCommand { category: String, connection: String },
	EmptyCommand { category: String, connection: String },
}

impl StructureIssue {
	/// Category the issue points at, if any.
	pub fn category(&self) -> Option<&str> {
		match self {
			StructureIssue::TopLevelNotMapping | StructureIssue::EmptyCategoryName => None,
			StructureIssue::CategoryNotMapping { category }
			| StructureIssue::EmptyConnectionName { category }
			| StructureIssue::ConnectionNotMapping { category, .. }
			| StructureIssue::MissingCommand { category, .. }
			| StructureIssue::EmptyCommand { category, .. } => Some(category),
		}
	}

	/// Connection the issue points at, if any.
	pub fn connection(&self) -> Option<&str> {
		match self {
			StructureIssue::ConnectionNotMapping { connection, .. }
			| StructureIssue::MissingCommand { connection, .. }
			| StructureIssue::EmptyCommand { connection, .. } => Some(connection),
			_ => None,
		}
	}
}

impl fmt::Display for StructureIssue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StructureIssue::TopLevelNotMapping => write!(f, "configuration file must contain a mapping of categories"),
			StructureIssue::CategoryNotMapping { category } => {
				write!(f, "category '{category}' must contain a mapping of connections")
			}
			StructureIssue::EmptyCategoryName => write!(f, "category names must not be empty"),
			StructureIssue::EmptyConnectionName { category } => {
				write!(f, "category '{category}' contains a connection with an empty name")
			}
			StructureIssue::ConnectionNotMapping { category, connection } => {
				write!(f, "connection '{connection}' in category '{category}' must be a mapping")
			}
			StructureIssue::MissingCommand { category, connection } => {
				write!(f, "connection '{connection}' in category '{category}' must have a 'cmd' setting")
			}
			StructureIssue::EmptyCommand { category, connection } => {
				write!(f, "connection '{connection}' in category '{category}' has an empty 'cmd'")
			}
		}
	}
}

fn fmt_code(code: Option<i32>) -> String {
	match code {
		Some(code) => format!("exit code {code}"),
		None => "no exit code (terminated by signal)".to_string(),
	}
}

fn fmt_stderr(stderr: &str) -> String {
	let trimmed = stderr.trim();
	if trimmed.is_empty() { String::new() } else { format!(": {trimmed}") }
}
