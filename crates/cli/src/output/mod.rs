//! Structured output envelope for all CLI commands.
//!
//! Every command produces one result envelope on stdout:
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "ok": true,
//!   "command": "list",
//!   "data": { ... },
//!   "timings": { "durationMs": 3 }
//! }
//! ```
//!
//! On failure:
//!
//! ```json
//! {
//!   "ok": false,
//!   "command": "launch",
//!   "error": {
//!     "code": "CONNECTION_NOT_FOUND",
//!     "message": "session 'db9' not found in Lab configuration"
//!   }
//! }
//! ```
//!
//! `text` renders the same envelope for people; `ndjson` additionally streams
//! launch events, one per line, before the final envelope.

#[cfg(test)]
mod tests;

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use colored::Colorize;
use remconn::{Invocation, LaunchPlan, LaunchStep, OsFamily, SessionId, SessionState, TrackerEvent};
use serde::Serialize;

/// Current schema version for command output.
pub const SCHEMA_VERSION: u32 = 1;

/// Output format for CLI results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text
	#[default]
	Text,
	/// JSON output
	Json,
	/// Newline-delimited JSON (streaming)
	Ndjson,
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Text => write!(f, "text"),
			OutputFormat::Json => write!(f, "json"),
			OutputFormat::Ndjson => write!(f, "ndjson"),
		}
	}
}

/// The result envelope returned by all commands.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub schema_version: Option<u32>,

	pub ok: bool,

	/// Command name (e.g., "list", "launch")
	pub command: String,

	/// Command-specific result data
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,

	/// Error information (only present on failure)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub timings: Option<Timings>,

	/// Warnings and other notes (e.g. an unreadable registry file)
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub diagnostics: Vec<Diagnostic>,
}

/// Error information for failed commands
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
	pub code: ErrorCode,

	pub message: String,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Standardized error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	ConnectionNotFound,
	CategoryNotFound,
	AlreadyExists,
	InvalidInput,
	/// One or more launches ended in failure
	LaunchFailed,
	/// Registry file exists but could not be read, parsed, or validated
	ConfigInvalid,
	/// Registry file could not be written
	WriteFailed,
	IoError,
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ErrorCode::ConnectionNotFound => write!(f, "CONNECTION_NOT_FOUND"),
			ErrorCode::CategoryNotFound => write!(f, "CATEGORY_NOT_FOUND"),
			ErrorCode::AlreadyExists => write!(f, "ALREADY_EXISTS"),
			ErrorCode::InvalidInput => write!(f, "INVALID_INPUT"),
			ErrorCode::LaunchFailed => write!(f, "LAUNCH_FAILED"),
			ErrorCode::ConfigInvalid => write!(f, "CONFIG_INVALID"),
			ErrorCode::WriteFailed => write!(f, "WRITE_FAILED"),
			ErrorCode::IoError => write!(f, "IO_ERROR"),
			ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
		}
	}
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
	pub duration_ms: u64,
}

impl From<Duration> for Timings {
	fn from(duration: Duration) -> Self {
		Timings {
			duration_ms: duration.as_millis() as u64,
		}
	}
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
	pub level: DiagnosticLevel,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
	Info,
	Warning,
	Error,
}

/// Builder for constructing command results
pub struct ResultBuilder<T: Serialize> {
	schema_version: Option<u32>,
	command: String,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Instant,
	diagnostics: Vec<Diagnostic>,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			schema_version: Some(SCHEMA_VERSION),
			command: command.into(),
			data: None,
			error: None,
			start_time: Instant::now(),
			diagnostics: Vec::new(),
		}
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, code: ErrorCode, message: impl Into<String>) -> Self {
		self.error = Some(CommandError {
			code,
			message: message.into(),
			details: None,
		});
		self
	}

	pub fn command_error(mut self, error: CommandError) -> Self {
		self.error = Some(error);
		self
	}

	pub fn diagnostic(mut self, level: DiagnosticLevel, message: impl Into<String>) -> Self {
		self.diagnostics.push(Diagnostic {
			level,
			message: message.into(),
			source: None,
		});
		self
	}

	pub fn diagnostic_with_source(
		mut self,
		level: DiagnosticLevel,
		message: impl Into<String>,
		source: impl Into<String>,
	) -> Self {
		self.diagnostics.push(Diagnostic {
			level,
			message: message.into(),
			source: Some(source.into()),
		});
		self
	}

	/// Appends diagnostics collected elsewhere.
	pub fn diagnostics(mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) -> Self {
		self.diagnostics.extend(diagnostics);
		self
	}

	pub fn build(self) -> CommandResult<T> {
		let ok = self.error.is_none() && self.data.is_some();

		CommandResult {
			schema_version: self.schema_version,
			ok,
			command: self.command,
			data: self.data,
			error: self.error,
			timings: Some(Timings::from(self.start_time.elapsed())),
			diagnostics: self.diagnostics,
		}
	}
}

/// Human-readable rendering of result data for `--format text`.
pub trait TextOutput {
	fn write_text(&self, out: &mut dyn Write) -> io::Result<()>;
}

impl TextOutput for () {
	fn write_text(&self, _out: &mut dyn Write) -> io::Result<()> {
		Ok(())
	}
}

/// Print a command result to stdout in the specified format
pub fn print_result<T: Serialize + TextOutput>(result: &CommandResult<T>, format: OutputFormat) {
	match format {
		OutputFormat::Json => {
			if let Ok(json) = serde_json::to_string_pretty(result) {
				println!("{json}");
			}
		}
		OutputFormat::Ndjson => {
			if let Ok(json) = serde_json::to_string(result) {
				println!("{json}");
			}
		}
		OutputFormat::Text => print_result_text(result),
	}
}

fn print_result_text<T: Serialize + TextOutput>(result: &CommandResult<T>) {
	let mut stdout = io::stdout().lock();

	for diag in &result.diagnostics {
		let prefix = match diag.level {
			DiagnosticLevel::Info => "info".normal(),
			DiagnosticLevel::Warning => "warning".yellow(),
			DiagnosticLevel::Error => "error".red(),
		};
		let _ = match diag.source {
			Some(ref source) => writeln!(stdout, "[{prefix}:{source}] {}", diag.message),
			None => writeln!(stdout, "[{prefix}] {}", diag.message),
		};
	}

	if let Some(ref data) = result.data {
		let _ = data.write_text(&mut stdout);
	}

	if let Some(ref error) = result.error {
		let _ = writeln!(stdout, "{} [{}]: {}", "Error".red().bold(), error.code, error.message);
	}
}

/// Print an error to stderr in human-readable format
pub fn print_error_stderr(error: &CommandError) {
	eprintln!("Error [{}]: {}", error.code, error.message);
}

/// Print one tracker event as it arrives.
///
/// Text mode prints status lines; ndjson streams the raw event. Plain json
/// only reports the final envelope.
pub fn print_event(event: &TrackerEvent, format: OutputFormat) {
	match format {
		OutputFormat::Text => match event {
			TrackerEvent::Progress { message, .. } => println!("{} {message}", "→".cyan()),
			TrackerEvent::Completed { message, success: true, .. } => println!("{} {message}", "✓".green()),
			TrackerEvent::Completed { message, success: false, .. } => println!("{} {message}", "✗".red()),
		},
		OutputFormat::Ndjson => {
			if let Ok(json) = serde_json::to_string(event) {
				println!("{json}");
			}
		}
		OutputFormat::Json => {}
	}
}

/// A command result with no data (for commands that only produce side effects)
pub type EmptyResult = CommandResult<()>;

/// One category in `list` output.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryListing {
	pub name: String,
	pub connections: Vec<ConnectionData>,
}

/// Result data for list command
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListData {
	pub categories: Vec<CategoryListing>,
	pub connection_count: usize,
}

impl TextOutput for ListData {
	fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
		if self.categories.is_empty() {
			return writeln!(out, "No connections configured.");
		}
		for category in &self.categories {
			writeln!(out, "{}", category.name.bold())?;
			if category.connections.is_empty() {
				writeln!(out, "  {}", "(empty)".dimmed())?;
			}
			for connection in &category.connections {
				writeln!(out, "  {:<20} {}", connection.name, connection.command.dimmed())?;
			}
		}
		Ok(())
	}
}

/// Result data for show, add and edit commands
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionData {
	pub category: String,
	pub name: String,
	pub command: String,
}

impl TextOutput for ConnectionData {
	fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
		writeln!(out, "{}/{}", self.category, self.name.bold())?;
		writeln!(out, "  cmd: {}", self.command)
	}
}

/// Result data for plan command
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanData {
	pub category: String,
	pub name: String,
	pub os: OsFamily,
	pub plan: LaunchPlan,
	/// Existence check run before a multiplexer plan.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub probe: Option<Invocation>,
	pub steps: Vec<LaunchStep>,
}

impl TextOutput for PlanData {
	fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
		writeln!(out, "{}/{} on {:?}:", self.category, self.name.bold(), self.os)?;
		if let Some(ref probe) = self.probe {
			writeln!(out, "  check: {probe}")?;
		}
		for (index, step) in self.steps.iter().enumerate() {
			let mode = if step.fatal { "" } else { " (non-fatal)" };
			writeln!(out, "  {}. {}{mode}", index + 1, step.invocation)?;
		}
		Ok(())
	}
}

/// Outcome of one requested launch.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchOutcome {
	pub name: String,
	/// Absent when the request was rejected before a session existed.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<SessionId>,
	pub state: SessionState,
	pub message: String,
}

/// Result data for launch command
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchData {
	pub category: String,
	pub sessions: Vec<LaunchOutcome>,
	pub succeeded: usize,
	pub failed: usize,
}

impl TextOutput for LaunchData {
	fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
		if self.failed > 0 {
			writeln!(out, "{} of {} launches failed", self.failed, self.sessions.len())
		} else {
			Ok(())
		}
	}
}

/// Result data for commands that rewrite the registry file
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedData<T: Serialize> {
	#[serde(flatten)]
	pub change: T,
	pub config: PathBuf,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub backup: Option<PathBuf>,
}

impl<T: Serialize + TextOutput> TextOutput for SavedData<T> {
	fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
		self.change.write_text(out)?;
		match self.backup {
			Some(ref backup) => writeln!(out, "Saved {} (backup: {})", self.config.display(), backup.display()),
			None => writeln!(out, "Saved {}", self.config.display()),
		}
	}
}

/// Registry change without connection details (removals, categories).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeData {
	pub summary: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub removed_connections: Vec<String>,
}

impl TextOutput for ChangeData {
	fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
		writeln!(out, "{}", self.summary)
	}
}
