//! `launch`: request sessions and wait for every outcome.

use std::collections::HashMap;
use std::sync::Arc;

use remconn::{ProcessRunner, SessionId, SessionState, SessionTracker, TrackerEvent};
use tracing::{debug, info};

use crate::cli::LaunchArgs;
use crate::context::CommandContext;
use crate::error::{CliError, Result};
use crate::output::{self, DiagnosticLevel, ErrorCode, LaunchData, LaunchOutcome, ResultBuilder};

enum Slot {
	Pending(SessionId, String),
	Done(LaunchOutcome),
}

pub async fn execute(ctx: &CommandContext, args: LaunchArgs, runner: Arc<dyn ProcessRunner>) -> Result<()> {
	let (registry, diagnostics) = ctx.load_for_read();
	let (tracker, mut events) = SessionTracker::new(runner, ctx.settings.clone());

	let mut builder = ResultBuilder::new("launch").diagnostics(diagnostics);
	let mut slots = Vec::with_capacity(args.names.len());
	for (name, result) in args.names.iter().zip(tracker.request_launch_many(&registry, &args.category, &args.names)) {
		match result {
			Ok(id) => slots.push(Slot::Pending(id, name.clone())),
			Err(err) => {
				builder = builder.diagnostic_with_source(DiagnosticLevel::Error, err.to_string(), "config");
				slots.push(Slot::Done(LaunchOutcome {
					name: name.clone(),
					id: None,
					state: SessionState::Failed,
					message: err.to_string(),
				}));
			}
		}
	}

	let remaining = slots.iter().filter(|slot| matches!(slot, Slot::Pending(..))).count();
	debug!(target = "remconn_cli", remaining, "waiting for launches");
	let mut finished: HashMap<SessionId, (bool, String)> = HashMap::new();
	while finished.len() < remaining {
		let Some(event) = events.recv().await else {
			break;
		};
		output::print_event(&event, ctx.format);
		if let TrackerEvent::Completed { id, message, success, .. } = event {
			finished.insert(id, (success, message));
		}
	}
	drop(tracker);

	let sessions: Vec<LaunchOutcome> = slots
		.into_iter()
		.map(|slot| match slot {
			Slot::Done(outcome) => outcome,
			Slot::Pending(id, name) => {
				let (state, message) = match finished.remove(&id) {
					Some((true, message)) => (SessionState::Succeeded, message),
					Some((false, message)) => (SessionState::Failed, message),
					None => (SessionState::Running, "no outcome reported".to_string()),
				};
				LaunchOutcome {
					name,
					id: Some(id),
					state,
					message,
				}
			}
		})
		.collect();

	let succeeded = sessions.iter().filter(|s| s.state == SessionState::Succeeded).count();
	let failed = sessions.len() - succeeded;
	info!(target = "remconn_cli", category = %args.category, succeeded, failed, "launch finished");

	let data = LaunchData {
		category: args.category,
		sessions,
		succeeded,
		failed,
	};

	if failed > 0 {
		let message = format!("{failed} of {} launches failed", data.sessions.len());
		let result = builder.data(data).error(ErrorCode::LaunchFailed, message).build();
		output::print_result(&result, ctx.format);
		return Err(CliError::OutputAlreadyPrinted);
	}

	output::print_result(&builder.data(data).build(), ctx.format);
	Ok(())
}

#[cfg(test)]
mod tests {
	use std::path::PathBuf;

	use remconn::testing::{MockRunner, ScriptedExit};
	use remconn::{LaunchSettings, OsFamily, Registry, store};
	use tempfile::TempDir;

	use super::*;
	use crate::output::OutputFormat;

	fn context(dir: &TempDir) -> CommandContext {
		let config_path: PathBuf = dir.path().join("config.json");
		let mut registry = Registry::new();
		registry.insert_connection("Lab", "db1", "ssh user@db1.internal", false).unwrap();
		registry.insert_connection("Lab", "db2", "ssh user@db2.internal", false).unwrap();
		store::save_registry(&config_path, &registry).unwrap();

		CommandContext {
			config_path,
			settings: LaunchSettings::default().with_os(OsFamily::Unix),
			format: OutputFormat::Json,
		}
	}

	fn args(names: &[&str]) -> LaunchArgs {
		LaunchArgs {
			category: "Lab".into(),
			names: names.iter().map(|n| n.to_string()).collect(),
		}
	}

	#[tokio::test]
	async fn all_launches_succeed() {
		let dir = TempDir::new().unwrap();
		let runner = Arc::new(MockRunner::new());

		execute(&context(&dir), args(&["db1", "db2"]), runner.clone()).await.unwrap();

		assert!(runner.has_session("db1"));
		assert!(runner.has_session("db2"));
	}

	#[tokio::test]
	async fn unknown_name_fails_without_blocking_others() {
		let dir = TempDir::new().unwrap();
		let runner = Arc::new(MockRunner::new());

		let err = execute(&context(&dir), args(&["db1", "ghost"]), runner.clone()).await.unwrap_err();

		assert!(err.is_output_already_printed());
		assert!(runner.has_session("db1"));
		assert!(!runner.has_session("ghost"));
	}

	#[tokio::test]
	async fn process_failure_sets_exit_status() {
		let dir = TempDir::new().unwrap();
		let runner = Arc::new(MockRunner::new());
		runner.script(&["-dmS", "db2"], ScriptedExit::code(1, "boom"));

		let err = execute(&context(&dir), args(&["db1", "db2"]), runner.clone()).await.unwrap_err();
		assert!(err.is_output_already_printed());
	}
}
