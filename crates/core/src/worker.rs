//! Session worker: executes one launch plan and reports its outcome.

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::runner::{Invocation, ProcessExit, ProcessRunner};
use crate::session::{Session, SessionId};
use crate::settings::{LaunchSettings, Toolchain};
use crate::strategy::{LaunchPlan, LaunchPlanInput, SessionTarget, StepKind, resolve_launch_plan};

/// Notifications a worker sends back to its tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerReport {
	Progress { id: SessionId, name: String, message: String },
	/// Carries the session in its terminal state. Sent exactly once per run.
	Finished(Session),
}

/// One launch attempt for one session.
#[derive(Debug)]
pub struct SessionWorker {
	session: Session,
	plan: LaunchPlan,
	toolchain: Toolchain,
}

impl SessionWorker {
	pub fn new(session: Session, settings: &LaunchSettings) -> Self {
		let plan = resolve_launch_plan(LaunchPlanInput {
			os: settings.os,
			session_name: &session.name,
			command: &session.command,
		});
		Self {
			session,
			plan,
			toolchain: settings.toolchain.clone(),
		}
	}

	pub fn session(&self) -> &Session {
		&self.session
	}

	/// Runs the plan to completion and returns the terminal session.
	///
	/// Sends one progress report up front and exactly one
	/// [`WorkerReport::Finished`]. There is no timeout: a step that never
	/// exits keeps the worker outstanding.
	pub async fn run(mut self, runner: &dyn ProcessRunner, reports: &UnboundedSender<WorkerReport>) -> Session {
		self.session.start();
		let name = self.session.name.clone();
		send(
			reports,
			WorkerReport::Progress {
				id: self.session.id,
				name: name.clone(),
				message: format!("Connecting to {name}..."),
			},
		);

		match self.execute(runner).await {
			Ok(()) => {
				info!(target = "remconn.worker", session = %name, id = %self.session.id, "launch succeeded");
				self.session.finish(true, format!("Successfully connected to {name}"));
			}
			Err(err) => {
				warn!(target = "remconn.worker", session = %name, id = %self.session.id, error = %err, "launch failed");
				self.session.finish(false, format!("Error connecting to {name}: {err}"));
			}
		}

		send(reports, WorkerReport::Finished(self.session.clone()));
		self.session
	}

	async fn execute(&self, runner: &dyn ProcessRunner) -> Result<()> {
		match &self.plan {
			LaunchPlan::Shell { .. } => {
				for step in self.plan.steps(&self.toolchain) {
					if let Err(err) = self.run_step(runner, step.kind, &step.invocation).await {
						if step.fatal {
							return Err(err);
						}
						warn!(target = "remconn.worker", id = %self.session.id, kind = ?step.kind, error = %err, "non-fatal step failed");
					}
				}
				Ok(())
			}
			LaunchPlan::Multiplexer { session, keys } => self.launch_detached(runner, session, keys).await,
		}
	}

	/// Look up, create, resolve the exact target, inject.
	///
	/// Once the session exists, a failure removes it again so that a retry
	/// does not run into `SessionExists`.
	async fn launch_detached(&self, runner: &dyn ProcessRunner, session: &str, keys: &str) -> Result<()> {
		let toolchain = &self.toolchain;
		if self.find_session(runner, session).await.is_some() {
			return Err(Error::SessionExists(session.to_string()));
		}

		self.run_step(runner, StepKind::CreateSession, &toolchain.create_session(session))
			.await?;

		let target = match toolchain.multiplexer.exact_target(session) {
			Some(target) => target,
			None => self
				.find_session(runner, session)
				.await
				.ok_or_else(|| Error::SessionMissing(session.to_string()))?,
		};

		let inject = toolchain.inject_keys(&target, keys);
		if let Err(err) = self.run_step(runner, StepKind::InjectKeys, &inject).await {
			self.discard_session(runner, &target).await;
			return Err(err);
		}
		Ok(())
	}

	async fn run_step(&self, runner: &dyn ProcessRunner, kind: StepKind, invocation: &Invocation) -> Result<()> {
		debug!(target = "remconn.worker", id = %self.session.id, ?kind, %invocation, "running step");

		let exit = runner.run(invocation).await.map_err(|source| Error::Spawn {
			program: invocation.program.clone(),
			source,
		})?;

		match exit {
			ProcessExit::Exited { code, stderr, .. } if code != Some(0) => Err(Error::ExitStatus {
				program: invocation.program.clone(),
				code,
				stderr,
			}),
			_ => Ok(()),
		}
	}

	/// Exact target of a live session named `session`. A probe that cannot
	/// run counts as "absent".
	async fn find_session(&self, runner: &dyn ProcessRunner, session: &str) -> Option<SessionTarget> {
		let probe = self.toolchain.session_probe(session);
		match runner.run(&probe.invocation).await {
			Ok(exit) => probe.matched(&exit),
			Err(err) => {
				debug!(target = "remconn.worker", probe = %probe.invocation, error = %err, "session probe could not run");
				None
			}
		}
	}

	async fn discard_session(&self, runner: &dyn ProcessRunner, target: &SessionTarget) {
		let kill = self.toolchain.kill_session(target);
		match runner.run(&kill).await {
			Ok(exit) if exit.success() => {
				debug!(target = "remconn.worker", id = %self.session.id, %target, "removed half-started session")
			}
			Ok(exit) => {
				warn!(target = "remconn.worker", id = %self.session.id, %target, ?exit, "could not remove half-started session")
			}
			Err(err) => {
				warn!(target = "remconn.worker", id = %self.session.id, %target, error = %err, "could not remove half-started session")
			}
		}
	}
}

fn send(reports: &UnboundedSender<WorkerReport>, report: WorkerReport) {
	if reports.send(report).is_err() {
		debug!(target = "remconn.worker", "tracker gone; dropping worker report");
	}
}

#[cfg(test)]
mod tests {
	use tokio::sync::mpsc;

	use super::*;
	use crate::runner::Completion;
	use crate::session::SessionState;
	use crate::settings::ShellSpec;
	use crate::strategy::{Multiplexer, OsFamily};
	use crate::testing::{MockRunner, ScriptedExit};

	fn running(name: &str, command: &str) -> Session {
		let mut session = Session::new(SessionId(7), "Lab", name, command);
		session.start();
		session
	}

	fn unix() -> LaunchSettings {
		LaunchSettings::default().with_os(OsFamily::Unix)
	}

	async fn run_worker(runner: &MockRunner, settings: &LaunchSettings) -> (Session, Vec<WorkerReport>) {
		let (tx, mut rx) = mpsc::unbounded_channel();
		let worker = SessionWorker::new(running("db1", "ssh user@db1.internal"), settings);
		let session = worker.run(runner, &tx).await;
		drop(tx);
		let mut reports = Vec::new();
		while let Some(report) = rx.recv().await {
			reports.push(report);
		}
		(session, reports)
	}

	#[tokio::test]
	async fn success_reports_progress_then_one_finish() {
		let runner = MockRunner::new();
		let (session, reports) = run_worker(&runner, &unix()).await;

		assert_eq!(session.state, SessionState::Succeeded);
		assert_eq!(session.message, "Successfully connected to db1");
		assert_eq!(reports.len(), 2);
		assert!(matches!(&reports[0], WorkerReport::Progress { message, .. } if message == "Connecting to db1..."));
		assert!(matches!(&reports[1], WorkerReport::Finished(s) if s.state == SessionState::Succeeded));

		let calls = runner.invocations();
		assert_eq!(calls.len(), 4);
		assert_eq!(calls[0].args, vec!["-ls", "db1"]);
		assert_eq!(calls[1].args, vec!["-dmS", "db1"]);
		assert_eq!(calls[2].args, vec!["-ls", "db1"]);
		assert_eq!(
			calls[3].args,
			vec!["-S", "4000.db1", "-p", "0", "-X", "stuff", "ssh user@db1.internal\n"]
		);
	}

	#[tokio::test]
	async fn longer_session_name_does_not_count_as_existing() {
		for multiplexer in [Multiplexer::Screen, Multiplexer::Tmux] {
			let runner = MockRunner::new();
			runner.add_session("db10");

			let (session, _) = run_worker(&runner, &unix().with_multiplexer(multiplexer)).await;

			assert_eq!(session.state, SessionState::Succeeded, "{multiplexer}: {}", session.message);
			assert!(runner.has_session("db1"));
			assert!(runner.has_session("db10"));
		}
	}

	#[tokio::test]
	async fn tmux_commands_address_the_session_exactly() {
		let runner = MockRunner::new();
		let (session, _) = run_worker(&runner, &unix().with_multiplexer(Multiplexer::Tmux)).await;
		assert!(session.succeeded());

		let calls = runner.invocations();
		assert_eq!(calls.len(), 3);
		assert_eq!(calls[0].args, vec!["has-session", "-t", "=db1"]);
		assert_eq!(calls[1].args, vec!["new-session", "-d", "-s", "db1"]);
		assert_eq!(calls[2].args, vec!["send-keys", "-t", "=db1:", "-l", "ssh user@db1.internal\n"]);
	}

	#[tokio::test]
	async fn failed_inject_removes_the_new_session() {
		for multiplexer in [Multiplexer::Screen, Multiplexer::Tmux] {
			let runner = MockRunner::new();
			let settings = unix().with_multiplexer(multiplexer);
			runner.script(&["ssh user@db1.internal\n"], ScriptedExit::code(1, "inject failed"));

			let (session, _) = run_worker(&runner, &settings).await;
			assert_eq!(session.state, SessionState::Failed);
			assert!(session.message.contains("inject failed"), "{}", session.message);
			assert!(!runner.has_session("db1"), "{multiplexer} session left behind");

			let cleanup = match multiplexer {
				Multiplexer::Screen => vec!["-S", "4000.db1", "-X", "quit"],
				Multiplexer::Tmux => vec!["kill-session", "-t", "=db1"],
			};
			assert_eq!(runner.invocations().pop().unwrap().args, cleanup);

			runner.clear_scripts();
			let (retry, _) = run_worker(&runner, &settings).await;
			assert_eq!(retry.state, SessionState::Succeeded, "{}", retry.message);
		}
	}

	#[tokio::test]
	async fn screen_session_missing_after_create_fails_without_inject() {
		let runner = MockRunner::new();
		runner.script(&["-dmS", "db1"], ScriptedExit::code(0, ""));

		let (session, _) = run_worker(&runner, &unix()).await;
		assert_eq!(session.state, SessionState::Failed);
		assert_eq!(
			session.message,
			"Error connecting to db1: multiplexer session 'db1' not found after creating it"
		);
		assert!(runner.invocations_matching(&["stuff"]).is_empty());
	}

	#[tokio::test]
	async fn failing_create_step_stops_the_plan() {
		let runner = MockRunner::new();
		runner.script(&["-dmS", "db1"], ScriptedExit::code(1, "Cannot make directory"));

		let (session, reports) = run_worker(&runner, &unix()).await;

		assert_eq!(session.state, SessionState::Failed);
		assert!(session.message.starts_with("Error connecting to db1: screen exited with exit code 1"));
		assert!(session.message.contains("Cannot make directory"));
		assert_eq!(runner.invocations().len(), 2);
		assert_eq!(
			reports.iter().filter(|r| matches!(r, WorkerReport::Finished(_))).count(),
			1
		);
	}

	#[tokio::test]
	async fn spawn_failure_is_reported_as_failure() {
		let runner = MockRunner::new();
		runner.script(&["-dmS", "db1"], ScriptedExit::spawn_error("No such file or directory"));

		let (session, _) = run_worker(&runner, &unix()).await;
		assert_eq!(session.state, SessionState::Failed);
		assert!(session.message.contains("failed to start screen"));
	}

	#[tokio::test]
	async fn existing_multiplexer_session_is_distinct_failure() {
		let runner = MockRunner::new();
		runner.add_session("db1");

		let (session, _) = run_worker(&runner, &unix()).await;
		assert_eq!(session.state, SessionState::Failed);
		assert_eq!(session.message, "Error connecting to db1: multiplexer session 'db1' already exists");
		assert_eq!(runner.invocations().len(), 1, "nothing else runs once the session is found");
	}

	#[tokio::test]
	async fn windows_shell_step_is_fire_and_forget() {
		let runner = MockRunner::new();
		let mut settings = LaunchSettings::default().with_os(OsFamily::Windows);
		settings.toolchain.shell = ShellSpec {
			program: "cmd.exe".into(),
			args: vec!["/C".into()],
		};
		let (session, _) = run_worker(&runner, &settings).await;

		assert_eq!(session.state, SessionState::Succeeded);
		let calls = runner.invocations();
		assert_eq!(calls.len(), 1);
		assert_eq!(calls[0].program, "cmd.exe");
		assert_eq!(calls[0].completion, Completion::Detached);
		assert_eq!(calls[0].args, vec!["/C", "ssh user@db1.internal"]);
	}
}
