//! Pure launch planning per operating system.
//!
//! The decision of *how* to start a command lives here as data; executing it
//! is the worker's job. Nothing in this module touches processes.

use serde::{Deserialize, Serialize};

use crate::runner::{Completion, Invocation, ProcessExit};
use crate::settings::Toolchain;

/// Operating-system family a plan is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
	Windows,
	Unix,
}

impl OsFamily {
	/// Family of the platform this binary was built for.
	pub fn current() -> Self {
		if cfg!(windows) { OsFamily::Windows } else { OsFamily::Unix }
	}
}

/// Terminal multiplexer used to keep unix sessions alive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Multiplexer {
	#[default]
	Screen,
	Tmux,
}

impl Multiplexer {
	/// Binary name looked up on `PATH`.
	pub fn program(self) -> &'static str {
		match self {
			Multiplexer::Screen => "screen",
			Multiplexer::Tmux => "tmux",
		}
	}

	/// Target usable without looking the session up, when the multiplexer
	/// can address a session by exact name.
	pub fn exact_target(self, session: &str) -> Option<SessionTarget> {
		match self {
			Multiplexer::Screen => None,
			Multiplexer::Tmux => Some(SessionTarget(format!("={session}"))),
		}
	}

	fn create_args(self, session: &str) -> Vec<String> {
		match self {
			Multiplexer::Screen => args(["-dmS", session]),
			Multiplexer::Tmux => args(["new-session", "-d", "-s", session]),
		}
	}

	fn inject_args(self, target: &SessionTarget, keys: &str) -> Vec<String> {
		match self {
			Multiplexer::Screen => args(["-S", target.as_str(), "-p", "0", "-X", "stuff", keys]),
			Multiplexer::Tmux => args(["send-keys", "-t", &format!("{target}:"), "-l", keys]),
		}
	}

	fn kill_args(self, target: &SessionTarget) -> Vec<String> {
		match self {
			Multiplexer::Screen => args(["-S", target.as_str(), "-X", "quit"]),
			Multiplexer::Tmux => args(["kill-session", "-t", target.as_str()]),
		}
	}

	fn probe_args(self, session: &str) -> Vec<String> {
		match self {
			Multiplexer::Screen => args(["-ls", session]),
			Multiplexer::Tmux => args(["has-session", "-t", &format!("={session}")]),
		}
	}
}

impl std::fmt::Display for Multiplexer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.program())
	}
}

/// Names exactly one multiplexer session.
///
/// Bare names are prefix matches for both screen and tmux (`db1` would hit
/// `db10`), so every command after creation goes through a target:
/// `=<name>` for tmux, `<pid>.<name>` for screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SessionTarget(String);

impl SessionTarget {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for SessionTarget {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

/// Query for one session by exact name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionProbe {
	pub invocation: Invocation,
	#[serde(skip)]
	multiplexer: Multiplexer,
	#[serde(skip)]
	session: String,
}

impl SessionProbe {
	/// Exact target of the session if the query result shows it exists.
	///
	/// tmux answers with its exit status. `screen -ls` lists every session
	/// whose name starts with the query and exits non-zero either way, so
	/// its output is searched for a `<pid>.<name>` socket instead.
	pub fn matched(&self, exit: &ProcessExit) -> Option<SessionTarget> {
		match self.multiplexer {
			Multiplexer::Tmux => exit.success().then(|| SessionTarget(format!("={}", self.session))),
			Multiplexer::Screen => {
				let ProcessExit::Exited { stdout, .. } = exit else {
					return None;
				};
				stdout
					.lines()
					.filter_map(|line| line.split_whitespace().next())
					.find(|socket| match socket.split_once('.') {
						Some((pid, name)) => {
							name == self.session && !pid.is_empty() && pid.bytes().all(|b| b.is_ascii_digit())
						}
						None => false,
					})
					.map(|socket| SessionTarget(socket.to_string()))
			}
		}
	}
}

/// How a command will be started, independent of concrete binaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LaunchPlan {
	/// Hand the command to the platform's command interpreter.
	Shell { command: String },
	/// Create a detached multiplexer session, then type the command into it.
	Multiplexer { session: String, keys: String },
}

/// What a single plan step is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
	ShellCommand,
	CreateSession,
	InjectKeys,
}

/// One external invocation of a rendered plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchStep {
	pub kind: StepKind,
	pub invocation: Invocation,
	/// Failure of this step fails the session.
	pub fatal: bool,
}

/// Inputs used to select a [`LaunchPlan`].
#[derive(Debug, Clone, Copy)]
pub struct LaunchPlanInput<'a> {
	pub os: OsFamily,
	/// Used as the multiplexer session identifier.
	pub session_name: &'a str,
	pub command: &'a str,
}

/// Resolves the launch plan for a command on the given platform.
pub fn resolve_launch_plan(input: LaunchPlanInput<'_>) -> LaunchPlan {
	match input.os {
		OsFamily::Windows => LaunchPlan::Shell {
			command: input.command.to_string(),
		},
		OsFamily::Unix => LaunchPlan::Multiplexer {
			session: input.session_name.to_string(),
			keys: format!("{}\n", input.command),
		},
	}
}

impl LaunchPlan {
	/// Renders the ordered invocations for this plan.
	///
	/// A screen session's pid is only known once it exists, so screen
	/// inject steps are rendered against a `<pid>.<name>` placeholder; the
	/// worker resolves the real target after creating the session.
	pub fn steps(&self, toolchain: &Toolchain) -> Vec<LaunchStep> {
		match self {
			LaunchPlan::Shell { command } => {
				let mut shell_args = toolchain.shell.args.clone();
				shell_args.push(command.clone());
				vec![LaunchStep {
					kind: StepKind::ShellCommand,
					invocation: Invocation {
						program: toolchain.shell.program.clone(),
						args: shell_args,
						completion: Completion::Detached,
					},
					fatal: true,
				}]
			}
			LaunchPlan::Multiplexer { session, keys } => {
				let target = toolchain
					.multiplexer
					.exact_target(session)
					.unwrap_or_else(|| SessionTarget(format!("<pid>.{session}")));
				vec![
					LaunchStep {
						kind: StepKind::CreateSession,
						invocation: toolchain.create_session(session),
						fatal: true,
					},
					LaunchStep {
						kind: StepKind::InjectKeys,
						invocation: toolchain.inject_keys(&target, keys),
						fatal: true,
					},
				]
			}
		}
	}

	/// Multiplexer session name, for plans that create one.
	pub fn session(&self) -> Option<&str> {
		match self {
			LaunchPlan::Shell { .. } => None,
			LaunchPlan::Multiplexer { session, .. } => Some(session),
		}
	}
}

impl Toolchain {
	/// Query that tells whether a session named exactly `session` exists.
	pub fn session_probe(&self, session: &str) -> SessionProbe {
		SessionProbe {
			invocation: self.multiplexer_invocation(self.multiplexer.probe_args(session)),
			multiplexer: self.multiplexer,
			session: session.to_string(),
		}
	}

	pub fn create_session(&self, session: &str) -> Invocation {
		self.multiplexer_invocation(self.multiplexer.create_args(session))
	}

	pub fn inject_keys(&self, target: &SessionTarget, keys: &str) -> Invocation {
		self.multiplexer_invocation(self.multiplexer.inject_args(target, keys))
	}

	/// Removes a session created by a launch that failed afterwards.
	pub fn kill_session(&self, target: &SessionTarget) -> Invocation {
		self.multiplexer_invocation(self.multiplexer.kill_args(target))
	}

	fn multiplexer_invocation(&self, args: Vec<String>) -> Invocation {
		Invocation {
			program: self.multiplexer_program().to_string(),
			args,
			completion: Completion::Checked,
		}
	}
}

fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
	parts.iter().map(|part| part.to_string()).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::settings::ShellSpec;

	fn unix_plan() -> LaunchPlan {
		resolve_launch_plan(LaunchPlanInput {
			os: OsFamily::Unix,
			session_name: "db1",
			command: "ssh user@db1.internal",
		})
	}

	#[test]
	fn unix_plan_creates_then_injects() {
		let plan = unix_plan();
		assert_eq!(
			plan,
			LaunchPlan::Multiplexer {
				session: "db1".into(),
				keys: "ssh user@db1.internal\n".into(),
			}
		);

		let steps = plan.steps(&Toolchain::default());
		assert_eq!(steps.len(), 2);
		assert_eq!(steps[0].kind, StepKind::CreateSession);
		assert_eq!(steps[0].invocation.program, "screen");
		assert_eq!(steps[0].invocation.args, vec!["-dmS", "db1"]);
		assert_eq!(steps[1].kind, StepKind::InjectKeys);
		assert_eq!(
			steps[1].invocation.args,
			vec!["-S", "<pid>.db1", "-p", "0", "-X", "stuff", "ssh user@db1.internal\n"]
		);
		assert!(steps.iter().all(|step| step.fatal));
		assert!(steps.iter().all(|step| step.invocation.completion == Completion::Checked));
	}

	#[test]
	fn tmux_renders_same_plan_with_its_own_arguments() {
		let toolchain = Toolchain {
			multiplexer: Multiplexer::Tmux,
			..Toolchain::default()
		};
		let steps = unix_plan().steps(&toolchain);
		assert_eq!(steps[0].invocation.program, "tmux");
		assert_eq!(steps[0].invocation.args, vec!["new-session", "-d", "-s", "db1"]);
		assert_eq!(
			steps[1].invocation.args,
			vec!["send-keys", "-t", "=db1:", "-l", "ssh user@db1.internal\n"]
		);
		assert_eq!(
			toolchain.session_probe("db1").invocation.args,
			vec!["has-session", "-t", "=db1"]
		);
		let target = Multiplexer::Tmux.exact_target("db1").unwrap();
		assert_eq!(toolchain.kill_session(&target).args, vec!["kill-session", "-t", "=db1"]);
	}

	fn listing(stdout: &str) -> ProcessExit {
		ProcessExit::Exited {
			code: Some(1),
			stdout: stdout.to_string(),
			stderr: String::new(),
		}
	}

	#[test]
	fn screen_listing_matches_whole_session_names_only() {
		let probe = Toolchain::default().session_probe("db1");
		assert_eq!(probe.invocation.args, vec!["-ls", "db1"]);

		let others = "There are screens on:\n\t4021.db10\t(Detached)\n\t4100.db1-old\t(Detached)\n2 Sockets in /run/screen/S-me.\n";
		assert_eq!(probe.matched(&listing(others)), None);
		assert_eq!(probe.matched(&listing("No Sockets found in /run/screen/S-me.\n")), None);

		let present = "There is a screen on:\n\t4188.db1\t(Detached)\n1 Socket in /run/screen/S-me.\n";
		let target = probe.matched(&listing(present)).unwrap();
		assert_eq!(target.as_str(), "4188.db1");
		assert_eq!(
			Toolchain::default().kill_session(&target).args,
			vec!["-S", "4188.db1", "-X", "quit"]
		);
	}

	#[test]
	fn tmux_session_query_uses_exit_status() {
		let toolchain = Toolchain {
			multiplexer: Multiplexer::Tmux,
			..Toolchain::default()
		};
		let probe = toolchain.session_probe("db1");
		let found = ProcessExit::Exited {
			code: Some(0),
			stdout: String::new(),
			stderr: String::new(),
		};
		assert_eq!(probe.matched(&found).map(|t| t.to_string()), Some("=db1".to_string()));
		assert_eq!(probe.matched(&listing("")), None);
	}

	#[test]
	fn windows_plan_is_single_detached_shell_step() {
		let plan = resolve_launch_plan(LaunchPlanInput {
			os: OsFamily::Windows,
			session_name: "db1",
			command: "ssh user@db1.internal",
		});
		assert_eq!(plan.session(), None);

		let toolchain = Toolchain {
			shell: ShellSpec {
				program: "cmd.exe".into(),
				args: vec!["/C".into()],
			},
			..Toolchain::default()
		};
		let steps = plan.steps(&toolchain);
		assert_eq!(steps.len(), 1);
		assert_eq!(steps[0].kind, StepKind::ShellCommand);
		assert_eq!(steps[0].invocation.program, "cmd.exe");
		assert_eq!(steps[0].invocation.args, vec!["/C", "ssh user@db1.internal"]);
		assert_eq!(steps[0].invocation.completion, Completion::Detached);
	}

	#[test]
	fn multiplexer_program_override_is_used() {
		let toolchain = Toolchain {
			multiplexer_program: Some("/opt/bin/screen".into()),
			..Toolchain::default()
		};
		let steps = unix_plan().steps(&toolchain);
		assert!(steps.iter().all(|step| step.invocation.program == "/opt/bin/screen"));
		assert_eq!(toolchain.session_probe("db1").invocation.program, "/opt/bin/screen");
	}
}
