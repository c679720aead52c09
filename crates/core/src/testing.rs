//! Test doubles for exercising launches without spawning processes.
//!
//! [`MockRunner`] implements [`ProcessRunner`] and:
//! - records every invocation it receives
//! - keeps a table of multiplexer sessions with fake pids, answering
//!   screen/tmux session queries, creates, injects and kills the way the
//!   real tools do (bare names match by prefix, `=name` and `<pid>.name`
//!   exactly)
//! - returns scripted exits, spawn failures or panics for matching invocations
//! - can hold matching invocations at a [`Gate`] to simulate slow processes
//!
//! # Example
//!
//! ```ignore
//! use remconn::testing::{MockRunner, ScriptedExit};
//!
//! let runner = MockRunner::new();
//! runner.script(&["-dmS", "db1"], ScriptedExit::code(1, "no socket dir"));
//! // ... launch through a tracker built on Arc::new(runner)
//! ```

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::runner::{Completion, Invocation, ProcessExit, ProcessRunner};

const FIRST_PID: u32 = 4000;

/// Canned result for matching invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedExit {
	Exit { code: Option<i32>, stderr: String },
	SpawnError(String),
	/// The runner panics, taking the calling task down with it.
	Panic(String),
}

impl ScriptedExit {
	pub fn code(code: i32, stderr: &str) -> Self {
		ScriptedExit::Exit {
			code: Some(code),
			stderr: stderr.to_string(),
		}
	}

	pub fn spawn_error(message: &str) -> Self {
		ScriptedExit::SpawnError(message.to_string())
	}

	pub fn panic(message: &str) -> Self {
		ScriptedExit::Panic(message.to_string())
	}
}

/// Holds matching invocations until released.
#[derive(Debug, Clone)]
pub struct Gate {
	permits: Arc<Semaphore>,
}

impl Gate {
	/// Lets one held invocation proceed.
	pub fn release(&self) {
		self.permits.add_permits(1);
	}

	async fn pass(&self) {
		if let Ok(permit) = self.permits.acquire().await {
			permit.forget();
		}
	}
}

struct Rule<T> {
	needles: Vec<String>,
	value: T,
}

impl<T> Rule<T> {
	fn matches(&self, invocation: &Invocation) -> bool {
		self.needles.iter().all(|needle| invocation.args.contains(needle))
	}
}

#[derive(Default)]
struct Sessions {
	next_pid: u32,
	/// name -> pid
	by_name: BTreeMap<String, u32>,
}

impl Sessions {
	fn add(&mut self, name: &str) {
		let pid = FIRST_PID + self.next_pid;
		self.next_pid += 1;
		self.by_name.insert(name.to_string(), pid);
	}

	/// Resolves a screen `-S` or tmux `-t` target the way the tools do.
	fn resolve(&self, target: &str) -> Option<String> {
		if let Some(exact) = target.strip_prefix('=') {
			let exact = exact.strip_suffix(':').unwrap_or(exact);
			return self.by_name.contains_key(exact).then(|| exact.to_string());
		}
		if let Some((pid, name)) = target.split_once('.') {
			if let Ok(pid) = pid.parse::<u32>() {
				return (self.by_name.get(name) == Some(&pid)).then(|| name.to_string());
			}
		}
		let bare = target.strip_suffix(':').unwrap_or(target);
		self.by_name.keys().find(|name| name.starts_with(bare)).cloned()
	}

	fn listing(&self, query: &str) -> String {
		let mut stdout = String::new();
		for (name, pid) in self.by_name.iter().filter(|(name, _)| name.starts_with(query)) {
			stdout.push_str(&format!("\t{pid}.{name}\t(Detached)\n"));
		}
		if stdout.is_empty() {
			stdout.push_str("No Sockets found in /run/screen/S-mock.\n");
		}
		stdout
	}
}

/// Recording, scriptable [`ProcessRunner`].
#[derive(Default)]
pub struct MockRunner {
	invocations: Mutex<Vec<Invocation>>,
	sessions: Mutex<Sessions>,
	scripts: Mutex<Vec<Rule<ScriptedExit>>>,
	gates: Mutex<Vec<Rule<Gate>>>,
}

impl MockRunner {
	pub fn new() -> Self {
		Self::default()
	}

	/// Every invocation received so far, in arrival order.
	pub fn invocations(&self) -> Vec<Invocation> {
		self.invocations.lock().clone()
	}

	/// Invocations whose arguments contain every element of `needles`.
	pub fn invocations_matching(&self, needles: &[&str]) -> Vec<Invocation> {
		let rule = Rule {
			needles: owned(needles),
			value: (),
		};
		self.invocations().into_iter().filter(|inv| rule.matches(inv)).collect()
	}

	/// Marks a multiplexer session as already present.
	pub fn add_session(&self, name: &str) {
		self.sessions.lock().add(name);
	}

	/// Whether a session named exactly `name` is present.
	pub fn has_session(&self, name: &str) -> bool {
		self.sessions.lock().by_name.contains_key(name)
	}

	/// Invocations whose arguments contain every element of `needles`
	/// produce `exit`. Earlier scripts win.
	pub fn script(&self, needles: &[&str], exit: ScriptedExit) {
		self.scripts.lock().push(Rule {
			needles: owned(needles),
			value: exit,
		});
	}

	/// Drops every scripted exit; later invocations get default behavior.
	pub fn clear_scripts(&self) {
		self.scripts.lock().clear();
	}

	/// Invocations whose arguments contain every element of `needles` wait
	/// at the returned gate before completing.
	pub fn gate(&self, needles: &[&str]) -> Gate {
		let gate = Gate {
			permits: Arc::new(Semaphore::new(0)),
		};
		self.gates.lock().push(Rule {
			needles: owned(needles),
			value: gate.clone(),
		});
		gate
	}

	fn scripted(&self, invocation: &Invocation) -> Option<ScriptedExit> {
		self.scripts
			.lock()
			.iter()
			.find(|rule| rule.matches(invocation))
			.map(|rule| rule.value.clone())
	}

	fn gate_for(&self, invocation: &Invocation) -> Option<Gate> {
		self.gates
			.lock()
			.iter()
			.find(|rule| rule.matches(invocation))
			.map(|rule| rule.value.clone())
	}

	fn default_exit(&self, invocation: &Invocation) -> ProcessExit {
		let args: Vec<&str> = invocation.args.iter().map(String::as_str).collect();
		let mut sessions = self.sessions.lock();

		match args.as_slice() {
			["-ls", query] => exited(1, sessions.listing(query), String::new()),
			["has-session", "-t", target] => match sessions.resolve(target) {
				Some(_) => exited(0, String::new(), String::new()),
				None => exited(1, String::new(), format!("can't find session: {target}")),
			},
			["-dmS", name] | ["new-session", "-d", "-s", name] => {
				sessions.add(name);
				exited(0, String::new(), String::new())
			}
			["-S", target, "-X", "quit"] | ["kill-session", "-t", target] => match sessions.resolve(target) {
				Some(name) => {
					sessions.by_name.remove(&name);
					exited(0, String::new(), String::new())
				}
				None => exited(1, String::new(), format!("no session: {target}")),
			},
			["-S", target, "-p", _, "-X", "stuff", _] | ["send-keys", "-t", target, "-l", _] => {
				match sessions.resolve(target) {
					Some(_) => exited(0, String::new(), String::new()),
					None => exited(1, String::new(), format!("no session: {target}")),
				}
			}
			_ if invocation.completion == Completion::Detached => ProcessExit::Detached { pid: Some(4242) },
			_ => exited(0, String::new(), String::new()),
		}
	}
}

#[async_trait]
impl ProcessRunner for MockRunner {
	async fn run(&self, invocation: &Invocation) -> io::Result<ProcessExit> {
		self.invocations.lock().push(invocation.clone());

		if let Some(gate) = self.gate_for(invocation) {
			gate.pass().await;
		}

		match self.scripted(invocation) {
			Some(ScriptedExit::Exit { code, stderr }) => Ok(ProcessExit::Exited {
				code,
				stdout: String::new(),
				stderr,
			}),
			Some(ScriptedExit::SpawnError(message)) => Err(io::Error::new(io::ErrorKind::NotFound, message)),
			Some(ScriptedExit::Panic(message)) => panic!("{message}"),
			None => Ok(self.default_exit(invocation)),
		}
	}
}

fn exited(code: i32, stdout: String, stderr: String) -> ProcessExit {
	ProcessExit::Exited {
		code: Some(code),
		stdout,
		stderr,
	}
}

fn owned(needles: &[&str]) -> Vec<String> {
	needles.iter().map(|needle| needle.to_string()).collect()
}
