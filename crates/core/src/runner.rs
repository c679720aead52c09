//! Process boundary for plan execution.
//!
//! Workers never spawn processes directly; they go through a
//! [`ProcessRunner`] so plans can be exercised without touching the system
//! (see [`crate::testing::MockRunner`]).

use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const PIPE_GRACE: Duration = Duration::from_millis(250);

/// Whether a step waits for its process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
	/// Wait for exit; a non-zero status is a failure.
	Checked,
	/// Start the process and move on; its exit status is not inspected.
	Detached,
}

/// A single external command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
	pub program: String,
	pub args: Vec<String>,
	pub completion: Completion,
}

impl std::fmt::Display for Invocation {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.program)?;
		for arg in &self.args {
			if arg.is_empty() || arg.contains(char::is_whitespace) {
				write!(f, " {arg:?}")?;
			} else {
				write!(f, " {arg}")?;
			}
		}
		Ok(())
	}
}

/// Observable result of running an [`Invocation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessExit {
	/// Checked invocation ran to completion.
	Exited {
		code: Option<i32>,
		stdout: String,
		stderr: String,
	},
	/// Detached invocation was started.
	Detached { pid: Option<u32> },
}

impl ProcessExit {
	pub fn success(&self) -> bool {
		match self {
			ProcessExit::Exited { code, .. } => *code == Some(0),
			ProcessExit::Detached { .. } => true,
		}
	}
}

/// Executes invocations on behalf of a worker.
///
/// An `Err` means the process could not be started; anything the process
/// itself reports comes back as a [`ProcessExit`].
#[async_trait]
pub trait ProcessRunner: Send + Sync {
	async fn run(&self, invocation: &Invocation) -> io::Result<ProcessExit>;
}

/// Runner backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
	async fn run(&self, invocation: &Invocation) -> io::Result<ProcessExit> {
		let mut cmd = Command::new(&invocation.program);
		cmd.args(&invocation.args);

		match invocation.completion {
			Completion::Checked => {
				cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
				let mut child = cmd.spawn()?;
				let stdout = tokio::spawn(read_pipe(child.stdout.take()));
				let stderr = tokio::spawn(read_pipe(child.stderr.take()));
				let status = child.wait().await?;

				let stdout = collect(stdout, &invocation.program, "stdout").await;
				let stderr = collect(stderr, &invocation.program, "stderr").await;
				debug!(target = "remconn.runner", %invocation, code = ?status.code(), "process exited");
				Ok(ProcessExit::Exited {
					code: status.code(),
					stdout,
					stderr,
				})
			}
			Completion::Detached => {
				let mut child = cmd.spawn()?;
				let pid = child.id();
				debug!(target = "remconn.runner", %invocation, ?pid, "process detached");

				// Reap in the background so a detached launch never leaves a zombie.
				let program = invocation.program.clone();
				tokio::spawn(async move {
					match child.wait().await {
						Ok(status) => {
							debug!(target = "remconn.runner", %program, ?pid, code = ?status.code(), "detached process exited")
						}
						Err(err) => warn!(target = "remconn.runner", %program, ?pid, error = %err, "failed waiting on detached process"),
					}
				});
				Ok(ProcessExit::Detached { pid })
			}
		}
	}
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
	let mut output = String::new();
	if let Some(mut pipe) = pipe {
		if let Err(err) = pipe.read_to_string(&mut output).await {
			warn!(target = "remconn.runner", error = %err, "failed reading child output");
		}
	}
	output
}

/// Waits briefly for a pipe reader after the child exited.
///
/// A daemonizing child (screen -dm) may keep the pipe open after exit.
async fn collect(mut reader: JoinHandle<String>, program: &str, stream: &'static str) -> String {
	match tokio::time::timeout(PIPE_GRACE, &mut reader).await {
		Ok(Ok(output)) => output,
		Ok(Err(err)) => {
			warn!(target = "remconn.runner", %program, stream, error = %err, "pipe reader failed");
			String::new()
		}
		Err(_) => {
			reader.abort();
			debug!(target = "remconn.runner", %program, stream, "pipe still open after exit; not waiting");
			String::new()
		}
	}
}
