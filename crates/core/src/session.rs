//! Runtime records of launch attempts.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Tracker-unique identifier of one launch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "#{}", self.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
	Pending,
	Running,
	Succeeded,
	Failed,
}

impl SessionState {
	pub fn is_terminal(self) -> bool {
		matches!(self, SessionState::Succeeded | SessionState::Failed)
	}
}

/// One launch attempt of a connection.
///
/// `command` is a snapshot taken at request time; editing the connection
/// afterwards does not reach an in-flight session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
	pub id: SessionId,
	pub name: String,
	pub category: String,
	pub command: String,
	pub state: SessionState,
	pub message: String,
	/// Unix epoch seconds.
	pub requested_at: u64,
}

impl Session {
	pub fn new(id: SessionId, category: impl Into<String>, name: impl Into<String>, command: impl Into<String>) -> Self {
		let name = name.into();
		Self {
			id,
			message: format!("Queued launch of {name}"),
			name,
			category: category.into(),
			command: command.into(),
			state: SessionState::Pending,
			requested_at: now_ts(),
		}
	}

	/// Pending → Running. Returns `false` from any other state.
	pub fn start(&mut self) -> bool {
		if self.state != SessionState::Pending {
			return false;
		}
		self.state = SessionState::Running;
		self.message = format!("Connecting to {}...", self.name);
		true
	}

	/// Sets the terminal state. Only the first call has any effect.
	pub fn finish(&mut self, success: bool, message: impl Into<String>) -> bool {
		if self.is_terminal() {
			return false;
		}
		self.state = if success { SessionState::Succeeded } else { SessionState::Failed };
		self.message = message.into();
		true
	}

	pub fn is_terminal(&self) -> bool {
		self.state.is_terminal()
	}

	pub fn succeeded(&self) -> bool {
		self.state == SessionState::Succeeded
	}
}

pub(crate) fn now_ts() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
