//! Session tracker: dispatches launch workers and routes their reports.
//!
//! The tracker owns the name → [`Session`] map. Each accepted request gets a
//! fresh [`SessionId`] and its own worker task; nothing on the caller's path
//! waits for a process. Worker reports flow through a single router task,
//! which updates the map and re-emits them as [`TrackerEvent`]s.
//!
//! Requests for a name that already has a session supersede the map entry.
//! Probing for and creating a multiplexer session are separate steps, so
//! workers for the same name take turns: a later request waits until the
//! earlier worker has finished, then runs its own probe. Different names
//! never wait on each other.
//!
//! Every worker runs under a supervisor task; a worker that panics is still
//! reported as a failed completion.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::runner::ProcessRunner;
use crate::session::{Session, SessionId, SessionState};
use crate::settings::LaunchSettings;
use crate::worker::{SessionWorker, WorkerReport};

/// Terminal sessions retained for [`SessionTracker::history`].
pub const HISTORY_LIMIT: usize = 64;

/// Notifications delivered to the tracker's consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackerEvent {
	Progress { id: SessionId, name: String, message: String },
	/// Exactly one per accepted launch request.
	Completed {
		id: SessionId,
		name: String,
		message: String,
		success: bool,
	},
}

/// Receiving half of the tracker's event stream.
#[derive(Debug)]
pub struct TrackerEvents {
	rx: UnboundedReceiver<TrackerEvent>,
}

impl TrackerEvents {
	/// Next event, or `None` once the tracker is dropped and every worker has
	/// reported.
	pub async fn recv(&mut self) -> Option<TrackerEvent> {
		self.rx.recv().await
	}
}

#[derive(Default)]
struct TrackerState {
	next_id: u64,
	sessions: HashMap<String, Session>,
	workers: HashMap<SessionId, JoinHandle<()>>,
	/// One turn lock per name with a queued or running worker.
	turns: HashMap<String, Arc<AsyncMutex<()>>>,
	history: VecDeque<Session>,
}

/// Dispatches launch workers and keeps the latest session per name.
///
/// Must be created inside a tokio runtime.
pub struct SessionTracker {
	state: Arc<Mutex<TrackerState>>,
	runner: Arc<dyn ProcessRunner>,
	settings: LaunchSettings,
	reports: UnboundedSender<WorkerReport>,
}

impl SessionTracker {
	pub fn new(runner: Arc<dyn ProcessRunner>, settings: LaunchSettings) -> (Self, TrackerEvents) {
		let (reports_tx, reports_rx) = mpsc::unbounded_channel();
		let (events_tx, events_rx) = mpsc::unbounded_channel();
		let state = Arc::new(Mutex::new(TrackerState::default()));

		tokio::spawn(route_reports(reports_rx, Arc::clone(&state), events_tx));

		let tracker = Self {
			state,
			runner,
			settings,
			reports: reports_tx,
		};
		(tracker, TrackerEvents { rx: events_rx })
	}

	pub fn settings(&self) -> &LaunchSettings {
		&self.settings
	}

	/// Starts a launch of `category`/`name` and returns immediately.
	///
	/// An unknown connection fails here, before any session is recorded or
	/// worker started. The command is copied out of `registry` now; later
	/// edits do not affect this launch.
	pub fn request_launch(&self, registry: &Registry, category: &str, name: &str) -> Result<SessionId> {
		let Some(connection) = registry.get(category, name) else {
			warn!(target = "remconn.tracker", %category, session = %name, "launch requested for unknown connection");
			return Err(Error::ConnectionNotFound {
				category: category.to_string(),
				name: name.to_string(),
			});
		};

		let mut state = self.state.lock();
		let id = SessionId(state.next_id);
		state.next_id += 1;

		let session = Session::new(id, category, name, connection.command.as_str());
		if let Some(previous) = state.sessions.insert(name.to_string(), session.clone()) {
			if !previous.is_terminal() {
				debug!(target = "remconn.tracker", session = %name, superseded = %previous.id, %id, "superseding in-flight session");
			}
		}

		let mut worker_session = session;
		worker_session.start();
		if let Some(entry) = state.sessions.get_mut(name) {
			entry.clone_from(&worker_session);
		}

		let queued = state.turns.get(name).is_some_and(|turn| Arc::strong_count(turn) > 1);
		let turn = Arc::clone(state.turns.entry(name.to_string()).or_default());
		let worker = SessionWorker::new(worker_session, &self.settings);
		let handle = tokio::spawn(supervise(
			worker,
			Arc::clone(&self.runner),
			self.reports.clone(),
			Arc::clone(&self.state),
			turn,
		));
		state.workers.insert(id, handle);
		if queued {
			debug!(target = "remconn.tracker", session = %name, %id, "queued behind earlier launch of the same name");
		}

		info!(target = "remconn.tracker", %category, session = %name, %id, "launch dispatched");
		Ok(id)
	}

	/// Requests each name independently. One failure does not stop the rest.
	pub fn request_launch_many<I, S>(&self, registry: &Registry, category: &str, names: I) -> Vec<Result<SessionId>>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		names
			.into_iter()
			.map(|name| self.request_launch(registry, category, name.as_ref()))
			.collect()
	}

	/// Latest recorded session for `name`.
	pub fn session(&self, name: &str) -> Option<Session> {
		self.state.lock().sessions.get(name).cloned()
	}

	/// All recorded sessions, ordered by name.
	pub fn sessions(&self) -> Vec<Session> {
		let mut sessions: Vec<Session> = self.state.lock().sessions.values().cloned().collect();
		sessions.sort_by(|a, b| a.name.cmp(&b.name));
		sessions
	}

	/// Recently finished sessions, oldest first.
	pub fn history(&self) -> Vec<Session> {
		self.state.lock().history.iter().cloned().collect()
	}

	/// Workers that have not yet reported completion.
	pub fn in_flight(&self) -> usize {
		self.state.lock().workers.len()
	}
}

impl std::fmt::Debug for SessionTracker {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.state.lock();
		f.debug_struct("SessionTracker")
			.field("settings", &self.settings)
			.field("sessions", &state.sessions.len())
			.field("in_flight", &state.workers.len())
			.finish()
	}
}

/// Runs one worker on its name's turn and guarantees a terminal report.
async fn supervise(
	worker: SessionWorker,
	runner: Arc<dyn ProcessRunner>,
	reports: UnboundedSender<WorkerReport>,
	state: Arc<Mutex<TrackerState>>,
	turn: Arc<AsyncMutex<()>>,
) {
	let name = worker.session().name.clone();
	let fallback = worker.session().clone();

	let guard = Arc::clone(&turn).lock_owned().await;
	let worker_reports = reports.clone();
	let run = tokio::spawn(async move {
		worker.run(runner.as_ref(), &worker_reports).await;
	});
	if let Err(err) = run.await {
		report_aborted(&reports, fallback, &err);
	}
	drop(guard);

	let mut state = state.lock();
	// Only the map and this task still hold the lock: nobody is queued.
	if Arc::strong_count(&turn) == 2 {
		state.turns.remove(&name);
	}
}

fn report_aborted(reports: &UnboundedSender<WorkerReport>, mut session: Session, err: &JoinError) {
	warn!(target = "remconn.tracker", session = %session.name, id = %session.id, error = %err, "launch worker stopped without reporting");
	let message = format!("Error connecting to {}: launch worker stopped unexpectedly ({err})", session.name);
	session.finish(false, message);
	if reports.send(WorkerReport::Finished(session)).is_err() {
		debug!(target = "remconn.tracker", "router gone; dropping failure report");
	}
}

async fn route_reports(
	mut reports: UnboundedReceiver<WorkerReport>,
	state: Arc<Mutex<TrackerState>>,
	events: UnboundedSender<TrackerEvent>,
) {
	while let Some(report) = reports.recv().await {
		let event = match report {
			WorkerReport::Progress { id, name, message } => {
				if let Some(current) = state.lock().sessions.get_mut(&name) {
					if current.id == id && current.state == SessionState::Running {
						current.message.clone_from(&message);
					}
				}
				TrackerEvent::Progress { id, name, message }
			}
			WorkerReport::Finished(session) => {
				let event = TrackerEvent::Completed {
					id: session.id,
					name: session.name.clone(),
					message: session.message.clone(),
					success: session.succeeded(),
				};
				if !record_finished(&mut state.lock(), session) {
					continue;
				}
				event
			}
		};

		if events.send(event).is_err() {
			debug!(target = "remconn.tracker", "event receiver dropped");
		}
	}
	debug!(target = "remconn.tracker", "all report senders closed; router stopping");
}

/// Returns `false` for a duplicate report of an already finished worker.
fn record_finished(state: &mut TrackerState, session: Session) -> bool {
	if state.workers.remove(&session.id).is_none() {
		debug!(target = "remconn.tracker", session = %session.name, id = %session.id, "ignoring repeated completion");
		return false;
	}

	state.history.push_back(session.clone());
	while state.history.len() > HISTORY_LIMIT {
		state.history.pop_front();
	}

	// A newer request for this name is queued behind this one; its record stays.
	if let Some(current) = state.sessions.get(&session.name) {
		if current.id > session.id && !current.is_terminal() {
			return true;
		}
	}
	state.sessions.insert(session.name.clone(), session);
	true
}
