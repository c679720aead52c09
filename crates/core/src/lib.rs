//! remconn core: named remote-access commands launched as detached sessions.
//!
//! This crate holds everything below the user-facing surface:
//!
//! - **Registry**: the validated category → connection → command mapping
//! - **Strategy**: pure, per-platform launch planning
//! - **Runner**: the process boundary (real processes or a scripted mock)
//! - **Worker**: one launch attempt, executed off the caller's task
//! - **Tracker**: dispatches workers and routes their reports as events
//! - **Store**: backup-first load/save of the registry file
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  command   ┌─────────┐  spawn   ┌────────┐  steps  ┌────────┐
//! │ Registry ├───────────►│ Tracker ├─────────►│ Worker ├────────►│ Runner │
//! └────▲─────┘            └──▲───┬──┘          └───┬────┘         └────────┘
//!      │ load/save           │   │ events          │ plan
//! ┌────┴─────┐      reports  │   ▼            ┌────▼─────┐
//! │  Store   │  ─────────────┘  caller        │ Strategy │
//! └──────────┘                                └──────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use remconn::{LaunchSettings, SessionTracker, SystemRunner, TrackerEvent, store};
//!
//! #[tokio::main]
//! async fn main() {
//!     let loaded = store::load_registry("config.json");
//!     let (tracker, mut events) = SessionTracker::new(Arc::new(SystemRunner), LaunchSettings::default());
//!     tracker.request_launch(&loaded.registry, "Lab", "db1").unwrap();
//!     drop(tracker);
//!
//!     while let Some(event) = events.recv().await {
//!         if let TrackerEvent::Completed { name, message, .. } = event {
//!             println!("{name}: {message}");
//!         }
//!     }
//! }
//! ```

pub mod error;
pub mod registry;
pub mod runner;
pub mod session;
pub mod settings;
pub mod store;
pub mod strategy;
pub mod testing;
pub mod tracker;
pub mod worker;

pub use error::{Error, ErrorKind, Result, StructureIssue};
pub use registry::{Connection, ConnectionUpdate, DEFAULT_CATEGORIES, Registry, Removal};
pub use runner::{Completion, Invocation, ProcessExit, ProcessRunner, SystemRunner};
pub use session::{Session, SessionId, SessionState};
pub use settings::{LaunchSettings, ShellSpec, Toolchain};
pub use strategy::{
	LaunchPlan, LaunchPlanInput, LaunchStep, Multiplexer, OsFamily, SessionProbe, SessionTarget, StepKind, resolve_launch_plan,
};
pub use tracker::{HISTORY_LIMIT, SessionTracker, TrackerEvent, TrackerEvents};
pub use worker::{SessionWorker, WorkerReport};
