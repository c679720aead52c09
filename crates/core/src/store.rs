//! Backup-first persistence of the registry file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::session::now_ts;

/// Registry file used when no path is configured.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Outcome of [`load_registry`].
///
/// Loading never fails outright: on any problem the registry is empty and
/// `error` says why, so the caller can surface it and decide whether saving
/// over the file is safe.
#[derive(Debug, Default)]
pub struct Loaded {
	pub registry: Registry,
	pub error: Option<Error>,
}

impl Loaded {
	pub fn is_ok(&self) -> bool {
		self.error.is_none()
	}
}

/// Outcome of [`save_registry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Saved {
	/// Copy of the previous file, when there was one.
	pub backup: Option<PathBuf>,
}

pub fn load_registry(path: impl AsRef<Path>) -> Loaded {
	let path = path.as_ref();
	match try_load(path) {
		Ok(Some(registry)) => {
			debug!(target = "remconn.store", path = %path.display(), connections = registry.len(), "registry loaded");
			Loaded { registry, error: None }
		}
		Ok(None) => {
			debug!(target = "remconn.store", path = %path.display(), "no registry file; starting empty");
			Loaded::default()
		}
		Err(err) => {
			warn!(target = "remconn.store", path = %path.display(), error = %err, "registry could not be loaded");
			Loaded {
				registry: Registry::new(),
				error: Some(err),
			}
		}
	}
}

fn try_load(path: &Path) -> Result<Option<Registry>> {
	let content = match fs::read_to_string(path) {
		Ok(content) => content,
		Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
		Err(source) => {
			return Err(Error::Read {
				path: path.to_path_buf(),
				source,
			});
		}
	};

	let value: Value = serde_json::from_str(&content).map_err(|source| Error::Parse {
		path: path.to_path_buf(),
		source,
	})?;

	Registry::from_value(value).map(Some).map_err(|issue| Error::Structure {
		path: path.to_path_buf(),
		issue,
	})
}

/// Writes `registry` to `path` in full, backing up any existing file first.
///
/// The new content goes to a sibling temp file that is renamed over `path`,
/// so a failed write leaves the previous file intact alongside its backup.
pub fn save_registry(path: impl AsRef<Path>, registry: &Registry) -> Result<Saved> {
	let path = path.as_ref();
	let write_err = |source: io::Error| Error::Write {
		path: path.to_path_buf(),
		source,
	};

	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(write_err)?;
	}

	let backup = if path.exists() {
		let target = backup_path(path, now_ts());
		fs::copy(path, &target).map_err(write_err)?;
		debug!(target = "remconn.store", backup = %target.display(), "previous registry backed up");
		Some(target)
	} else {
		None
	};

	let mut content = serde_json::to_string_pretty(registry).map_err(|err| write_err(io::Error::other(err)))?;
	content.push('\n');

	let temp = temp_path(path);
	if let Err(err) = fs::write(&temp, content).and_then(|()| fs::rename(&temp, path)) {
		let _ = fs::remove_file(&temp);
		return Err(write_err(err));
	}

	info!(target = "remconn.store", path = %path.display(), connections = registry.len(), "registry saved");
	Ok(Saved { backup })
}

/// First free `<path>.bak.<timestamp>[.<n>]`.
pub fn backup_path(path: &Path, timestamp: u64) -> PathBuf {
	let base = with_suffix(path, &format!(".bak.{timestamp}"));
	if !base.exists() {
		return base;
	}
	(1u32..)
		.map(|n| with_suffix(path, &format!(".bak.{timestamp}.{n}")))
		.find(|candidate| !candidate.exists())
		.unwrap_or(base)
}

fn temp_path(path: &Path) -> PathBuf {
	with_suffix(path, &format!(".tmp.{}", std::process::id()))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
	let mut name = path.as_os_str().to_os_string();
	name.push(suffix);
	PathBuf::from(name)
}
