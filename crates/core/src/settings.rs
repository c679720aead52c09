//! Launch settings: target platform and the binaries plans are rendered with.

use serde::Serialize;

use crate::strategy::{Multiplexer, OsFamily};

/// Command interpreter used for shell plans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShellSpec {
	pub program: String,
	/// Arguments placed before the command string.
	pub args: Vec<String>,
}

impl ShellSpec {
	/// Platform default: `%COMSPEC% /C` on windows, `sh -c` elsewhere.
	pub fn platform_default() -> Self {
		if cfg!(windows) {
			Self {
				program: std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string()),
				args: vec!["/C".to_string()],
			}
		} else {
			Self {
				program: "sh".to_string(),
				args: vec!["-c".to_string()],
			}
		}
	}
}

impl Default for ShellSpec {
	fn default() -> Self {
		Self::platform_default()
	}
}

/// External binaries used to render launch plans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Toolchain {
	pub multiplexer: Multiplexer,
	/// Replaces the multiplexer's default binary name when set.
	pub multiplexer_program: Option<String>,
	pub shell: ShellSpec,
}

impl Toolchain {
	pub fn multiplexer_program(&self) -> &str {
		self.multiplexer_program
			.as_deref()
			.unwrap_or_else(|| self.multiplexer.program())
	}
}

/// Everything a tracker needs to turn a command into a launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchSettings {
	pub os: OsFamily,
	pub toolchain: Toolchain,
}

impl Default for LaunchSettings {
	fn default() -> Self {
		Self {
			os: OsFamily::current(),
			toolchain: Toolchain::default(),
		}
	}
}

impl LaunchSettings {
	pub fn with_os(mut self, os: OsFamily) -> Self {
		self.os = os;
		self
	}

	pub fn with_multiplexer(mut self, multiplexer: Multiplexer) -> Self {
		self.toolchain.multiplexer = multiplexer;
		self
	}

	pub fn with_multiplexer_program(mut self, program: Option<String>) -> Self {
		self.toolchain.multiplexer_program = program;
		self
	}
}
