
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use remconn::store::DEFAULT_CONFIG_FILE;
use remconn::{Multiplexer, OsFamily};

use crate::output::OutputFormat;
use crate::styles::cli_styles;

/// Root CLI for remconn.
#[derive(Parser, Debug)]
#[command(name = "remconn")]
#[command(about = "Store named remote-access commands and launch them as detached sessions")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: text (default), json, or ndjson
	#[arg(short = 'f', long, global = true, value_enum, default_value = "text")]
	pub format: OutputFormat,

	/// Connection registry file
	#[arg(long, global = true, value_name = "FILE", env = "REMCONN_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
	pub config: PathBuf,

	/// Terminal multiplexer used on unix-like systems
	#[arg(long, global = true, value_enum, env = "REMCONN_MULTIPLEXER", default_value = "screen")]
	pub multiplexer: CliMultiplexer,

	/// Multiplexer binary to run instead of the default for --multiplexer
	#[arg(long, global = true, value_name = "PATH", env = "REMCONN_MULTIPLEXER_BIN")]
	pub multiplexer_bin: Option<String>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// List categories and their connections.
	List(ListArgs),
	/// Show one connection.
	Show(ConnectionRef),
	/// Print the launch plan for a connection without running it.
	Plan(PlanArgs),
	/// Launch one or more connections of a category as detached sessions.
	Launch(LaunchArgs),
	/// Add a connection, creating its category if needed.
	Add(AddArgs),
	/// Rename, move, or re-command a connection.
	Edit(EditArgs),
	/// Remove a connection.
	#[command(visible_alias = "remove")]
	Rm(RemoveArgs),
	/// Manage categories.
	#[command(subcommand)]
	Category(CategoryAction),
}

impl Commands {
	/// Name reported in the output envelope.
	pub fn name(&self) -> &'static str {
		match self {
			Commands::List(_) => "list",
			Commands::Show(_) => "show",
			Commands::Plan(_) => "plan",
			Commands::Launch(_) => "launch",
			Commands::Add(_) => "add",
			Commands::Edit(_) => "edit",
			Commands::Rm(_) => "rm",
			Commands::Category(_) => "category",
		}
	}
}

#[derive(Args, Debug, Clone)]
pub struct ConnectionRef {
	#[arg(value_name = "CATEGORY")]
	pub category: String,
	#[arg(value_name = "NAME")]
	pub name: String,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
	/// Only list this category.
	#[arg(value_name = "CATEGORY")]
	pub category: Option<String>,

	/// Case-insensitive substring filter on connection names.
	#[arg(long, value_name = "TEXT")]
	pub filter: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
	#[command(flatten)]
	pub target: ConnectionRef,

	/// Plan for this platform instead of the current one.
	#[arg(long, value_enum)]
	pub os: Option<CliOsFamily>,
}

#[derive(Args, Debug, Clone)]
pub struct LaunchArgs {
	#[arg(value_name = "CATEGORY")]
	pub category: String,

	#[arg(value_name = "NAME", required = true, num_args = 1..)]
	pub names: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
	#[command(flatten)]
	pub target: ConnectionRef,

	/// Command line to run for this connection.
	#[arg(long = "cmd", value_name = "COMMAND", allow_hyphen_values = true)]
	pub command: String,

	/// Replace an existing connection with the same name.
	#[arg(long)]
	pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
	#[command(flatten)]
	pub target: ConnectionRef,

	/// Move the connection to another category.
	#[arg(long, value_name = "CATEGORY")]
	pub to_category: Option<String>,

	/// New connection name.
	#[arg(long, value_name = "NAME")]
	pub rename: Option<String>,

	/// New command line.
	#[arg(long = "cmd", value_name = "COMMAND", allow_hyphen_values = true)]
	pub command: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RemoveArgs {
	#[command(flatten)]
	pub target: ConnectionRef,

	/// Also remove the category when this was its last connection.
	#[arg(long)]
	pub prune: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CategoryAction {
	/// Create an empty category.
	Add {
		#[arg(value_name = "NAME")]
		name: String,
	},
	/// Delete a category and every connection in it.
	Rm {
		#[arg(value_name = "NAME")]
		name: String,
	},
}

/// Terminal multiplexer (CLI wrapper for remconn::Multiplexer)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum CliMultiplexer {
	/// GNU screen
	#[default]
	Screen,
	/// tmux
	Tmux,
}

impl From<CliMultiplexer> for Multiplexer {
	fn from(multiplexer: CliMultiplexer) -> Self {
		match multiplexer {
			CliMultiplexer::Screen => Multiplexer::Screen,
			CliMultiplexer::Tmux => Multiplexer::Tmux,
		}
	}
}

/// Platform family (CLI wrapper for remconn::OsFamily)
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CliOsFamily {
	Windows,
	Unix,
}

impl From<CliOsFamily> for OsFamily {
	fn from(os: CliOsFamily) -> Self {
		match os {
			CliOsFamily::Windows => OsFamily::Windows,
			CliOsFamily::Unix => OsFamily::Unix,
		}
	}
}
