//! remconn command-line front end.
//!
//! Parses commands, resolves the registry file and launch settings, and
//! renders core results through a shared output envelope.

pub mod cli;
pub mod commands;
pub mod context;
pub mod error;
pub mod logging;
pub mod output;
pub mod styles;
