//! Single-command execution: spawn, observe, timeout, terminate.
//!
//! The entry point is [`CommandExecutor`]. A command is described by a
//! [`CommandSpec`] (shell line or argv vector) and always comes back as a
//! [`CommandResult`], spawn failure, timeout and nonzero exit included.
//! Only the inability to allocate a process channel at all escapes as an
//! error.

mod capture;
mod channel;
mod executor;
mod types;

pub use executor::CommandExecutor;
pub use types::{CommandResult, CommandSpec, ExecuteOpts};
