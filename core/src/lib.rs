//! taskfan-core: bounded-concurrency task execution.
//!
//! Fan out many independent operations (shell commands or callables) and
//! collect structured, uniform outcomes instead of raw process output.
//!
//! # Architecture
//!
//! ```text
//! Vec<(name, TaskSpec)>
//!   ↓
//! Orchestrator::run_parallel()      bounded worker pool (Semaphore)
//!   ↓                               per-task timeout, fault capture
//! Vec<TaskResult>  → BatchResult    submission-order aggregation
//! ```
//!
//! Commands go through [`command::CommandExecutor`], which reduces spawn
//! failure, timeout and nonzero exit alike to a [`command::CommandResult`].
//! Long-running tasks report through the [`progress`] model: per-task
//! [`progress::ProgressHandle`]s emit snapshots onto one channel consumed by
//! a single dispatcher. [`terminate::ProcessTerminator`] escalates TERM →
//! grace → KILL per process name.

pub mod command;
pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod progress;
pub mod terminate;
pub mod util;

pub use command::{CommandExecutor, CommandResult, CommandSpec, ExecuteOpts};
pub use config::{ExecConfig, LoggingConfig};
pub use error::ExecError;
pub use orchestrator::{
    BackgroundTasks, BatchResult, Orchestrator, RunOpts, TaskHandle, TaskResult, TaskSpec,
};
pub use progress::{Progress, ProgressHandle, ProgressStatus, StepPlan};
pub use terminate::{KillStatus, ProcessTerminator};
