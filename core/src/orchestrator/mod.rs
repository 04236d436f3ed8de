//! Batch execution of heterogeneous tasks under bounded concurrency.
//!
//! A batch is a list of `(name, TaskSpec)` pairs. Workers draw from a
//! semaphore-bounded pool, every outcome is reduced to a [`TaskResult`], and
//! the aggregated [`BatchResult`] preserves submission order regardless of
//! completion order.

mod background;
mod engine;
mod types;

pub use background::{BackgroundStatus, BackgroundTasks, TaskHandle};
pub use engine::Orchestrator;
pub use types::{BatchResult, RunOpts, TaskFn, TaskResult, TaskSpec};
