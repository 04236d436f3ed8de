//! Progress model for long-running tasks.
//!
//! [`Progress`] is a plain value: every transformation replaces fields in
//! place and there is no hidden shared state. Concurrent producers never
//! touch the same record: each task owns a [`ProgressHandle`] that emits
//! snapshots onto one channel, and a single dispatcher consumes them.

mod handle;
mod steps;
mod tracker;
mod types;

pub use handle::ProgressHandle;
pub use steps::{StepContext, StepPlan, RESULT_KEY};
pub use tracker::ProgressUpdate;
pub use types::{Progress, ProgressDisplay, ProgressStatus};
