use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::progress::StepPlan;

/// Callable work unit. Runs on a blocking thread; a returned `Err` (or a
/// panic) is captured as the task's error, never propagated.
pub type TaskFn = Box<dyn FnOnce() -> anyhow::Result<Value> + Send + 'static>;

/// One unit of orchestrated work.
///
/// A closed sum type: there is no "unrecognized" shape to normalize away,
/// and therefore no silent fallback; malformed specifications fail at
/// compile time.
pub enum TaskSpec {
    /// A shell command line, run through the command executor.
    Command(String),
    /// A plain callable producing a value.
    Callable(TaskFn),
    /// A weighted multi-step definition reporting progress as it goes.
    Steps(StepPlan),
}

impl TaskSpec {
    pub fn command(line: impl Into<String>) -> Self {
        Self::Command(line.into())
    }

    pub fn callable<F>(f: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<Value> + Send + 'static,
    {
        Self::Callable(Box::new(f))
    }

    pub fn steps(plan: StepPlan) -> Self {
        Self::Steps(plan)
    }
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(line) => f.debug_tuple("Command").field(line).finish(),
            Self::Callable(_) => f.write_str("Callable(..)"),
            Self::Steps(plan) => f
                .debug_struct("Steps")
                .field("task_name", &plan.task_name())
                .field("len", &plan.len())
                .finish(),
        }
    }
}

/// Outcome of one orchestrated task. Created at the completion, timeout or
/// abnormal-termination boundary; immutable thereafter.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub task_name: String,
    /// The callable's return value, or the command output on success.
    /// `None` on failure by convention.
    pub result: Option<Value>,
    pub duration_ms: u64,
    pub success: bool,
    /// Invariant: `success == false` whenever this is `Some`.
    pub error: Option<String>,
}

impl TaskResult {
    pub fn ok(task_name: impl Into<String>, result: Value, duration_ms: u64) -> Self {
        Self {
            task_name: task_name.into(),
            result: Some(result),
            duration_ms,
            success: true,
            error: None,
        }
    }

    pub fn failed(
        task_name: impl Into<String>,
        error: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            task_name: task_name.into(),
            result: None,
            duration_ms,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Aggregated outcome of one batch. `results` preserves submission order,
/// not completion order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub results: Vec<TaskResult>,
    /// Wall clock of the whole batch, first submission to last completion.
    pub total_duration_ms: u64,
    pub all_success: bool,
}

/// Batch execution options. Unset fields fall back to the engine config.
#[derive(Debug, Clone, Default)]
pub struct RunOpts {
    /// Per-task upper bound in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Concurrency ceiling for this batch.
    pub max_concurrency: Option<usize>,
    /// Terminate the host process after a failed batch (the batch result is
    /// still fully computed and logged first).
    pub halt_on_failure: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn result_constructors_uphold_the_invariant() {
        let ok = TaskResult::ok("a", json!(1), 5);
        assert!(ok.success);
        assert!(ok.error.is_none());
        assert_eq!(ok.result, Some(json!(1)));

        let failed = TaskResult::failed("b", "broke", 7);
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("broke"));
        assert!(failed.result.is_none());
    }

    #[test]
    fn spec_debug_does_not_require_closure_introspection() {
        let spec = TaskSpec::callable(|| Ok(json!(null)));
        assert_eq!(format!("{spec:?}"), "Callable(..)");
    }
}
