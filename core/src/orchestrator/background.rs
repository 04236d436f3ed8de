use std::collections::HashMap;

use tokio::task::JoinHandle;

use super::engine::Orchestrator;
use super::types::{RunOpts, TaskResult, TaskSpec};

/// Opaque key into a [`BackgroundTasks`] arena. Not cloneable: stopping a
/// task consumes its handle.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

/// Liveness report for a running background task.
#[derive(Debug, Clone, Copy)]
pub struct BackgroundStatus<'a> {
    pub name: &'a str,
    pub finished: bool,
}

struct Entry {
    name: String,
    join: JoinHandle<TaskResult>,
}

/// Explicit handle map for named background tasks.
///
/// The arena is owned by the caller; there is no process-wide registry and
/// no ambient lookup by name. `start` returns a handle, `stop` consumes it.
pub struct BackgroundTasks {
    orchestrator: Orchestrator,
    next_id: u64,
    entries: HashMap<u64, Entry>,
}

impl BackgroundTasks {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            next_id: 1,
            entries: HashMap::new(),
        }
    }

    /// Spawn one supervised task and return its handle.
    pub fn start(&mut self, name: impl Into<String>, spec: TaskSpec, opts: RunOpts) -> TaskHandle {
        let name = name.into();
        let orchestrator = self.orchestrator.clone();
        let task_name = name.clone();
        let join = tokio::spawn(async move { orchestrator.run_single(task_name, spec, opts).await });

        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, Entry { name, join });
        TaskHandle(id)
    }

    /// Stop (or reap) the task behind `handle`, consuming it.
    ///
    /// A still-running task is aborted and reported as cancelled; a finished
    /// one yields its real result. `None` means the handle was not started
    /// by this arena.
    pub async fn stop(&mut self, handle: TaskHandle) -> Option<TaskResult> {
        let entry = self.entries.remove(&handle.0)?;
        if !entry.join.is_finished() {
            entry.join.abort();
        }
        match entry.join.await {
            Ok(result) => Some(result),
            Err(_) => Some(TaskResult::failed(entry.name, "task cancelled", 0)),
        }
    }

    pub fn get(&self, handle: &TaskHandle) -> Option<BackgroundStatus<'_>> {
        self.entries.get(&handle.0).map(|entry| BackgroundStatus {
            name: &entry.name,
            finished: entry.join.is_finished(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn arena() -> BackgroundTasks {
        BackgroundTasks::new(Orchestrator::with_default_config())
    }

    #[tokio::test]
    async fn start_then_stop_returns_the_result() {
        let mut tasks = arena();
        let handle = tasks.start(
            "quick",
            TaskSpec::callable(|| Ok(json!("done"))),
            RunOpts::default(),
        );

        // Let it finish before reaping.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let result = tasks.stop(handle).await.unwrap();
        assert!(result.success);
        assert_eq!(result.result, Some(json!("done")));
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn stopping_a_running_task_reports_cancellation() {
        let mut tasks = arena();
        let handle = tasks.start(
            "sleeper",
            TaskSpec::command("sleep 30"),
            RunOpts::default(),
        );

        let status = tasks.get(&handle).unwrap();
        assert_eq!(status.name, "sleeper");

        let result = tasks.stop(handle).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("task cancelled"));
    }

    #[tokio::test]
    async fn unknown_handles_yield_none() {
        let mut tasks = arena();
        let foreign = TaskHandle(999);
        assert!(tasks.get(&foreign).is_none());
        assert!(tasks.stop(foreign).await.is_none());
    }
}
