use std::sync::Arc;
use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinError;
use tokio::time::Instant;
use uuid::Uuid;

use crate::command::{CommandExecutor, CommandSpec, ExecuteOpts};
use crate::config::ExecConfig;
use crate::error::ExecError;
use crate::progress::{Progress, ProgressHandle};

use super::types::{BatchResult, RunOpts, TaskResult, TaskSpec};

/// Runs batches of heterogeneous tasks under a concurrency ceiling.
///
/// Every failure mode (nonzero exit, timeout, callable fault or panic) lands
/// in a [`TaskResult`]; nothing propagates past the orchestrator under
/// normal operation.
#[derive(Clone)]
pub struct Orchestrator {
    cfg: Arc<ExecConfig>,
    executor: CommandExecutor,
}

impl Orchestrator {
    pub fn new(cfg: Arc<ExecConfig>) -> Self {
        let executor = CommandExecutor::new(cfg.clone());
        Self { cfg, executor }
    }

    pub fn with_default_config() -> Self {
        Self::new(Arc::new(ExecConfig::default()))
    }

    pub fn config(&self) -> &ExecConfig {
        &self.cfg
    }

    /// Run a batch. The result sequence preserves submission order no matter
    /// which task finished first; `all_success` is computed only after every
    /// item has a terminal outcome.
    ///
    /// With `halt_on_failure`, a failed batch terminates the host process,
    /// after the batch result has been fully computed and logged.
    pub async fn run_parallel(
        &self,
        tasks: Vec<(String, TaskSpec)>,
        opts: RunOpts,
    ) -> BatchResult {
        let batch = self.run_batch(tasks, &opts, None).await;
        self.maybe_halt(&opts, &batch);
        batch
    }

    /// Like [`run_parallel`](Self::run_parallel), but progress events from
    /// all tasks flow over one channel into `on_progress`, invoked by a
    /// single dispatcher; workers never call the consumer directly. An
    /// initial Pending snapshot is emitted for every task before work
    /// begins. The `Result` leaves room for a future error variant.
    pub async fn run_with_progress<F>(
        &self,
        tasks: Vec<(String, TaskSpec)>,
        opts: RunOpts,
        mut on_progress: F,
    ) -> Result<Vec<TaskResult>, ExecError>
    where
        F: FnMut(Progress) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Progress>();
        let dispatcher = tokio::spawn(async move {
            while let Some(p) = rx.recv().await {
                on_progress(p);
            }
        });

        let batch = self.run_batch(tasks, &opts, Some(tx)).await;
        // All handle clones are gone once the batch is done, so the
        // dispatcher drains and exits on its own.
        let _ = dispatcher.await;

        self.maybe_halt(&opts, &batch);
        Ok(batch.results)
    }

    /// Degenerate one-task case with its own (shorter) default timeout. The
    /// reported duration covers the full wrapper, not just the inner work.
    pub async fn run_single(
        &self,
        name: impl Into<String>,
        spec: TaskSpec,
        opts: RunOpts,
    ) -> TaskResult {
        let name = name.into();
        let timeout_ms = opts.timeout_ms.unwrap_or(self.cfg.single_task_timeout_ms);
        let started = Instant::now();

        let handle = ProgressHandle::disabled(Progress::new(&name));
        let work = self.execute_spec(name.clone(), spec, handle);

        let mut result = match tokio::time::timeout(Duration::from_millis(timeout_ms), work).await
        {
            Ok(result) => result,
            Err(_) => TaskResult::failed(
                &name,
                format!("Task '{name}' timed out after {timeout_ms}ms"),
                0,
            ),
        };
        result.duration_ms = started.elapsed().as_millis() as u64;

        log_task(&result);
        result
    }

    async fn run_batch(
        &self,
        tasks: Vec<(String, TaskSpec)>,
        opts: &RunOpts,
        progress_tx: Option<mpsc::UnboundedSender<Progress>>,
    ) -> BatchResult {
        let run_id = Uuid::new_v4();
        let timeout_ms = opts.timeout_ms.unwrap_or(self.cfg.task_timeout_ms);
        let max_concurrency = opts
            .max_concurrency
            .unwrap_or(self.cfg.max_concurrency)
            .max(1);
        let total = tasks.len();

        tracing::debug!(run_id = %run_id, total, max_concurrency, "batch started");
        let started = Instant::now();

        // Hand every task its progress handle and emit the initial Pending
        // snapshots before any work is submitted.
        let mut prepared = Vec::with_capacity(total);
        for (index, (name, spec)) in tasks.into_iter().enumerate() {
            let mut state = Progress::new(&name);
            state.task_index = Some(index);
            let handle = match &progress_tx {
                Some(tx) => {
                    let handle = ProgressHandle::new(state, tx.clone());
                    handle.emit_current();
                    handle
                }
                None => ProgressHandle::disabled(state),
            };
            prepared.push((index, name, spec, handle));
        }
        drop(progress_tx);

        let sem = Arc::new(Semaphore::new(max_concurrency));
        let mut futs = FuturesUnordered::new();
        for (index, name, spec, handle) in prepared {
            let sem = sem.clone();
            futs.push(async move {
                let _permit = match sem.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            index,
                            TaskResult::failed(&name, "executor slot unavailable", 0),
                        );
                    }
                };
                let result = self.run_one(name, spec, handle, timeout_ms).await;
                (index, result)
            });
        }

        let mut slots: Vec<Option<TaskResult>> = (0..total).map(|_| None).collect();
        while let Some((index, result)) = futs.next().await {
            log_task(&result);
            slots[index] = Some(result);
        }

        let results: Vec<TaskResult> = slots.into_iter().flatten().collect();
        debug_assert_eq!(results.len(), total);

        let all_success = results.iter().all(|r| r.success);
        let total_duration_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(
            run_id = %run_id,
            total,
            all_success,
            total_duration_ms,
            "batch finished"
        );

        BatchResult {
            results,
            total_duration_ms,
            all_success,
        }
    }

    /// One slot's work: the per-task timeout wraps the whole item. On expiry
    /// the inner future is dropped, not awaited: commands die with their
    /// kill-on-drop child and blocking callables are simply abandoned.
    async fn run_one(
        &self,
        name: String,
        spec: TaskSpec,
        handle: ProgressHandle,
        timeout_ms: u64,
    ) -> TaskResult {
        let started = Instant::now();
        let mut probe = handle.fork();
        let work = self.execute_spec(name.clone(), spec, handle);

        match tokio::time::timeout(Duration::from_millis(timeout_ms), work).await {
            Ok(result) => result,
            Err(_) => {
                let error = format!("Task '{name}' timed out after {timeout_ms}ms");
                probe.fail(error.clone());
                TaskResult::failed(&name, error, started.elapsed().as_millis() as u64)
            }
        }
    }

    async fn execute_spec(
        &self,
        name: String,
        spec: TaskSpec,
        mut handle: ProgressHandle,
    ) -> TaskResult {
        let started = Instant::now();

        match spec {
            TaskSpec::Command(line) => {
                handle.start();
                let spec = CommandSpec::shell(line);
                let result = match self.executor.run(&spec, &ExecuteOpts::default()).await {
                    Ok(cmd) if cmd.success => TaskResult::ok(
                        &name,
                        Value::String(cmd.output),
                        started.elapsed().as_millis() as u64,
                    ),
                    Ok(cmd) => {
                        // The executor's own diagnostic (timeout, spawn
                        // failure) wins; otherwise embed the output.
                        let error = cmd.error.clone().unwrap_or_else(|| {
                            format!(
                                "Command failed (exit {}): {}",
                                cmd.exit_code,
                                cmd.output.trim()
                            )
                        });
                        TaskResult::failed(&name, error, started.elapsed().as_millis() as u64)
                    }
                    Err(e) => {
                        TaskResult::failed(&name, e.to_string(), started.elapsed().as_millis() as u64)
                    }
                };
                finish_progress(&mut handle, &result);
                result
            }
            TaskSpec::Callable(f) => {
                handle.start();
                let outcome = tokio::task::spawn_blocking(f).await;
                let duration_ms = started.elapsed().as_millis() as u64;
                let result = match outcome {
                    Ok(Ok(value)) => TaskResult::ok(&name, value, duration_ms),
                    Ok(Err(err)) => TaskResult::failed(&name, err.to_string(), duration_ms),
                    Err(join_err) => TaskResult::failed(&name, fault_message(join_err), duration_ms),
                };
                finish_progress(&mut handle, &result);
                result
            }
            TaskSpec::Steps(plan) => {
                // The plan drives a private handle on the blocking side,
                // terminal updates included; snapshots are relayed here so
                // that a reclaimed task cannot hold the batch channel open
                // or keep emitting after its deadline.
                let (relay_tx, mut relay_rx) = mpsc::unbounded_channel();
                let mut worker = ProgressHandle::new(handle.snapshot().clone(), relay_tx);
                let mut join =
                    tokio::task::spawn_blocking(move || plan.execute(&mut worker));
                let outcome = loop {
                    tokio::select! {
                        res = &mut join => break res,
                        Some(snap) = relay_rx.recv() => handle.forward(snap),
                    }
                };
                while let Ok(snap) = relay_rx.try_recv() {
                    handle.forward(snap);
                }
                let duration_ms = started.elapsed().as_millis() as u64;
                match outcome {
                    Ok(Ok(value)) => TaskResult::ok(&name, value, duration_ms),
                    Ok(Err(err)) => TaskResult::failed(&name, err.to_string(), duration_ms),
                    Err(join_err) => TaskResult::failed(&name, fault_message(join_err), duration_ms),
                }
            }
        }
    }

    fn maybe_halt(&self, opts: &RunOpts, batch: &BatchResult) {
        if opts.halt_on_failure && !batch.all_success {
            let failed = batch.results.iter().filter(|r| !r.success).count();
            tracing::error!(failed, "halting after batch failure");
            std::process::exit(1);
        }
    }
}

/// Logging collaborator call for one finished task.
fn log_task(result: &TaskResult) {
    tracing::info!(
        task = %result.task_name,
        success = result.success,
        duration_ms = result.duration_ms,
        error = result.error.as_deref().unwrap_or(""),
        "task finished"
    );
}

fn finish_progress(handle: &mut ProgressHandle, result: &TaskResult) {
    if result.success {
        handle.complete();
    } else {
        handle.fail(
            result
                .error
                .clone()
                .unwrap_or_else(|| "task failed".to_string()),
        );
    }
}

/// Abnormal termination of a callable: the fault's message is captured,
/// never re-raised.
fn fault_message(err: JoinError) -> String {
    if err.is_panic() {
        let payload = err.into_panic();
        if let Some(s) = payload.downcast_ref::<String>() {
            format!("task panicked: {s}")
        } else if let Some(s) = payload.downcast_ref::<&'static str>() {
            format!("task panicked: {s}")
        } else {
            "task panicked".to_string()
        }
    } else {
        "task aborted".to_string()
    }
}
