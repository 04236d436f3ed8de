use tokio::sync::mpsc;

use super::tracker::ProgressUpdate;
use super::types::{Progress, ProgressStatus};

/// Per-task progress emitter.
///
/// Owns one task's [`Progress`] record and sends a snapshot down the batch
/// channel after every transformation. The sender is sync, so handles work
/// from blocking callables as well as async workers. A handle without a
/// channel is a no-op sink, mirroring a disabled monitor.
#[derive(Debug)]
pub struct ProgressHandle {
    state: Progress,
    tx: Option<mpsc::UnboundedSender<Progress>>,
}

impl ProgressHandle {
    pub fn new(state: Progress, tx: mpsc::UnboundedSender<Progress>) -> Self {
        Self {
            state,
            tx: Some(tx),
        }
    }

    pub fn disabled(state: Progress) -> Self {
        Self { state, tx: None }
    }

    pub fn snapshot(&self) -> &Progress {
        &self.state
    }

    /// Emit the current (usually Pending) snapshot without transforming it.
    pub fn emit_current(&self) {
        self.emit();
    }

    pub fn start(&mut self) {
        self.state.start();
        self.emit();
    }

    pub fn update(&mut self, update: ProgressUpdate) {
        self.state.update(update);
        self.emit();
    }

    /// Step update: percentage plus current-step label in one call.
    pub fn update_step(&mut self, percentage: f64, step: impl Into<String>) {
        self.update(ProgressUpdate {
            status: Some(ProgressStatus::Running),
            percentage: Some(percentage),
            step: Some(step.into()),
            ..Default::default()
        });
    }

    pub fn complete(&mut self) {
        self.state.complete();
        self.emit();
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.state.fail(reason);
        self.emit();
    }

    /// Detached copy sharing the same channel. Used by the orchestrator to
    /// report a timeout after the worker's own handle went down with the
    /// abandoned future.
    pub(crate) fn fork(&self) -> ProgressHandle {
        ProgressHandle {
            state: self.state.clone(),
            tx: self.tx.clone(),
        }
    }

    /// Forward a snapshot produced elsewhere, typically relayed from a
    /// blocking worker's private channel. The local record is not touched.
    pub(crate) fn forward(&self, snapshot: Progress) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(snapshot);
        }
    }

    /// Trailing Cancelled notification; does not transition the record.
    pub fn notify_cancelled(&self) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(self.state.as_cancelled());
        }
    }

    fn emit(&self) {
        if let Some(tx) = &self.tx {
            // A departed consumer is not this task's problem.
            let _ = tx.send(self.state.clone());
        }
    }
}
