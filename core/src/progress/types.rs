use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ProgressStatus {
    /// Terminal states do not transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Progress record for one long-running task.
///
/// State machine: Pending → Running → {Completed | Failed | Cancelled}.
/// Running re-enters Running any number of times for step updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub task_id: u64,
    pub task_name: String,
    pub task_index: Option<usize>,
    pub status: ProgressStatus,
    /// Percentage in [0, 100]; the update primitive owns clamping.
    pub progress: f64,
    pub current_step: String,
    pub step_progress: f64,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub estimated_completion: Option<DateTime<Utc>>,
    /// Merged (never replaced) on update.
    pub metadata: Map<String, Value>,
}

/// Display-oriented snapshot derived from a [`Progress`] record.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressDisplay {
    pub task_id: u64,
    pub task_name: String,
    pub status: ProgressStatus,
    pub progress: f64,
    pub current_step: String,
    pub duration_ms: u64,
    /// `None` unless the task is strictly between 0 and 100 percent and an
    /// estimate exists.
    pub estimated_seconds_remaining: Option<u64>,
}
