use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{Map, Value};

use super::types::{Progress, ProgressDisplay, ProgressStatus};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Field replacements applied by [`Progress::update`]. Unset fields keep
/// their current value.
#[derive(Debug, Clone, Default)]
pub struct ProgressUpdate {
    pub status: Option<ProgressStatus>,
    pub percentage: Option<f64>,
    pub step: Option<String>,
    pub step_progress: Option<f64>,
    pub metadata: Option<Map<String, Value>>,
}

impl Progress {
    /// Fresh Pending record with a monotonic task id.
    pub fn new(task_name: impl Into<String>) -> Self {
        Self::with_id(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed), task_name)
    }

    pub fn with_id(task_id: u64, task_name: impl Into<String>) -> Self {
        Self {
            task_id,
            task_name: task_name.into(),
            task_index: None,
            status: ProgressStatus::Pending,
            progress: 0.0,
            current_step: "Initializing...".to_string(),
            step_progress: 0.0,
            started_at: Utc::now(),
            duration_ms: 0,
            estimated_completion: None,
            metadata: Map::new(),
        }
    }

    /// Apply an update. Terminal records ignore further updates.
    ///
    /// Percentage is clamped to [0, 100] here; the primitive is the single
    /// owner of clamping; callers never pre-clamp. When the task is strictly
    /// between 0 and 100 percent, completion time is estimated by linear
    /// extrapolation of the elapsed time.
    pub fn update(&mut self, update: ProgressUpdate) {
        if self.status.is_terminal() {
            return;
        }

        let now = Utc::now();
        let elapsed_ms = (now - self.started_at).num_milliseconds().max(0);

        self.status = update.status.unwrap_or(ProgressStatus::Running);
        if let Some(pct) = update.percentage {
            self.progress = pct.clamp(0.0, 100.0);
        }
        if let Some(step) = update.step {
            self.current_step = step;
        }
        if let Some(sp) = update.step_progress {
            self.step_progress = sp;
        }
        if let Some(meta) = update.metadata {
            // Merge, never replace: existing keys survive unless overwritten.
            for (k, v) in meta {
                self.metadata.insert(k, v);
            }
        }
        self.duration_ms = elapsed_ms as u64;

        if self.progress > 0.0 && self.progress < 100.0 {
            let total_estimated_ms = elapsed_ms as f64 / (self.progress / 100.0);
            let remaining_ms = (total_estimated_ms - elapsed_ms as f64).max(0.0);
            self.estimated_completion =
                Some(now + ChronoDuration::milliseconds(remaining_ms as i64));
        }
    }

    /// Force the Running state.
    pub fn start(&mut self) {
        self.update(ProgressUpdate {
            status: Some(ProgressStatus::Running),
            percentage: Some(0.0),
            step: Some("Starting...".to_string()),
            ..Default::default()
        });
    }

    /// Force Completed with progress fixed to 100.
    pub fn complete(&mut self) {
        self.update(ProgressUpdate {
            status: Some(ProgressStatus::Completed),
            percentage: Some(100.0),
            step: Some("Completed".to_string()),
            ..Default::default()
        });
    }

    /// Force Failed; progress keeps its last known value.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.update(ProgressUpdate {
            status: Some(ProgressStatus::Failed),
            step: Some(reason.into()),
            ..Default::default()
        });
    }

    /// Derived Cancelled notification. The record itself stays put; this is
    /// a snapshot for consumers, not a state transition.
    pub fn as_cancelled(&self) -> Progress {
        let mut snap = self.clone();
        snap.status = ProgressStatus::Cancelled;
        snap
    }

    /// Display snapshot with a remaining-time estimate when one is
    /// meaningful.
    pub fn format_for_display(&self) -> ProgressDisplay {
        let estimated_seconds_remaining = if self.progress > 0.0 && self.progress < 100.0 {
            self.estimated_completion.map(|eta| {
                let remaining_ms = (eta - Utc::now()).num_milliseconds().max(0) as f64;
                (remaining_ms / 1000.0).round() as u64
            })
        } else {
            None
        };

        ProgressDisplay {
            task_id: self.task_id,
            task_name: self.task_name.clone(),
            status: self.status,
            progress: self.progress,
            current_step: self.current_step.clone(),
            duration_ms: self.duration_ms,
            estimated_seconds_remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_record_is_pending_at_zero() {
        let p = Progress::new("build");
        assert_eq!(p.status, ProgressStatus::Pending);
        assert_eq!(p.progress, 0.0);
        assert_eq!(p.current_step, "Initializing...");
        assert!(p.estimated_completion.is_none());
    }

    #[test]
    fn task_ids_are_monotonic() {
        let a = Progress::new("a");
        let b = Progress::new("b");
        assert!(b.task_id > a.task_id);
    }

    #[test]
    fn update_replaces_fields_and_merges_metadata() {
        let mut p = Progress::new("sync");
        let mut meta1 = Map::new();
        meta1.insert("host".into(), "alpha".into());
        p.update(ProgressUpdate {
            percentage: Some(25.0),
            step: Some("copying".into()),
            metadata: Some(meta1),
            ..Default::default()
        });

        let mut meta2 = Map::new();
        meta2.insert("files".into(), 10.into());
        p.update(ProgressUpdate {
            percentage: Some(50.0),
            metadata: Some(meta2),
            ..Default::default()
        });

        assert_eq!(p.status, ProgressStatus::Running);
        assert_eq!(p.progress, 50.0);
        assert_eq!(p.current_step, "copying");
        // Earlier metadata survives the second update.
        assert_eq!(p.metadata.get("host").cloned(), Some(Value::from("alpha")));
        assert_eq!(p.metadata.get("files").cloned(), Some(Value::from(10)));
    }

    #[test]
    fn percentage_is_clamped_by_the_primitive() {
        let mut p = Progress::new("x");
        p.update(ProgressUpdate {
            percentage: Some(140.0),
            ..Default::default()
        });
        assert_eq!(p.progress, 100.0);

        let mut q = Progress::new("y");
        q.update(ProgressUpdate {
            percentage: Some(-5.0),
            ..Default::default()
        });
        assert_eq!(q.progress, 0.0);
    }

    #[test]
    fn midway_update_produces_an_estimate() {
        let mut p = Progress::new("long");
        std::thread::sleep(std::time::Duration::from_millis(20));
        p.update(ProgressUpdate {
            percentage: Some(50.0),
            ..Default::default()
        });
        assert!(p.estimated_completion.is_some());

        let display = p.format_for_display();
        assert!(display.estimated_seconds_remaining.is_some());
    }

    #[test]
    fn no_estimate_outside_open_interval() {
        let mut p = Progress::new("edge");
        p.update(ProgressUpdate {
            percentage: Some(0.0),
            ..Default::default()
        });
        assert!(p.format_for_display().estimated_seconds_remaining.is_none());

        p.complete();
        assert!(p.format_for_display().estimated_seconds_remaining.is_none());
    }

    #[test]
    fn terminal_states_ignore_further_updates() {
        let mut p = Progress::new("done");
        p.complete();
        assert_eq!(p.status, ProgressStatus::Completed);
        assert_eq!(p.progress, 100.0);

        p.update(ProgressUpdate {
            status: Some(ProgressStatus::Running),
            percentage: Some(10.0),
            ..Default::default()
        });
        assert_eq!(p.status, ProgressStatus::Completed);
        assert_eq!(p.progress, 100.0);

        p.fail("too late");
        assert_eq!(p.status, ProgressStatus::Completed);
    }

    #[test]
    fn fail_preserves_last_progress() {
        let mut p = Progress::new("half");
        p.update(ProgressUpdate {
            percentage: Some(40.0),
            ..Default::default()
        });
        p.fail("disk full");
        assert_eq!(p.status, ProgressStatus::Failed);
        assert_eq!(p.progress, 40.0);
        assert_eq!(p.current_step, "disk full");
    }

    #[test]
    fn cancelled_snapshot_leaves_record_untouched() {
        let mut p = Progress::new("c");
        p.fail("boom");
        let snap = p.as_cancelled();
        assert_eq!(snap.status, ProgressStatus::Cancelled);
        assert_eq!(p.status, ProgressStatus::Failed);
    }
}
