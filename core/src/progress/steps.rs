use serde_json::{Map, Value};

use super::handle::ProgressHandle;

/// Context map threaded through the steps of a plan. Each step sees what its
/// predecessors accumulated.
pub type StepContext = Map<String, Value>;

/// Reserved key for non-object step results, which cannot be merged into the
/// context directly.
pub const RESULT_KEY: &str = "result";

type StepFn = Box<dyn FnOnce(&StepContext) -> anyhow::Result<Value> + Send>;

struct Step {
    label: String,
    weight: f64,
    run: StepFn,
}

/// Weighted multi-step task definition.
///
/// Progress after step `i` is the cumulative weight share of steps `0..=i`,
/// rounded to one decimal. An all-zero weight total degenerates to a no-op
/// progress sequence: the steps still run, nothing is divided by zero.
pub struct StepPlan {
    task_name: String,
    steps: Vec<Step>,
}

impl StepPlan {
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step<F>(mut self, label: impl Into<String>, weight: f64, run: F) -> Self
    where
        F: FnOnce(&StepContext) -> anyhow::Result<Value> + Send + 'static,
    {
        self.steps.push(Step {
            label: label.into(),
            weight,
            run: Box::new(run),
        });
        self
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order, reporting weighted progress through `handle`.
    ///
    /// On a step fault execution halts there: a Failed update preserving the
    /// accumulated progress is emitted, followed by a trailing Cancelled
    /// notification, and the fault is returned. On full completion a final
    /// Completed notification at 100 follows the last step update. The return
    /// value is the accumulated context as an object.
    pub fn execute(self, handle: &mut ProgressHandle) -> anyhow::Result<Value> {
        let total_weight: f64 = self.steps.iter().map(|s| s.weight).sum();
        let mut context = StepContext::new();
        let mut accumulated = 0.0_f64;

        handle.start();

        for step in self.steps {
            match (step.run)(&context) {
                Ok(value) => {
                    merge_step_result(&mut context, value);
                    accumulated += step.weight;
                    if total_weight > 0.0 {
                        let pct = round1(accumulated / total_weight * 100.0);
                        handle.update_step(pct, step.label);
                    }
                }
                Err(err) => {
                    handle.fail(format!("Step '{}' failed: {err}", step.label));
                    handle.notify_cancelled();
                    return Err(err);
                }
            }
        }

        handle.complete();
        Ok(Value::Object(context))
    }
}

/// Object results merge into the context; anything else lands under the
/// reserved key.
fn merge_step_result(context: &mut StepContext, value: Value) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                context.insert(k, v);
            }
        }
        Value::Null => {}
        other => {
            context.insert(RESULT_KEY.to_string(), other);
        }
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}
