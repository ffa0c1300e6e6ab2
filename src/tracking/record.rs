use serde::{Deserialize, Serialize};

/// Where a tracked task is in its lifecycle, with the timestamp that phase began.
///
/// The timestamp is the reference point for the next observation: waiting time
/// is measured from `enqueued_at`, execution duration from `started_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TaskPhase {
    Queued { enqueued_at: f64 },
    Running { started_at: f64, worker: String },
}

/// Lifecycle record for one in-flight task.
///
/// Queue and task name are only carried by the enqueue event, so every later
/// metric update takes its labels from here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub queue: String,
    pub task_name: String,
    pub phase: TaskPhase,
}

impl TaskRecord {
    pub fn queued(queue: impl Into<String>, task_name: impl Into<String>, enqueued_at: f64) -> Self {
        Self {
            queue: queue.into(),
            task_name: task_name.into(),
            phase: TaskPhase::Queued { enqueued_at },
        }
    }

    /// Timestamp the current phase began at
    pub fn reference_timestamp(&self) -> f64 {
        match &self.phase {
            TaskPhase::Queued { enqueued_at } => *enqueued_at,
            TaskPhase::Running { started_at, .. } => *started_at,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, TaskPhase::Running { .. })
    }

    /// Worker that started the task, once running
    pub fn worker(&self) -> Option<&str> {
        match &self.phase {
            TaskPhase::Running { worker, .. } => Some(worker),
            TaskPhase::Queued { .. } => None,
        }
    }

    /// Move the record to the running phase, replacing the reference timestamp
    pub fn mark_running(&mut self, started_at: f64, worker: impl Into<String>) {
        self.phase = TaskPhase::Running {
            started_at,
            worker: worker.into(),
        };
    }
}
