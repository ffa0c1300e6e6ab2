use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal outcome of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalKind {
    Succeeded,
    Failed,
    Revoked,
}

impl TerminalKind {
    /// Label value used for the `state` label of the duration histogram
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Revoked => "revoked",
        }
    }
}

impl fmt::Display for TerminalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

impl std::str::FromStr for TerminalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "revoked" => Ok(Self::Revoked),
            _ => Err(format!("Unknown terminal kind: {s}")),
        }
    }
}

/// Task lifecycle events observed on the broker.
///
/// Timestamps are epoch seconds as reported by the event producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// The task was published to a queue
    Enqueued {
        task_id: String,
        timestamp: f64,
        queue: String,
        task_name: String,
    },
    /// A worker began executing the task
    Started {
        task_id: String,
        timestamp: f64,
        worker: String,
    },
    /// The task reached a final state
    Terminal {
        task_id: String,
        timestamp: f64,
        worker: String,
        kind: TerminalKind,
    },
}

impl LifecycleEvent {
    pub fn enqueued(
        task_id: impl Into<String>,
        timestamp: f64,
        queue: impl Into<String>,
        task_name: impl Into<String>,
    ) -> Self {
        Self::Enqueued {
            task_id: task_id.into(),
            timestamp,
            queue: queue.into(),
            task_name: task_name.into(),
        }
    }

    pub fn started(task_id: impl Into<String>, timestamp: f64, worker: impl Into<String>) -> Self {
        Self::Started {
            task_id: task_id.into(),
            timestamp,
            worker: worker.into(),
        }
    }

    pub fn terminal(
        task_id: impl Into<String>,
        timestamp: f64,
        worker: impl Into<String>,
        kind: TerminalKind,
    ) -> Self {
        Self::Terminal {
            task_id: task_id.into(),
            timestamp,
            worker: worker.into(),
            kind,
        }
    }

    pub fn succeeded(task_id: impl Into<String>, timestamp: f64, worker: impl Into<String>) -> Self {
        Self::terminal(task_id, timestamp, worker, TerminalKind::Succeeded)
    }

    pub fn failed(task_id: impl Into<String>, timestamp: f64, worker: impl Into<String>) -> Self {
        Self::terminal(task_id, timestamp, worker, TerminalKind::Failed)
    }

    pub fn revoked(task_id: impl Into<String>, timestamp: f64, worker: impl Into<String>) -> Self {
        Self::terminal(task_id, timestamp, worker, TerminalKind::Revoked)
    }

    pub fn task_id(&self) -> &str {
        match self {
            Self::Enqueued { task_id, .. }
            | Self::Started { task_id, .. }
            | Self::Terminal { task_id, .. } => task_id,
        }
    }

    pub fn timestamp(&self) -> f64 {
        match self {
            Self::Enqueued { timestamp, .. }
            | Self::Started { timestamp, .. }
            | Self::Terminal { timestamp, .. } => *timestamp,
        }
    }

    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Enqueued { .. } => "enqueued",
            Self::Started { .. } => "started",
            Self::Terminal { kind, .. } => kind.as_label(),
        }
    }
}
