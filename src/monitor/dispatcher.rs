//! # Lifecycle Dispatcher
//!
//! Applies lifecycle events to the task cache and the metric instruments.
//!
//! Per-task states: `Unknown -> Queued -> Running -> (absent)`.
//!
//! | Event    | Record        | Effect                                                      |
//! |----------|---------------|-------------------------------------------------------------|
//! | Enqueued | any           | put Queued record; backlog +1 if admitted                   |
//! | Started  | Queued        | observe waiting time; backlog -1; running +1; mark Running  |
//! | Terminal | Running       | running -1; observe execution duration; delete              |
//! | Terminal | Queued        | backlog -1; observe execution duration from enqueue; delete |
//! | Started / Terminal | absent | nothing                                                 |
//!
//! An Enqueued event for a task that is already tracked first withdraws the
//! previous record's gauge contribution, so each gauge counts a task once.

use tracing::trace;

use crate::events::{LifecycleEvent, TerminalKind};
use crate::metrics::MetricInstruments;
use crate::tracking::{TaskPhase, TaskRecord, TaskStateCache};

/// Why an event caused no change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No record for the task: never enqueued while observed, evicted, or already finished
    Untracked,
    /// Started delivered again for a task that is already running
    AlreadyRunning,
}

/// What applying an event did
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// A new record was admitted
    Queued,
    /// An existing record was replaced by a fresh enqueue
    Requeued,
    /// The cache refused the record
    Rejected,
    Running { waiting_seconds: f64 },
    Finished { duration_seconds: f64 },
    /// Terminal event for a task no worker had started; measured from enqueue
    Discarded { duration_seconds: f64 },
    Ignored(IgnoreReason),
}

impl Transition {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored(_))
    }
}

pub struct LifecycleDispatcher {
    cache: TaskStateCache,
    instruments: MetricInstruments,
}

impl LifecycleDispatcher {
    pub fn new(capacity: usize, instruments: MetricInstruments) -> Self {
        Self {
            cache: TaskStateCache::new(capacity),
            instruments,
        }
    }

    pub fn dispatch(&mut self, event: LifecycleEvent) -> Transition {
        match event {
            LifecycleEvent::Enqueued {
                task_id,
                timestamp,
                queue,
                task_name,
            } => self.on_enqueued(&task_id, timestamp, &queue, &task_name),
            LifecycleEvent::Started {
                task_id,
                timestamp,
                worker,
            } => self.on_started(&task_id, timestamp, &worker),
            LifecycleEvent::Terminal {
                task_id,
                timestamp,
                worker,
                kind,
            } => self.on_terminal(&task_id, timestamp, &worker, kind),
        }
    }

    fn on_enqueued(
        &mut self,
        task_id: &str,
        timestamp: f64,
        queue: &str,
        task_name: &str,
    ) -> Transition {
        let replaced = match self.cache.get(task_id) {
            Some(previous) => {
                withdraw(&self.instruments, previous);
                true
            }
            None => false,
        };

        let admitted = self
            .cache
            .put(task_id, TaskRecord::queued(queue, task_name, timestamp));
        if !admitted {
            return Transition::Rejected;
        }

        self.instruments.task_queued(queue, task_name);
        if replaced {
            Transition::Requeued
        } else {
            Transition::Queued
        }
    }

    fn on_started(&mut self, task_id: &str, timestamp: f64, worker: &str) -> Transition {
        let Some(record) = self.cache.get_mut(task_id) else {
            return Transition::Ignored(IgnoreReason::Untracked);
        };

        let enqueued_at = match record.phase {
            TaskPhase::Queued { enqueued_at } => enqueued_at,
            TaskPhase::Running { .. } => return Transition::Ignored(IgnoreReason::AlreadyRunning),
        };

        let waiting_seconds = timestamp - enqueued_at;
        self.instruments
            .observe_waiting_time(&record.queue, &record.task_name, waiting_seconds);
        self.instruments
            .task_left_queue(&record.queue, &record.task_name);
        self.instruments
            .task_running(&record.queue, &record.task_name, worker);
        record.mark_running(timestamp, worker);

        Transition::Running { waiting_seconds }
    }

    fn on_terminal(
        &mut self,
        task_id: &str,
        timestamp: f64,
        worker: &str,
        kind: TerminalKind,
    ) -> Transition {
        let Some(record) = self.cache.delete(task_id) else {
            return Transition::Ignored(IgnoreReason::Untracked);
        };

        match record.phase {
            TaskPhase::Queued { enqueued_at } => {
                self.instruments
                    .task_left_queue(&record.queue, &record.task_name);
                let duration_seconds = timestamp - enqueued_at;
                self.instruments.observe_execution_duration(
                    &record.queue,
                    &record.task_name,
                    worker,
                    kind.as_label(),
                    duration_seconds,
                );
                Transition::Discarded { duration_seconds }
            }
            TaskPhase::Running {
                started_at,
                worker: started_by,
            } => {
                // The gauge was raised under the starting worker's label
                self.instruments
                    .task_stopped(&record.queue, &record.task_name, &started_by);
                let duration_seconds = timestamp - started_at;
                self.instruments.observe_execution_duration(
                    &record.queue,
                    &record.task_name,
                    worker,
                    kind.as_label(),
                    duration_seconds,
                );
                Transition::Finished { duration_seconds }
            }
        }
    }

    pub fn cache(&self) -> &TaskStateCache {
        &self.cache
    }

    pub fn instruments(&self) -> &MetricInstruments {
        &self.instruments
    }

    pub fn tracked_tasks(&self) -> usize {
        self.cache.size()
    }
}

/// Undo the gauge contribution of a record that is about to be replaced
fn withdraw(instruments: &MetricInstruments, previous: &TaskRecord) {
    trace!(queue = %previous.queue, task_name = %previous.task_name, "Withdrawing replaced record");
    match &previous.phase {
        TaskPhase::Queued { .. } => instruments.task_left_queue(&previous.queue, &previous.task_name),
        TaskPhase::Running { worker, .. } => {
            instruments.task_stopped(&previous.queue, &previous.task_name, worker)
        }
    }
}
