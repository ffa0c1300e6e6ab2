//! # System Constants
//!
//! Metric names, label sets, Celery event identifiers and configuration defaults
//! shared across the exporter.

/// Prometheus metric names and help texts
pub mod metrics {
    pub const QUEUE_LENGTH: &str = "celery_tasks_queue_length";
    pub const QUEUE_LENGTH_HELP: &str = "Length of Celery queues with tasks";

    pub const WAITING_TIME: &str = "celery_queue_waiting_seconds";
    pub const WAITING_TIME_HELP: &str = "Waiting time of tasks in Celery queues";

    pub const TASKS_RUNNING: &str = "celery_tasks_running";
    pub const TASKS_RUNNING_HELP: &str = "Number of Celery Tasks currently running";

    pub const TASKS_TRACKED: &str = "celery_exporter_tasks_tracked";
    pub const TASKS_TRACKED_HELP: &str =
        "Number of tasks tracked by Celery exporter, limit is MAX_TASKS_CAPTURED";

    pub const TASK_DURATION: &str = "celery_tasks_duration_seconds";
    pub const TASK_DURATION_HELP: &str = "Duration of tasks when finished in given state";

    pub const LABEL_QUEUE: &str = "queue";
    pub const LABEL_TASK_NAME: &str = "task_name";
    pub const LABEL_WORKER: &str = "worker";
    pub const LABEL_STATE: &str = "state";

    /// Buckets for waiting time and duration histograms, in seconds
    pub const LATENCY_BUCKETS: &[f64] = &[
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0,
        600.0, 1800.0, 3600.0,
    ];
}

/// Celery event wire identifiers
pub mod celery {
    /// Prefix carried by every task event type on the wire
    pub const TASK_EVENT_PREFIX: &str = "task-";

    pub const TASK_SENT: &str = "task-sent";
    pub const TASK_STARTED: &str = "task-started";
    pub const TASK_SUCCEEDED: &str = "task-succeeded";
    pub const TASK_FAILED: &str = "task-failed";
    pub const TASK_REVOKED: &str = "task-revoked";

    /// Topic exchange Celery publishes events to
    pub const EVENT_EXCHANGE: &str = "celeryev";
    /// Routing key pattern matching all task events
    pub const TASK_ROUTING_KEY: &str = "task.#";
    /// Receiver queue name prefix, completed with a unique node id
    pub const RECEIVER_QUEUE_PREFIX: &str = "celeryev";
    /// Receiver queue message TTL, milliseconds
    pub const EVENT_QUEUE_TTL_MS: i32 = 5_000;
    /// Receiver queue idle expiry, milliseconds
    pub const EVENT_QUEUE_EXPIRES_MS: i32 = 60_000;
    pub const CONSUMER_TAG: &str = "celery-exporter";

    /// Redis fanout channel prefix, `/<db>.`, as used by the Redis transport
    pub const REDIS_FANOUT_PREFIX: char = '/';
    /// Routing key glob for task events on Redis fanout channels
    pub const REDIS_TASK_PATTERN: &str = "task.*";
    /// Envelope body encoding that must be decoded before parsing
    pub const BASE64_BODY_ENCODING: &str = "base64";
}

/// Configuration keys and defaults
pub mod config {
    pub const BROKER_URL: &str = "BROKER_URL";
    pub const BACKEND_URL: &str = "BACKEND_URL";
    pub const MAX_TASKS_CAPTURED: &str = "MAX_TASKS_CAPTURED";
    pub const PORT: &str = "PORT";

    pub const DEFAULT_MAX_TASKS_CAPTURED: usize = 100_000;
    pub const DEFAULT_PORT: u16 = 8000;
}
