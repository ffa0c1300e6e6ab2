//! # Metric Instruments
//!
//! Labeled gauges and histograms updated by the lifecycle dispatcher. Every
//! instrument is internally synchronized, so the scrape endpoint can gather them
//! while events are being applied.
//!
//! Metrics:
//! - `celery_tasks_queue_length{queue, task_name}` (gauge)
//! - `celery_queue_waiting_seconds{queue, task_name}` (histogram)
//! - `celery_tasks_running{queue, task_name, worker}` (gauge)
//! - `celery_tasks_duration_seconds{queue, task_name, worker, state}` (histogram)
//!
//! `celery_exporter_tasks_tracked` is produced by
//! [`TrackedTasksCollector`](super::collector::TrackedTasksCollector).

use prometheus::{HistogramOpts, HistogramVec, IntGaugeVec, Opts, Registry};

use crate::constants::metrics::*;
use crate::error::Result;

#[derive(Clone)]
pub struct MetricInstruments {
    pub queue_length: IntGaugeVec,
    pub waiting_time: HistogramVec,
    pub tasks_running: IntGaugeVec,
    pub execution_duration: HistogramVec,
}

impl MetricInstruments {
    /// Create the instruments without registering them
    pub fn new() -> Result<Self> {
        let queue_length = IntGaugeVec::new(
            Opts::new(QUEUE_LENGTH, QUEUE_LENGTH_HELP),
            &[LABEL_QUEUE, LABEL_TASK_NAME],
        )?;

        let waiting_time = HistogramVec::new(
            HistogramOpts::new(WAITING_TIME, WAITING_TIME_HELP).buckets(LATENCY_BUCKETS.to_vec()),
            &[LABEL_QUEUE, LABEL_TASK_NAME],
        )?;

        let tasks_running = IntGaugeVec::new(
            Opts::new(TASKS_RUNNING, TASKS_RUNNING_HELP),
            &[LABEL_QUEUE, LABEL_TASK_NAME, LABEL_WORKER],
        )?;

        let execution_duration = HistogramVec::new(
            HistogramOpts::new(TASK_DURATION, TASK_DURATION_HELP).buckets(LATENCY_BUCKETS.to_vec()),
            &[LABEL_QUEUE, LABEL_TASK_NAME, LABEL_WORKER, LABEL_STATE],
        )?;

        Ok(Self {
            queue_length,
            waiting_time,
            tasks_running,
            execution_duration,
        })
    }

    /// Create the instruments and register them with `registry`
    pub fn registered(registry: &Registry) -> Result<Self> {
        let instruments = Self::new()?;
        instruments.register(registry)?;
        Ok(instruments)
    }

    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.queue_length.clone()))?;
        registry.register(Box::new(self.waiting_time.clone()))?;
        registry.register(Box::new(self.tasks_running.clone()))?;
        registry.register(Box::new(self.execution_duration.clone()))?;
        Ok(())
    }

    // Backlog helpers

    pub fn task_queued(&self, queue: &str, task_name: &str) {
        self.queue_length
            .with_label_values(&[queue, task_name])
            .inc();
    }

    pub fn task_left_queue(&self, queue: &str, task_name: &str) {
        self.queue_length
            .with_label_values(&[queue, task_name])
            .dec();
    }

    pub fn observe_waiting_time(&self, queue: &str, task_name: &str, seconds: f64) {
        self.waiting_time
            .with_label_values(&[queue, task_name])
            .observe(seconds);
    }

    // Execution helpers

    pub fn task_running(&self, queue: &str, task_name: &str, worker: &str) {
        self.tasks_running
            .with_label_values(&[queue, task_name, worker])
            .inc();
    }

    pub fn task_stopped(&self, queue: &str, task_name: &str, worker: &str) {
        self.tasks_running
            .with_label_values(&[queue, task_name, worker])
            .dec();
    }

    pub fn observe_execution_duration(
        &self,
        queue: &str,
        task_name: &str,
        worker: &str,
        state: &str,
        seconds: f64,
    ) {
        self.execution_duration
            .with_label_values(&[queue, task_name, worker, state])
            .observe(seconds);
    }

    // Read helpers, used by tests and diagnostics

    pub fn queue_length_value(&self, queue: &str, task_name: &str) -> i64 {
        self.queue_length.with_label_values(&[queue, task_name]).get()
    }

    pub fn tasks_running_value(&self, queue: &str, task_name: &str, worker: &str) -> i64 {
        self.tasks_running
            .with_label_values(&[queue, task_name, worker])
            .get()
    }

    /// `(count, sum)` of waiting time observations
    pub fn waiting_time_stats(&self, queue: &str, task_name: &str) -> (u64, f64) {
        let histogram = self.waiting_time.with_label_values(&[queue, task_name]);
        (histogram.get_sample_count(), histogram.get_sample_sum())
    }

    /// `(count, sum)` of execution duration observations
    pub fn execution_duration_stats(
        &self,
        queue: &str,
        task_name: &str,
        worker: &str,
        state: &str,
    ) -> (u64, f64) {
        let histogram = self
            .execution_duration
            .with_label_values(&[queue, task_name, worker, state]);
        (histogram.get_sample_count(), histogram.get_sample_sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let registry = Registry::new();
        let instruments = MetricInstruments::registered(&registry).unwrap();
        instruments.task_queued("q1", "foo");

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&QUEUE_LENGTH.to_string()));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        let instruments = MetricInstruments::registered(&registry).unwrap();
        assert!(instruments.register(&registry).is_err());
    }

    #[test]
    fn test_helpers_update_labeled_series() {
        let instruments = MetricInstruments::new().unwrap();

        instruments.task_queued("q1", "foo");
        instruments.task_queued("q1", "foo");
        instruments.task_left_queue("q1", "foo");
        assert_eq!(instruments.queue_length_value("q1", "foo"), 1);
        assert_eq!(instruments.queue_length_value("q2", "foo"), 0);

        instruments.task_running("q1", "foo", "w1");
        assert_eq!(instruments.tasks_running_value("q1", "foo", "w1"), 1);
        instruments.task_stopped("q1", "foo", "w1");
        assert_eq!(instruments.tasks_running_value("q1", "foo", "w1"), 0);

        instruments.observe_waiting_time("q1", "foo", 5.0);
        assert_eq!(instruments.waiting_time_stats("q1", "foo"), (1, 5.0));

        instruments.observe_execution_duration("q1", "foo", "w1", "succeeded", 25.0);
        assert_eq!(
            instruments.execution_duration_stats("q1", "foo", "w1", "succeeded"),
            (1, 25.0)
        );
    }
}
