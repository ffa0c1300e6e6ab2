//! # Task Lifecycle Monitor
//!
//! Owns the lifecycle dispatcher behind a single lock and drives event sources
//! into it. The lock serializes event application with scrape-time reads of the
//! tracked-tasks gauge, so a scrape always sees a count consistent with the
//! gauges it gathers alongside.

pub mod dispatcher;

pub use dispatcher::{IgnoreReason, LifecycleDispatcher, Transition};

use std::sync::Arc;

use parking_lot::Mutex;
use prometheus::Registry;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::events::LifecycleEvent;
use crate::metrics::{MetricInstruments, TrackedTasksCollector};
use crate::sources::{CaptureOutcome, EventHandler, EventSource};

#[derive(Clone)]
pub struct Monitor {
    dispatcher: Arc<Mutex<LifecycleDispatcher>>,
    capture_limit: Option<usize>,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Formatting must not block on a lock the caller may already hold
        let mut debug = f.debug_struct("Monitor");
        match self.dispatcher.try_lock() {
            Some(dispatcher) => debug.field("tracked_tasks", &dispatcher.tracked_tasks()),
            None => debug.field("tracked_tasks", &format_args!("<locked>")),
        };
        debug.field("capture_limit", &self.capture_limit).finish()
    }
}

impl Monitor {
    /// Create a monitor tracking at most `capacity` tasks and register its
    /// metrics with `registry`
    pub fn new(capacity: usize, registry: &Registry) -> Result<Self> {
        let instruments = MetricInstruments::registered(registry)?;
        let dispatcher = Arc::new(Mutex::new(LifecycleDispatcher::new(capacity, instruments)));

        let reader = Arc::clone(&dispatcher);
        let collector = TrackedTasksCollector::new(move || reader.lock().tracked_tasks())?;
        registry.register(Box::new(collector))?;

        info!(capacity, "Task lifecycle monitor created");
        Ok(Self {
            dispatcher,
            capture_limit: None,
        })
    }

    /// Re-issue the subscription after every `limit` events instead of
    /// capturing indefinitely
    pub fn with_capture_limit(mut self, limit: Option<usize>) -> Self {
        self.capture_limit = limit.filter(|limit| *limit > 0);
        self
    }

    pub fn capture_limit(&self) -> Option<usize> {
        self.capture_limit
    }

    /// Apply one event
    pub fn apply(&self, event: LifecycleEvent) -> Transition {
        let task_id = event.task_id().to_string();
        let event_type = event.event_type();
        let event_time = event_time(event.timestamp());

        let transition = self.dispatcher.lock().dispatch(event);

        match &transition {
            Transition::Rejected => {
                warn!(task_id = %task_id, "Task record rejected by the state cache")
            }
            Transition::Ignored(reason) => {
                debug!(task_id = %task_id, event_type, %event_time, ?reason, "Ignoring lifecycle event")
            }
            other => debug!(
                task_id = %task_id,
                event_type,
                %event_time,
                transition = ?other,
                "Applied lifecycle event"
            ),
        }
        transition
    }

    pub fn tracked_tasks(&self) -> usize {
        self.dispatcher.lock().tracked_tasks()
    }

    pub fn instruments(&self) -> MetricInstruments {
        self.dispatcher.lock().instruments().clone()
    }

    /// Run `source` into this monitor until it is exhausted.
    ///
    /// With a capture limit the subscription is re-issued every time the limit
    /// is reached. Subscription errors are returned to the caller.
    pub async fn run<S>(&self, source: &mut S) -> Result<()>
    where
        S: EventSource + ?Sized,
    {
        let description = source.describe();
        info!(source = %description, capture_limit = ?self.capture_limit, "Starting event capture");

        let mut captures: u64 = 0;
        loop {
            captures += 1;
            match source.capture(self.capture_limit, self).await? {
                CaptureOutcome::LimitReached { delivered } => {
                    debug!(captures, delivered, "Capture limit reached; re-issuing subscription");
                }
                CaptureOutcome::Exhausted { delivered } => {
                    info!(
                        source = %description,
                        captures,
                        delivered,
                        "Event source exhausted"
                    );
                    return Ok(());
                }
            }
        }
    }
}

/// Render an epoch-seconds event timestamp for logs
fn event_time(timestamp: f64) -> String {
    chrono::DateTime::from_timestamp_millis((timestamp * 1000.0) as i64)
        .map(|time| time.to_rfc3339())
        .unwrap_or_else(|| timestamp.to_string())
}

impl EventHandler for Monitor {
    fn handle(&self, event: LifecycleEvent) {
        self.apply(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::metrics::TASKS_TRACKED;
    use crate::sources::InMemoryEventSource;

    fn tracked_gauge(registry: &Registry) -> f64 {
        registry
            .gather()
            .iter()
            .find(|family| family.get_name() == TASKS_TRACKED)
            .map(|family| family.get_metric()[0].get_gauge().get_value())
            .unwrap()
    }

    #[test]
    fn test_tracked_tasks_reported_at_scrape() {
        let registry = Registry::new();
        let monitor = Monitor::new(10, &registry).unwrap();
        assert_eq!(tracked_gauge(&registry), 0.0);

        monitor.apply(LifecycleEvent::enqueued("A", 1.0, "q1", "foo"));
        monitor.apply(LifecycleEvent::enqueued("B", 1.0, "q1", "foo"));
        assert_eq!(tracked_gauge(&registry), 2.0);

        monitor.apply(LifecycleEvent::started("A", 2.0, "w1"));
        monitor.apply(LifecycleEvent::succeeded("A", 3.0, "w1"));
        assert_eq!(tracked_gauge(&registry), 1.0);
        assert_eq!(monitor.tracked_tasks(), 1);
    }

    #[test]
    fn test_event_time_rendering() {
        assert_eq!(event_time(0.0), "1970-01-01T00:00:00+00:00");
        assert_eq!(event_time(1.5), "1970-01-01T00:00:01.500+00:00");
    }

    #[test]
    fn test_debug_does_not_wait_for_the_lock() {
        let registry = Registry::new();
        let monitor = Monitor::new(10, &registry).unwrap();
        monitor.apply(LifecycleEvent::enqueued("A", 1.0, "q1", "foo"));
        assert!(format!("{monitor:?}").contains("tracked_tasks: 1"));

        let held = monitor.dispatcher.lock();
        let rendered = format!("{monitor:?}");
        drop(held);
        assert!(rendered.contains("tracked_tasks: <locked>"), "{rendered}");
    }

    #[test]
    fn test_two_monitors_cannot_share_a_registry() {
        let registry = Registry::new();
        let _first = Monitor::new(10, &registry).unwrap();
        assert!(Monitor::new(10, &registry).is_err());
    }

    #[test]
    fn test_zero_capture_limit_means_unbounded() {
        let registry = Registry::new();
        let monitor = Monitor::new(10, &registry)
            .unwrap()
            .with_capture_limit(Some(0));
        assert_eq!(monitor.capture_limit(), None);
    }

    #[tokio::test]
    async fn test_run_reissues_capture_until_exhausted() {
        let registry = Registry::new();
        let monitor = Monitor::new(10, &registry)
            .unwrap()
            .with_capture_limit(Some(2));

        let mut source = InMemoryEventSource::from_events(vec![
            LifecycleEvent::enqueued("A", 1.0, "q1", "foo"),
            LifecycleEvent::enqueued("B", 1.0, "q1", "foo"),
            LifecycleEvent::started("A", 2.0, "w1"),
            LifecycleEvent::started("B", 4.0, "w1"),
            LifecycleEvent::succeeded("A", 5.0, "w1"),
        ]);

        monitor.run(&mut source).await.unwrap();

        let instruments = monitor.instruments();
        assert_eq!(instruments.queue_length_value("q1", "foo"), 0);
        assert_eq!(instruments.tasks_running_value("q1", "foo", "w1"), 1);
        assert_eq!(instruments.waiting_time_stats("q1", "foo"), (2, 4.0));
        assert_eq!(monitor.tracked_tasks(), 1);
    }
}
