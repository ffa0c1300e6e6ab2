//! Shared helpers for integration tests.

#![allow(dead_code)]

use celery_exporter::constants::metrics::TASKS_TRACKED;
use celery_exporter::{LifecycleEvent, Monitor};
use prometheus::Registry;

/// Monitor registered with a fresh registry
pub fn monitor_with_registry(capacity: usize) -> (Monitor, Registry) {
    let registry = Registry::new();
    let monitor = Monitor::new(capacity, &registry).expect("monitor registration");
    (monitor, registry)
}

/// Value of the tracked-tasks gauge as a scrape would see it
pub fn scraped_tracked_tasks(registry: &Registry) -> f64 {
    registry
        .gather()
        .iter()
        .find(|family| family.get_name() == TASKS_TRACKED)
        .map(|family| family.get_metric()[0].get_gauge().get_value())
        .expect("tracked tasks gauge is registered")
}

/// Every gauge sample of `metric` in the registry
pub fn gauge_samples(registry: &Registry, metric: &str) -> Vec<f64> {
    registry
        .gather()
        .iter()
        .filter(|family| family.get_name() == metric)
        .flat_map(|family| family.get_metric().iter().map(|m| m.get_gauge().get_value()))
        .collect()
}

pub mod strategies {
    use super::*;
    use proptest::prelude::*;

    /// One step of a generated event stream, over a small task id space so
    /// that ids collide and repeat
    #[derive(Debug, Clone)]
    pub enum Step {
        Enqueue { id: u8, queue: u8, at: u32 },
        Start { id: u8, worker: u8, at: u32 },
        Finish { id: u8, worker: u8, at: u32, kind: u8 },
    }

    impl Step {
        pub fn to_event(&self) -> LifecycleEvent {
            match *self {
                Step::Enqueue { id, queue, at } => LifecycleEvent::enqueued(
                    format!("task-{id}"),
                    f64::from(at),
                    format!("q{queue}"),
                    "app.work",
                ),
                Step::Start { id, worker, at } => {
                    LifecycleEvent::started(format!("task-{id}"), f64::from(at), format!("w{worker}"))
                }
                Step::Finish {
                    id,
                    worker,
                    at,
                    kind,
                } => {
                    let id = format!("task-{id}");
                    let worker = format!("w{worker}");
                    match kind % 3 {
                        0 => LifecycleEvent::succeeded(id, f64::from(at), worker),
                        1 => LifecycleEvent::failed(id, f64::from(at), worker),
                        _ => LifecycleEvent::revoked(id, f64::from(at), worker),
                    }
                }
            }
        }
    }

    pub fn step_strategy() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0u8..16, 0u8..3, 0u32..10_000).prop_map(|(id, queue, at)| Step::Enqueue { id, queue, at }),
            (0u8..16, 0u8..3, 0u32..10_000).prop_map(|(id, worker, at)| Step::Start { id, worker, at }),
            (0u8..16, 0u8..3, 0u32..10_000, 0u8..3)
                .prop_map(|(id, worker, at, kind)| Step::Finish { id, worker, at, kind }),
        ]
    }

    pub fn event_stream_strategy() -> impl Strategy<Value = Vec<Step>> {
        prop::collection::vec(step_strategy(), 0..200)
    }
}
