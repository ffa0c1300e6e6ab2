//! End-to-end lifecycle scenarios applied through the monitor and observed
//! through the registry, the way a scrape sees them.

mod common;

use celery_exporter::constants::metrics::{QUEUE_LENGTH, TASKS_RUNNING};
use celery_exporter::{IgnoreReason, LifecycleEvent, Transition};
use common::*;

#[test]
fn scenario_full_lifecycle_of_one_task() {
    let (monitor, registry) = monitor_with_registry(100);
    let instruments = monitor.instruments();

    monitor.apply(LifecycleEvent::enqueued("A", 100.0, "q1", "foo"));
    assert_eq!(instruments.queue_length_value("q1", "foo"), 1);
    assert_eq!(scraped_tracked_tasks(&registry), 1.0);

    monitor.apply(LifecycleEvent::started("A", 105.0, "w1"));
    assert_eq!(instruments.waiting_time_stats("q1", "foo"), (1, 5.0));
    assert_eq!(instruments.queue_length_value("q1", "foo"), 0);
    assert_eq!(instruments.tasks_running_value("q1", "foo", "w1"), 1);

    monitor.apply(LifecycleEvent::succeeded("A", 130.0, "w1"));
    assert_eq!(
        instruments.execution_duration_stats("q1", "foo", "w1", "succeeded"),
        (1, 25.0)
    );
    assert_eq!(instruments.tasks_running_value("q1", "foo", "w1"), 0);
    assert_eq!(monitor.tracked_tasks(), 0);
    assert_eq!(scraped_tracked_tasks(&registry), 0.0);
}

#[test]
fn scenario_start_without_enqueue_changes_nothing() {
    let (monitor, registry) = monitor_with_registry(100);

    let transition = monitor.apply(LifecycleEvent::started("Z", 50.0, "w1"));
    assert_eq!(transition, Transition::Ignored(IgnoreReason::Untracked));

    assert_eq!(monitor.tracked_tasks(), 0);
    assert!(gauge_samples(&registry, TASKS_RUNNING).is_empty());
    assert!(gauge_samples(&registry, QUEUE_LENGTH).is_empty());
}

#[test]
fn scenario_eviction_under_capacity_pressure() {
    let (monitor, registry) = monitor_with_registry(1);
    let instruments = monitor.instruments();

    monitor.apply(LifecycleEvent::enqueued("A", 1.0, "q1", "foo"));
    monitor.apply(LifecycleEvent::enqueued("B", 2.0, "q1", "foo"));
    assert_eq!(scraped_tracked_tasks(&registry), 1.0);

    let transition = monitor.apply(LifecycleEvent::started("A", 3.0, "w1"));
    assert!(transition.is_ignored());
    assert_eq!(instruments.tasks_running_value("q1", "foo", "w1"), 0);

    // B is still tracked and completes normally
    monitor.apply(LifecycleEvent::started("B", 4.0, "w1"));
    assert_eq!(instruments.waiting_time_stats("q1", "foo"), (1, 2.0));
}

#[test]
fn evicted_task_leaves_backlog_counted() {
    // An evicted record's backlog contribution is not withdrawn: the exporter
    // no longer knows when it leaves the queue.
    let (monitor, _registry) = monitor_with_registry(1);
    let instruments = monitor.instruments();

    monitor.apply(LifecycleEvent::enqueued("A", 1.0, "q1", "foo"));
    monitor.apply(LifecycleEvent::enqueued("B", 2.0, "q1", "foo"));
    assert_eq!(instruments.queue_length_value("q1", "foo"), 2);
}

#[test]
fn interleaved_tasks_keep_separate_label_sets() {
    let (monitor, _registry) = monitor_with_registry(100);
    let instruments = monitor.instruments();

    monitor.apply(LifecycleEvent::enqueued("A", 0.0, "emails", "send"));
    monitor.apply(LifecycleEvent::enqueued("B", 1.0, "reports", "build"));
    monitor.apply(LifecycleEvent::enqueued("C", 2.0, "emails", "send"));
    monitor.apply(LifecycleEvent::started("B", 4.0, "w2"));
    monitor.apply(LifecycleEvent::started("A", 6.0, "w1"));
    monitor.apply(LifecycleEvent::failed("B", 10.0, "w2"));

    assert_eq!(instruments.queue_length_value("emails", "send"), 1);
    assert_eq!(instruments.queue_length_value("reports", "build"), 0);
    assert_eq!(instruments.waiting_time_stats("emails", "send"), (1, 6.0));
    assert_eq!(instruments.waiting_time_stats("reports", "build"), (1, 3.0));
    assert_eq!(instruments.tasks_running_value("emails", "send", "w1"), 1);
    assert_eq!(
        instruments.execution_duration_stats("reports", "build", "w2", "failed"),
        (1, 6.0)
    );
    assert_eq!(monitor.tracked_tasks(), 2);
}

#[test]
fn all_terminal_kinds_are_labelled() {
    let (monitor, _registry) = monitor_with_registry(100);
    let instruments = monitor.instruments();

    for (id, event) in [
        ("S", LifecycleEvent::succeeded("S", 2.0, "w1")),
        ("F", LifecycleEvent::failed("F", 3.0, "w1")),
        ("R", LifecycleEvent::revoked("R", 4.0, "w1")),
    ] {
        monitor.apply(LifecycleEvent::enqueued(id, 0.0, "q1", "foo"));
        monitor.apply(LifecycleEvent::started(id, 1.0, "w1"));
        monitor.apply(event);
    }

    assert_eq!(
        instruments.execution_duration_stats("q1", "foo", "w1", "succeeded"),
        (1, 1.0)
    );
    assert_eq!(
        instruments.execution_duration_stats("q1", "foo", "w1", "failed"),
        (1, 2.0)
    );
    assert_eq!(
        instruments.execution_duration_stats("q1", "foo", "w1", "revoked"),
        (1, 3.0)
    );
    assert_eq!(instruments.tasks_running_value("q1", "foo", "w1"), 0);
}

#[test]
fn revoked_before_start_is_timed_from_enqueue() {
    let (monitor, _registry) = monitor_with_registry(100);
    let instruments = monitor.instruments();

    monitor.apply(LifecycleEvent::enqueued("A", 100.0, "q1", "foo"));
    monitor.apply(LifecycleEvent::revoked("A", 110.0, "celery@w1"));

    assert_eq!(
        instruments.execution_duration_stats("q1", "foo", "celery@w1", "revoked"),
        (1, 10.0)
    );
    assert_eq!(instruments.queue_length_value("q1", "foo"), 0);
    assert_eq!(instruments.tasks_running_value("q1", "foo", "celery@w1"), 0);
    assert_eq!(monitor.tracked_tasks(), 0);
}
