use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::IntGauge;

use crate::constants::metrics::{TASKS_TRACKED, TASKS_TRACKED_HELP};
use crate::error::Result;

/// Reports the number of tracked tasks at scrape time.
///
/// The value is never pushed; `size_fn` is evaluated on every gather so the
/// gauge cannot drift from the cache it describes.
pub struct TrackedTasksCollector {
    gauge: IntGauge,
    size_fn: Box<dyn Fn() -> usize + Send + Sync>,
}

impl TrackedTasksCollector {
    pub fn new<F>(size_fn: F) -> Result<Self>
    where
        F: Fn() -> usize + Send + Sync + 'static,
    {
        Ok(Self {
            gauge: IntGauge::new(TASKS_TRACKED, TASKS_TRACKED_HELP)?,
            size_fn: Box::new(size_fn),
        })
    }

    /// Current value, computed the same way a scrape computes it
    pub fn current(&self) -> i64 {
        i64::try_from((self.size_fn)()).unwrap_or(i64::MAX)
    }
}

impl Collector for TrackedTasksCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.gauge.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.gauge.set(self.current());
        self.gauge.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_collect_reads_size_on_every_gather() {
        let size = Arc::new(AtomicUsize::new(3));
        let reader = Arc::clone(&size);
        let collector = TrackedTasksCollector::new(move || reader.load(Ordering::SeqCst)).unwrap();

        let families = collector.collect();
        assert_eq!(families[0].get_name(), TASKS_TRACKED);
        assert_eq!(families[0].get_metric()[0].get_gauge().get_value(), 3.0);

        size.store(7, Ordering::SeqCst);
        let families = collector.collect();
        assert_eq!(families[0].get_metric()[0].get_gauge().get_value(), 7.0);
    }
}
