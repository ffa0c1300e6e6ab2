//! # Task State Cache
//!
//! Bounded map from task id to [`TaskRecord`]. When the cache is full, inserting a
//! new key evicts the oldest-inserted entry; overwriting an existing key keeps its
//! position and never evicts.
//!
//! Backed by [`lru::LruCache`]. Lookups use `peek`, so recency is never bumped and
//! the LRU end is always the oldest-inserted task. The cache is not
//! synchronized. The monitor owns it behind its single lock.

use std::num::NonZeroUsize;

use lru::LruCache;
use tracing::debug;

use super::record::TaskRecord;
use crate::constants::config::DEFAULT_MAX_TASKS_CAPTURED;

#[derive(Debug)]
pub struct TaskStateCache {
    capacity: usize,
    entries: LruCache<String, TaskRecord>,
}

impl TaskStateCache {
    pub fn new(capacity: usize) -> Self {
        // LruCache needs a non-zero bound; capacity 0 is enforced in `put`
        let bound = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            capacity,
            entries: LruCache::new(bound),
        }
    }

    /// Insert or overwrite a record.
    ///
    /// Returns whether the record is resident after the call, which is always the
    /// case unless the cache was built with capacity 0.
    pub fn put(&mut self, task_id: impl Into<String>, record: TaskRecord) -> bool {
        let task_id = task_id.into();

        if let Some(existing) = self.entries.peek_mut(&task_id) {
            *existing = record;
            return true;
        }

        if self.capacity == 0 {
            return false;
        }

        // The key is new, so anything handed back is the evicted oldest entry
        if let Some((evicted_id, evicted)) = self.entries.push(task_id, record) {
            debug!(
                task_id = %evicted_id,
                queue = %evicted.queue,
                task_name = %evicted.task_name,
                capacity = self.capacity,
                "Evicted oldest tracked task to stay within capacity"
            );
        }
        true
    }

    pub fn get(&self, task_id: &str) -> Option<&TaskRecord> {
        self.entries.peek(task_id)
    }

    /// Mutable access for in-place updates; insertion order is unchanged
    pub fn get_mut(&mut self, task_id: &str) -> Option<&mut TaskRecord> {
        self.entries.peek_mut(task_id)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.entries.contains(task_id)
    }

    /// Remove a record, returning it if it was present
    pub fn delete(&mut self, task_id: &str) -> Option<TaskRecord> {
        self.entries.pop(task_id)
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
impl TaskStateCache {
    /// Id of the entry the next eviction would remove
    fn oldest_task_id(&self) -> Option<&str> {
        self.entries.peek_lru().map(|(task_id, _)| task_id.as_str())
    }
}

impl Default for TaskStateCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TASKS_CAPTURED)
    }
}
