//! # Task Tracking
//!
//! In-flight task records and the bounded cache that holds them.

pub mod cache;
pub mod record;

pub use cache::TaskStateCache;
pub use record::{TaskPhase, TaskRecord};
