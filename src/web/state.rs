//! # Web Application State
//!
//! Shared handles the HTTP handlers read from.

use prometheus::Registry;

use crate::monitor::Monitor;

#[derive(Clone)]
pub struct AppState {
    /// Registry holding every exported metric, including the tracked-tasks collector
    pub registry: Registry,
    pub monitor: Monitor,
}

impl AppState {
    pub fn new(registry: Registry, monitor: Monitor) -> Self {
        Self { registry, monitor }
    }
}
