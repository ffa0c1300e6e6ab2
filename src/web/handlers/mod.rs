//! # Web Handlers
//!
//! - [`metrics`] - Prometheus scrape endpoint
//! - [`health`] - Liveness check

pub mod health;
pub mod metrics;
