//! # Metrics
//!
//! Prometheus instruments, the scrape-time tracked-tasks collector, and text
//! encoding of a registry.

pub mod collector;
pub mod instruments;

pub use collector::TrackedTasksCollector;
pub use instruments::MetricInstruments;

use prometheus::{Encoder, Registry, TextEncoder};

use crate::error::Result;

/// Encode all metrics of `registry` in Prometheus text format
pub fn encode_text(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("metrics output is not UTF-8: {e}")).into())
}

/// Content type of [`encode_text`] output
pub fn text_content_type() -> String {
    TextEncoder::new().format_type().to_string()
}
