#![allow(clippy::doc_markdown)] // Allow technical terms like RabbitMQ, Celery in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Celery Exporter
//!
//! Prometheus exporter for Celery task lifecycle metrics.
//!
//! ## Overview
//!
//! Celery workers and producers publish a stream of task events to the broker.
//! The exporter subscribes to that stream, follows every task from the moment it
//! is published until it finishes, and derives metrics no single event carries:
//!
//! - how many tasks are waiting in each queue
//! - how long tasks waited before a worker picked them up
//! - how many tasks each worker is executing
//! - how long tasks ran, by final state
//!
//! ## Architecture
//!
//! In-flight tasks live in a bounded cache that evicts the oldest record when
//! full, so memory stays flat when terminal events are lost. A single
//! dispatcher applies each event to the cache and the metric instruments; it
//! sits behind one lock shared with the scrape-time tracked-tasks gauge.
//!
//! ## Module Organization
//!
//! - [`tracking`] - Task records and the bounded state cache
//! - [`events`] - Lifecycle event model and Celery payload decoding
//! - [`metrics`] - Prometheus instruments and text encoding
//! - [`monitor`] - Lifecycle dispatcher and the monitor that drives it
//! - [`sources`] - AMQP, Redis and in-memory event sources
//! - [`web`] - `/metrics` and `/health` endpoints
//! - [`bootstrap`] - Wiring configuration, monitor, source and server
//! - [`config`] - Environment configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust
//! use celery_exporter::events::LifecycleEvent;
//! use celery_exporter::monitor::Monitor;
//! use prometheus::Registry;
//!
//! # fn example() -> celery_exporter::Result<()> {
//! let registry = Registry::new();
//! let monitor = Monitor::new(1000, &registry)?;
//!
//! monitor.apply(LifecycleEvent::enqueued("A", 100.0, "default", "app.add"));
//! monitor.apply(LifecycleEvent::started("A", 105.0, "celery@w1"));
//! monitor.apply(LifecycleEvent::succeeded("A", 130.0, "celery@w1"));
//!
//! let text = celery_exporter::metrics::encode_text(&registry)?;
//! assert!(text.contains("celery_tasks_duration_seconds"));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib                    # Unit tests
//! cargo test                          # All tests
//! cargo test -- --ignored             # Broker tests (needs RabbitMQ and Redis)
//! cargo bench --features benchmarks   # Cache benchmarks
//! ```

pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod monitor;
pub mod sources;
pub mod tracking;
pub mod web;

pub use bootstrap::Exporter;
pub use config::ExporterConfig;
pub use error::{ExporterError, Result};
pub use events::{LifecycleEvent, TerminalKind};
pub use metrics::MetricInstruments;
pub use monitor::{IgnoreReason, LifecycleDispatcher, Monitor, Transition};
pub use sources::{
    event_source_for, AmqpEventSource, CaptureOutcome, EventHandler, EventSource,
    InMemoryEventSender, InMemoryEventSource, RedisEventSource,
};
pub use tracking::{TaskPhase, TaskRecord, TaskStateCache};
