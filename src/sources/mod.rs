//! # Event Sources
//!
//! Subscriptions that deliver lifecycle events to an [`EventHandler`].
//!
//! A capture runs until `limit` events have been delivered or the source is
//! exhausted. Decoding failures on individual messages are logged and skipped;
//! only a broken subscription ends a capture with an error.
//!
//! One broker message can carry a batch of events. Events past the capture
//! limit stay in the source's [`PendingEvents`] and open the next capture.

pub mod amqp;
pub mod in_memory;
pub mod redis;

pub use amqp::AmqpEventSource;
pub use in_memory::{InMemoryEventSender, InMemoryEventSource};
pub use self::redis::RedisEventSource;

use std::collections::VecDeque;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::redact_url;
use crate::error::{ExporterError, Result};
use crate::events::{decode_body, LifecycleEvent};

/// Receives each decoded lifecycle event in arrival order
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: LifecycleEvent);
}

impl<F> EventHandler for F
where
    F: Fn(LifecycleEvent) + Send + Sync,
{
    fn handle(&self, event: LifecycleEvent) {
        self(event)
    }
}

/// How a capture ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The requested number of events was delivered
    LimitReached { delivered: usize },
    /// The source has nothing more to deliver
    Exhausted { delivered: usize },
}

impl CaptureOutcome {
    pub fn delivered(&self) -> usize {
        match self {
            Self::LimitReached { delivered } | Self::Exhausted { delivered } => *delivered,
        }
    }
}

#[async_trait]
pub trait EventSource: Send {
    /// Deliver events to `handler` until `limit` is reached (if any) or the
    /// source ends.
    async fn capture(
        &mut self,
        limit: Option<usize>,
        handler: &dyn EventHandler,
    ) -> Result<CaptureOutcome>;

    /// Human readable description used in logs
    fn describe(&self) -> String;
}

/// Build the event source matching the broker URL's transport.
///
/// AMQP transports (`amqp`, `amqps`, `pyamqp`, `librabbitmq`) map to
/// [`AmqpEventSource`] and `redis` to [`RedisEventSource`]. Anything else is a
/// configuration error.
pub fn event_source_for(broker_url: &str) -> Result<Box<dyn EventSource>> {
    let scheme = broker_url
        .split_once("://")
        .map(|(scheme, _)| scheme.to_ascii_lowercase())
        .ok_or_else(|| {
            ExporterError::configuration(
                "BROKER_URL",
                format!("`{}` is not a URL", redact_url(broker_url)),
            )
        })?;

    match scheme.as_str() {
        "amqp" | "amqps" | "pyamqp" | "librabbitmq" => {
            Ok(Box::new(AmqpEventSource::new(broker_url)?))
        }
        "redis" | "rediss" => Ok(Box::new(RedisEventSource::new(broker_url)?)),
        other => Err(ExporterError::configuration(
            "BROKER_URL",
            format!("unsupported broker transport `{other}`; use an AMQP or Redis broker"),
        )),
    }
}

/// Decoded events a capture could not deliver within its limit
#[derive(Debug, Default)]
pub(crate) struct PendingEvents {
    events: VecDeque<LifecycleEvent>,
}

impl PendingEvents {
    /// Deliver held-over events, at most `budget` of them
    pub(crate) fn drain(&mut self, handler: &dyn EventHandler, budget: usize) -> usize {
        let count = budget.min(self.events.len());
        for event in self.events.drain(..count) {
            handler.handle(event);
        }
        count
    }

    /// Decode a raw message body and hand its lifecycle events to `handler`.
    ///
    /// Delivers at most `budget` events and holds the rest for the next
    /// [`drain`](Self::drain). Returns the number delivered.
    pub(crate) fn deliver_body(
        &mut self,
        body: &[u8],
        handler: &dyn EventHandler,
        budget: usize,
    ) -> usize {
        let batch = match decode_body(body) {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "Discarding undecodable event message");
                return 0;
            }
        };

        for error in &batch.errors {
            warn!(error = %error, "Skipping malformed task event");
        }

        let mut events = batch.events.into_iter();
        let mut delivered = 0;
        for event in events.by_ref().take(budget) {
            handler.handle(event);
            delivered += 1;
        }

        self.events.extend(events);
        if !self.is_empty() {
            debug!(held = self.events.len(), "Holding batched events for the next capture");
        }
        delivered
    }

    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Events still allowed under `limit` after `delivered`
pub(crate) fn remaining_budget(limit: Option<usize>, delivered: usize) -> usize {
    limit.map_or(usize::MAX, |limit| limit.saturating_sub(delivered))
}
