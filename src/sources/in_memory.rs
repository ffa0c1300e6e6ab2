//! # In-Memory Event Source
//!
//! Channel-backed [`EventSource`] for tests and local development. Deliveries
//! are either already-decoded lifecycle events or raw Celery message bodies,
//! which go through the same decoding path as broker messages.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::{remaining_budget, CaptureOutcome, EventHandler, EventSource, PendingEvents};
use crate::error::{ExporterError, Result};
use crate::events::LifecycleEvent;

#[derive(Debug, Clone)]
enum Delivery {
    Event(LifecycleEvent),
    Raw(Vec<u8>),
}

/// Sending half of an [`InMemoryEventSource`]
#[derive(Debug, Clone)]
pub struct InMemoryEventSender {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl InMemoryEventSender {
    pub fn send(&self, event: LifecycleEvent) -> Result<()> {
        self.push(Delivery::Event(event))
    }

    /// Send a raw Celery message body (single event object or array)
    pub fn send_raw(&self, body: impl Into<Vec<u8>>) -> Result<()> {
        self.push(Delivery::Raw(body.into()))
    }

    fn push(&self, delivery: Delivery) -> Result<()> {
        self.tx
            .send(delivery)
            .map_err(|_| ExporterError::subscription("in-memory", "event source was dropped"))
    }
}

#[derive(Debug)]
pub struct InMemoryEventSource {
    rx: mpsc::UnboundedReceiver<Delivery>,
    pending: PendingEvents,
}

impl InMemoryEventSource {
    /// Create a connected sender/source pair
    pub fn channel() -> (InMemoryEventSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            InMemoryEventSender { tx },
            Self {
                rx,
                pending: PendingEvents::default(),
            },
        )
    }

    /// Source that yields `events` and is then exhausted
    pub fn from_events(events: impl IntoIterator<Item = LifecycleEvent>) -> Self {
        let (sender, source) = Self::channel();
        for event in events {
            // The receiver is alive, so sending cannot fail
            let _ = sender.send(event);
        }
        source
    }
}

#[async_trait]
impl EventSource for InMemoryEventSource {
    async fn capture(
        &mut self,
        limit: Option<usize>,
        handler: &dyn EventHandler,
    ) -> Result<CaptureOutcome> {
        let mut delivered = self.pending.drain(handler, remaining_budget(limit, 0));

        loop {
            if remaining_budget(limit, delivered) == 0 {
                return Ok(CaptureOutcome::LimitReached { delivered });
            }

            let Some(delivery) = self.rx.recv().await else {
                debug!(delivered, "In-memory event source exhausted");
                return Ok(CaptureOutcome::Exhausted { delivered });
            };

            match delivery {
                Delivery::Event(event) => {
                    handler.handle(event);
                    delivered += 1;
                }
                Delivery::Raw(body) => {
                    delivered +=
                        self.pending
                            .deliver_body(&body, handler, remaining_budget(limit, delivered));
                }
            }
        }
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}
