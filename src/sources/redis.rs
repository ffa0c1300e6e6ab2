//! # Redis Event Source
//!
//! Subscribes to Celery task events on a Redis broker.
//!
//! The Redis transport has no exchanges, so events go out over pub/sub. The
//! `celeryev` exchange becomes the fanout channel `/<db>.celeryev`, suffixed with
//! `/<routing key>` when fanout patterns are enabled (the Celery default). The
//! source pattern-subscribes to `/<db>.celeryev/task.*` and also subscribes to
//! the bare channel, so both publisher settings are covered.
//!
//! Each message is a transport envelope:
//!
//! ```json
//! {"body": "<base64>", "content-encoding": "utf-8",
//!  "properties": {"body_encoding": "base64", ...}, ...}
//! ```
//!
//! The unwrapped body is the same Celery event payload an AMQP delivery carries.
//! Pub/sub has no persistence, so events published while the exporter is
//! disconnected are lost.

use std::pin::Pin;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, info};

use super::{remaining_budget, CaptureOutcome, EventHandler, EventSource, PendingEvents};
use crate::config::redact_url;
use crate::constants::celery::{
    BASE64_BODY_ENCODING, EVENT_EXCHANGE, REDIS_FANOUT_PREFIX, REDIS_TASK_PATTERN,
};
use crate::error::{ExporterError, Result};

const SOURCE_NAME: &str = "redis";

type MessageStream = Pin<Box<dyn Stream<Item = redis::Msg> + Send>>;

#[derive(Debug, Deserialize)]
struct Envelope {
    body: String,
    #[serde(default)]
    properties: EnvelopeProperties,
}

#[derive(Debug, Default, Deserialize)]
struct EnvelopeProperties {
    body_encoding: Option<String>,
}

/// Extract the Celery event body from a Redis transport envelope
pub fn unwrap_envelope(payload: &[u8]) -> Result<Vec<u8>> {
    let envelope: Envelope = serde_json::from_slice(payload)?;
    match envelope.properties.body_encoding.as_deref() {
        Some(BASE64_BODY_ENCODING) => STANDARD
            .decode(envelope.body.as_bytes())
            .map_err(|e| ExporterError::decode(format!("invalid base64 event body: {e}"))),
        _ => Ok(envelope.body.into_bytes()),
    }
}

/// Database index from the URL path, `0` when absent
fn database_index(broker_url: &str) -> Result<u32> {
    let rest = broker_url
        .split_once("://")
        .map_or(broker_url, |(_, rest)| rest);
    let host_and_path = rest.rsplit_once('@').map_or(rest, |(_, tail)| tail);
    let path = host_and_path
        .split_once('/')
        .map_or("", |(_, path)| path)
        .split(['?', '#'])
        .next()
        .unwrap_or("");

    if path.is_empty() {
        return Ok(0);
    }
    path.parse().map_err(|_| {
        ExporterError::configuration(
            "BROKER_URL",
            format!("`{path}` is not a Redis database index"),
        )
    })
}

/// Event source reading Celery events from Redis pub/sub.
///
/// Like the AMQP source, the subscription is opened by the first capture,
/// reused afterwards and dropped when a capture fails.
pub struct RedisEventSource {
    broker_url: String,
    database: u32,
    messages: Option<MessageStream>,
    pending: PendingEvents,
}

impl std::fmt::Debug for RedisEventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisEventSource")
            .field("broker_url", &redact_url(&self.broker_url))
            .field("channel", &self.channel())
            .field("connected", &self.messages.is_some())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl RedisEventSource {
    pub fn new(broker_url: &str) -> Result<Self> {
        let scheme = broker_url
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase());
        match scheme.as_deref() {
            Some("redis") => {}
            Some("rediss") => {
                return Err(ExporterError::configuration(
                    "BROKER_URL",
                    "TLS Redis brokers (`rediss://`) are not supported",
                ))
            }
            _ => {
                return Err(ExporterError::configuration(
                    "BROKER_URL",
                    format!("`{}` is not a Redis URL", redact_url(broker_url)),
                ))
            }
        }

        Ok(Self {
            database: database_index(broker_url)?,
            broker_url: broker_url.to_string(),
            messages: None,
            pending: PendingEvents::default(),
        })
    }

    /// Fanout channel the event exchange maps to, e.g. `/0.celeryev`
    pub fn channel(&self) -> String {
        format!("{REDIS_FANOUT_PREFIX}{}.{EVENT_EXCHANGE}", self.database)
    }

    /// Pattern matching task events published with fanout patterns
    pub fn task_pattern(&self) -> String {
        format!("{}/{REDIS_TASK_PATTERN}", self.channel())
    }

    pub fn is_connected(&self) -> bool {
        self.messages.is_some()
    }

    async fn subscribe(&mut self) -> Result<MessageStream> {
        let client = redis::Client::open(self.broker_url.as_str()).map_err(|e| {
            ExporterError::subscription(SOURCE_NAME, format!("invalid Redis URL: {e}"))
        })?;
        let mut pubsub = client.get_async_pubsub().await.map_err(|e| {
            ExporterError::subscription(SOURCE_NAME, format!("broker connection failed: {e}"))
        })?;

        let channel = self.channel();
        let pattern = self.task_pattern();
        pubsub.psubscribe(&pattern).await?;
        pubsub.subscribe(&channel).await?;

        info!(
            broker = %redact_url(&self.broker_url),
            channel = %channel,
            pattern = %pattern,
            "Subscribed to Celery task events"
        );

        Ok(Box::pin(pubsub.into_on_message()))
    }

    async fn consume(
        messages: &mut MessageStream,
        pending: &mut PendingEvents,
        limit: Option<usize>,
        handler: &dyn EventHandler,
        mut delivered: usize,
    ) -> Result<CaptureOutcome> {
        while remaining_budget(limit, delivered) > 0 {
            let Some(message) = messages.next().await else {
                return Err(ExporterError::subscription(
                    SOURCE_NAME,
                    "pub/sub stream ended unexpectedly",
                ));
            };

            let body = match unwrap_envelope(message.get_payload_bytes()) {
                Ok(body) => body,
                Err(e) => {
                    debug!(
                        channel = %message.get_channel_name(),
                        error = %e,
                        "Discarding message without a transport envelope"
                    );
                    continue;
                }
            };
            delivered += pending.deliver_body(&body, handler, remaining_budget(limit, delivered));
        }
        Ok(CaptureOutcome::LimitReached { delivered })
    }
}

#[async_trait]
impl EventSource for RedisEventSource {
    async fn capture(
        &mut self,
        limit: Option<usize>,
        handler: &dyn EventHandler,
    ) -> Result<CaptureOutcome> {
        let delivered = self.pending.drain(handler, remaining_budget(limit, 0));
        if remaining_budget(limit, delivered) == 0 {
            return Ok(CaptureOutcome::LimitReached { delivered });
        }

        let mut messages = match self.messages.take() {
            Some(messages) => messages,
            None => self.subscribe().await?,
        };

        let outcome =
            Self::consume(&mut messages, &mut self.pending, limit, handler, delivered).await;
        match &outcome {
            Ok(outcome) => {
                debug!(delivered = outcome.delivered(), "Redis capture finished");
                self.messages = Some(messages);
            }
            Err(e) => debug!(error = %e, "Redis capture failed; dropping connection"),
        }
        outcome
    }

    fn describe(&self) -> String {
        format!("redis {} ({})", redact_url(&self.broker_url), self.channel())
    }
}
