//! # AMQP Event Source
//!
//! Subscribes to Celery task events on an AMQP 0.9.1 broker using `lapin`.
//!
//! Celery workers and producers publish events to the `celeryev` topic exchange
//! with routing keys such as `task.sent` or `task.succeeded`. The exporter
//! declares a private receiver queue bound with `task.#`:
//!
//! - **exclusive, auto-delete**: the queue goes away with the connection
//! - **x-message-ttl**: stale events are dropped while the exporter is behind
//! - **x-expires**: an abandoned queue is removed by the broker
//!
//! Messages are consumed without acknowledgement. A lost event only means a
//! missed observation; the dispatcher tolerates gaps.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicConsumeOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use tracing::{debug, info};
use uuid::Uuid;

use super::{remaining_budget, CaptureOutcome, EventHandler, EventSource, PendingEvents};
use crate::config::redact_url;
use crate::constants::celery::{
    CONSUMER_TAG, EVENT_EXCHANGE, EVENT_QUEUE_EXPIRES_MS, EVENT_QUEUE_TTL_MS,
    RECEIVER_QUEUE_PREFIX, TASK_ROUTING_KEY,
};
use crate::error::{ExporterError, Result};

const SOURCE_NAME: &str = "amqp";

/// Celery transport aliases that speak plain AMQP
const AMQP_ALIASES: &[&str] = &["pyamqp", "librabbitmq"];

/// Rewrite a Celery broker URL into one `lapin` accepts.
///
/// `pyamqp://` and `librabbitmq://` become `amqp://`; `amqp://` and `amqps://`
/// pass through. Any other transport is a configuration error.
pub fn normalize_broker_url(url: &str) -> Result<String> {
    let Some((scheme, rest)) = url.split_once("://") else {
        return Err(ExporterError::configuration(
            "BROKER_URL",
            format!("`{}` is not a URL", redact_url(url)),
        ));
    };

    match scheme.to_ascii_lowercase().as_str() {
        "amqp" | "amqps" => Ok(url.to_string()),
        alias if AMQP_ALIASES.contains(&alias) => Ok(format!("amqp://{rest}")),
        other => Err(ExporterError::configuration(
            "BROKER_URL",
            format!("`{other}` is not an AMQP transport"),
        )),
    }
}

struct Subscription {
    // Held so the channel stays open for the life of the consumer
    _connection: Connection,
    _channel: Channel,
    consumer: Consumer,
}

/// Event source reading the Celery event stream from an AMQP broker.
///
/// The connection is opened lazily by the first capture and reused by later
/// captures. A failed capture drops it so the next capture reconnects.
pub struct AmqpEventSource {
    broker_url: String,
    node_id: Uuid,
    subscription: Option<Subscription>,
    pending: PendingEvents,
}

impl std::fmt::Debug for AmqpEventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpEventSource")
            .field("broker_url", &redact_url(&self.broker_url))
            .field("queue", &self.queue_name())
            .field("connected", &self.subscription.is_some())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl AmqpEventSource {
    pub fn new(broker_url: &str) -> Result<Self> {
        Ok(Self {
            broker_url: normalize_broker_url(broker_url)?,
            node_id: Uuid::new_v4(),
            subscription: None,
            pending: PendingEvents::default(),
        })
    }

    /// Name of this receiver's private queue
    pub fn queue_name(&self) -> String {
        format!("{RECEIVER_QUEUE_PREFIX}.{}", self.node_id)
    }

    pub fn is_connected(&self) -> bool {
        self.subscription.is_some()
    }

    async fn subscribe(&self) -> Result<Subscription> {
        let connection = Connection::connect(
            &self.broker_url,
            ConnectionProperties::default().with_connection_name(CONSUMER_TAG.into()),
        )
        .await
        .map_err(|e| {
            ExporterError::subscription(SOURCE_NAME, format!("broker connection failed: {e}"))
        })?;

        let channel = connection.create_channel().await.map_err(|e| {
            ExporterError::subscription(SOURCE_NAME, format!("channel creation failed: {e}"))
        })?;

        channel
            .exchange_declare(
                EVENT_EXCHANGE,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        let queue_name = self.queue_name();
        let mut args = FieldTable::default();
        args.insert(
            "x-message-ttl".into(),
            AMQPValue::LongInt(EVENT_QUEUE_TTL_MS),
        );
        args.insert("x-expires".into(), AMQPValue::LongInt(EVENT_QUEUE_EXPIRES_MS));

        channel
            .queue_declare(
                &queue_name,
                QueueDeclareOptions {
                    exclusive: true,
                    auto_delete: true,
                    ..Default::default()
                },
                args,
            )
            .await?;

        channel
            .queue_bind(
                &queue_name,
                EVENT_EXCHANGE,
                TASK_ROUTING_KEY,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let consumer = channel
            .basic_consume(
                &queue_name,
                CONSUMER_TAG,
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        info!(
            broker = %redact_url(&self.broker_url),
            queue = %queue_name,
            "Subscribed to Celery task events"
        );

        Ok(Subscription {
            _connection: connection,
            _channel: channel,
            consumer,
        })
    }

    async fn consume(
        subscription: &mut Subscription,
        pending: &mut PendingEvents,
        limit: Option<usize>,
        handler: &dyn EventHandler,
        mut delivered: usize,
    ) -> Result<CaptureOutcome> {
        while remaining_budget(limit, delivered) > 0 {
            let Some(message) = subscription.consumer.next().await else {
                return Err(ExporterError::subscription(
                    SOURCE_NAME,
                    "consumer stream ended unexpectedly",
                ));
            };
            let message = message?;
            delivered +=
                pending.deliver_body(&message.data, handler, remaining_budget(limit, delivered));
        }
        Ok(CaptureOutcome::LimitReached { delivered })
    }
}

#[async_trait]
impl EventSource for AmqpEventSource {
    async fn capture(
        &mut self,
        limit: Option<usize>,
        handler: &dyn EventHandler,
    ) -> Result<CaptureOutcome> {
        let delivered = self.pending.drain(handler, remaining_budget(limit, 0));
        if remaining_budget(limit, delivered) == 0 {
            return Ok(CaptureOutcome::LimitReached { delivered });
        }

        let mut subscription = match self.subscription.take() {
            Some(subscription) => subscription,
            None => self.subscribe().await?,
        };

        let outcome =
            Self::consume(&mut subscription, &mut self.pending, limit, handler, delivered).await;
        match &outcome {
            Ok(outcome) => {
                debug!(delivered = outcome.delivered(), "AMQP capture finished");
                self.subscription = Some(subscription);
            }
            Err(e) => debug!(error = %e, "AMQP capture failed; dropping connection"),
        }
        outcome
    }

    fn describe(&self) -> String {
        format!("amqp {} ({})", redact_url(&self.broker_url), self.queue_name())
    }
}
