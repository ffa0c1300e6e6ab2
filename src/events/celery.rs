//! # Celery Event Decoding
//!
//! Converts Celery event message bodies into [`LifecycleEvent`]s. A body holds
//! either a single event object or an array of them when the producer flushes a
//! buffered group. Event types the exporter does not track (`task-received`,
//! `task-retried`, `worker-heartbeat`, ...) decode to nothing.

use serde::Deserialize;
use serde_json::Value;

use super::lifecycle::{LifecycleEvent, TerminalKind};
use crate::constants::celery;
use crate::error::{ExporterError, Result};

/// Fields the exporter reads from a Celery event; everything else is ignored
#[derive(Debug, Deserialize)]
struct RawCeleryEvent {
    #[serde(rename = "type")]
    event_type: String,
    uuid: Option<String>,
    timestamp: Option<f64>,
    routing_key: Option<String>,
    queue: Option<String>,
    name: Option<String>,
    hostname: Option<String>,
}

/// Result of decoding one message body
#[derive(Debug, Default)]
pub struct DecodedBatch {
    /// Tracked lifecycle events, in body order
    pub events: Vec<LifecycleEvent>,
    /// Entries with an event type the exporter does not track
    pub skipped: usize,
    /// Entries with a tracked type that could not be decoded
    pub errors: Vec<ExporterError>,
}

/// Strip the transport prefix from a Celery event type (`task-failed` -> `failed`)
pub fn strip_event_prefix(event_type: &str) -> &str {
    event_type
        .strip_prefix(celery::TASK_EVENT_PREFIX)
        .unwrap_or(event_type)
}

/// Decode a raw message body.
///
/// Only a body that is not JSON at all is an error; problems with individual
/// entries are collected in [`DecodedBatch::errors`].
pub fn decode_body(body: &[u8]) -> Result<DecodedBatch> {
    let value: Value = serde_json::from_slice(body)?;
    let entries = match value {
        Value::Array(entries) => entries,
        other => vec![other],
    };

    let mut batch = DecodedBatch::default();
    for entry in entries {
        match decode_event(entry) {
            Ok(Some(event)) => batch.events.push(event),
            Ok(None) => batch.skipped += 1,
            Err(e) => batch.errors.push(e),
        }
    }
    Ok(batch)
}

/// Decode a single Celery event object
pub fn decode_event(value: Value) -> Result<Option<LifecycleEvent>> {
    let raw: RawCeleryEvent = serde_json::from_value(value)?;

    let event = match raw.event_type.as_str() {
        celery::TASK_SENT => {
            let queue = raw
                .routing_key
                .clone()
                .or_else(|| raw.queue.clone())
                .ok_or_else(|| missing(&raw, "routing_key"))?;
            LifecycleEvent::Enqueued {
                task_id: required(&raw, raw.uuid.clone(), "uuid")?,
                timestamp: required(&raw, raw.timestamp, "timestamp")?,
                queue,
                task_name: required(&raw, raw.name.clone(), "name")?,
            }
        }
        celery::TASK_STARTED => LifecycleEvent::Started {
            task_id: required(&raw, raw.uuid.clone(), "uuid")?,
            timestamp: required(&raw, raw.timestamp, "timestamp")?,
            worker: required(&raw, raw.hostname.clone(), "hostname")?,
        },
        celery::TASK_SUCCEEDED | celery::TASK_FAILED | celery::TASK_REVOKED => {
            let kind: TerminalKind = strip_event_prefix(&raw.event_type)
                .parse()
                .map_err(ExporterError::decode)?;
            LifecycleEvent::Terminal {
                task_id: required(&raw, raw.uuid.clone(), "uuid")?,
                timestamp: required(&raw, raw.timestamp, "timestamp")?,
                worker: required(&raw, raw.hostname.clone(), "hostname")?,
                kind,
            }
        }
        _ => return Ok(None),
    };

    Ok(Some(event))
}

fn required<T>(raw: &RawCeleryEvent, value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| missing(raw, field))
}

fn missing(raw: &RawCeleryEvent, field: &str) -> ExporterError {
    ExporterError::decode(format!(
        "{} event is missing required field `{field}`",
        raw.event_type
    ))
}
