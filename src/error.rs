//! # Exporter Error Types
//!
//! Structured error handling for the exporter using thiserror. Orphan events and
//! capacity-driven evictions are not errors and never surface here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("Configuration error: {key}: {message}")]
    Configuration { key: String, message: String },

    #[error("Subscription error: {source_name}: {message}")]
    Subscription {
        source_name: String,
        message: String,
    },

    #[error("Event decode error: {message}")]
    Decode { message: String },

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Metrics server error: {0}")]
    Server(#[from] std::io::Error),
}

impl ExporterError {
    /// Create a configuration error for the given setting
    pub fn configuration(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a subscription error for the given event source
    pub fn subscription(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Subscription {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create an event decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Whether the error must stop the process before any subscription begins
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

impl From<lapin::Error> for ExporterError {
    fn from(err: lapin::Error) -> Self {
        Self::subscription("amqp", err.to_string())
    }
}

impl From<redis::RedisError> for ExporterError {
    fn from(err: redis::RedisError) -> Self {
        Self::subscription("redis", err.to_string())
    }
}

impl From<serde_json::Error> for ExporterError {
    fn from(err: serde_json::Error) -> Self {
        Self::decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExporterError>;
