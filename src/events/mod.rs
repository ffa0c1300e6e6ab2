pub mod celery;
pub mod lifecycle;

// Re-export key types for convenience
pub use celery::{decode_body, decode_event, strip_event_prefix, DecodedBatch};
pub use lifecycle::{LifecycleEvent, TerminalKind};
