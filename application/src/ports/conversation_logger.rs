//! Conversation logger port
//!
//! Structured transcript events, separate from diagnostic `tracing`
//! output. Implementations must never fail the orchestration path: a
//! transcript that cannot be written is dropped, not surfaced.

use std::sync::Arc;

/// A single transcript event with an arbitrary JSON payload
#[derive(Debug, Clone)]
pub struct ConversationEvent {
    pub event_type: String,
    pub payload: serde_json::Value,
}

impl ConversationEvent {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }
}

/// Port for transcript logging
pub trait ConversationLogger: Send + Sync {
    fn log(&self, event: ConversationEvent);
}

/// Null logger used when no transcript path is configured
pub struct NoConversationLogger;

impl ConversationLogger for NoConversationLogger {
    fn log(&self, _event: ConversationEvent) {}
}

/// Convenience for the common default
pub fn no_logger() -> Arc<dyn ConversationLogger> {
    Arc::new(NoConversationLogger)
}
