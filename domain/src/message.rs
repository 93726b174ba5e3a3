//! Canonical message model
//!
//! Every transport adapter translates its native request into an
//! [`InboundMessage`] before anything else happens, and turns an
//! [`OutboundMessage`] back into whatever its wire format wants. The rest
//! of the gateway never sees transport-native shapes.

use crate::conversation::ConversationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A normalized inbound user message, transport-agnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Unique id for tracing this message through the gateway
    pub id: String,
    pub conversation_id: ConversationId,
    pub text: String,
    /// Display name of the sender, when the transport knows one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(conversation_id: ConversationId, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id,
            text: text.into(),
            sender_name: None,
            received_at: Utc::now(),
        }
    }

    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }
}

/// The canonical reply, addressed by conversation identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub conversation_id: ConversationId,
    pub reply: String,
}

impl OutboundMessage {
    pub fn new(conversation_id: ConversationId, reply: impl Into<String>) -> Self {
        Self {
            conversation_id,
            reply: reply.into(),
        }
    }
}
