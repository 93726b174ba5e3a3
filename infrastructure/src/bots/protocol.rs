//! Bot wire protocol.
//!
//! Backends speak newline-delimited JSON frames over a single TCP
//! connection:
//!
//! - `register` (backend → gateway): the handshake, first frame on the
//!   connection, advertising the backend's tool descriptors
//! - `registered` (gateway → backend): handshake acknowledgment
//! - `invoke` (gateway → backend): one tool call with its correlation id
//! - `result` (backend → gateway): the correlated answer, output or error
//!
//! Frames are self-describing via the `type` tag, so both sides can parse
//! a line without knowing what they are waiting for.

use crossbar_domain::ToolDescriptor;
use serde::{Deserialize, Serialize};

/// One protocol frame, as carried on a single line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BotFrame {
    /// Handshake: advertise tools. Must be the first frame a backend sends.
    Register {
        backend_id: String,
        tools: Vec<ToolDescriptor>,
    },
    /// Handshake acknowledgment.
    Registered { backend_id: String },
    /// A tool call dispatched to the backend.
    Invoke {
        correlation_id: String,
        tool: String,
        #[serde(default)]
        args: serde_json::Value,
    },
    /// The settled answer to an earlier `invoke`.
    Result {
        correlation_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Encode a frame as one wire line (no trailing newline).
pub fn encode_frame(frame: &BotFrame) -> Result<String, serde_json::Error> {
    serde_json::to_string(frame)
}

/// Decode one wire line into a frame.
pub fn decode_frame(line: &str) -> Result<BotFrame, serde_json::Error> {
    serde_json::from_str(line)
}
