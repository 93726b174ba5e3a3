//! Conversation domain.
//!
//! - [`identity::ConversationId`] - transport kind + peer id, the unit of state ownership
//! - [`entities::Conversation`] - append-only turn history with activity tracking
//! - [`entities::Turn`] - user / assistant / tool-call / tool-result entries

pub mod entities;
pub mod identity;

pub use entities::{Conversation, Turn};
pub use identity::{ConversationId, TransportKind};
