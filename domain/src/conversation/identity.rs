//! Conversation identity
//!
//! A conversation is keyed by the transport it arrived on plus the
//! transport's own notion of a peer (CLI user, web session id, Telegram
//! chat id). Two users talking over the same transport, or one user
//! talking over two transports, never share state.

use crate::core::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The client transport a conversation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Interactive command-line session
    Cli,
    /// Web request/response endpoint
    Web,
    /// Telegram Bot API webhook
    Telegram,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Cli => "cli",
            TransportKind::Web => "web",
            TransportKind::Telegram => "telegram",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cli" => Ok(TransportKind::Cli),
            "web" => Ok(TransportKind::Web),
            "telegram" => Ok(TransportKind::Telegram),
            other => Err(DomainError::InvalidIdentity(format!(
                "unknown transport kind: {}",
                other
            ))),
        }
    }
}

/// Identity of a conversation: transport kind + transport-specific peer id.
///
/// Displayed as `transport:peer` (e.g. `telegram:52384710`, `web:3f0a…`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId {
    pub transport: TransportKind,
    pub peer: String,
}

impl ConversationId {
    pub fn new(transport: TransportKind, peer: impl Into<String>) -> Self {
        Self {
            transport,
            peer: peer.into(),
        }
    }

    pub fn cli(peer: impl Into<String>) -> Self {
        Self::new(TransportKind::Cli, peer)
    }

    pub fn web(peer: impl Into<String>) -> Self {
        Self::new(TransportKind::Web, peer)
    }

    pub fn telegram(peer: impl Into<String>) -> Self {
        Self::new(TransportKind::Telegram, peer)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.transport, self.peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_kind_round_trips_through_str() {
        for kind in [TransportKind::Cli, TransportKind::Web, TransportKind::Telegram] {
            assert_eq!(kind.as_str().parse::<TransportKind>().unwrap(), kind);
        }
        assert!("smoke-signal".parse::<TransportKind>().is_err());
    }

    #[test]
    fn conversation_id_display() {
        let id = ConversationId::telegram("52384710");
        assert_eq!(id.to_string(), "telegram:52384710");
    }

    #[test]
    fn same_peer_different_transport_is_different_identity() {
        assert_ne!(ConversationId::web("alice"), ConversationId::cli("alice"));
    }
}
