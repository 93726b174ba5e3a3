//! Outbound delivery port
//!
//! Transports whose replies cannot ride the inbound request (the Telegram
//! webhook acknowledges before the answer exists) deliver through this
//! port instead. Delivery failures are logged, never retried, because transports
//! differ in idempotency guarantees, so a blanket retry would be wrong
//! for at least one of them.

use async_trait::async_trait;
use crossbar_domain::OutboundMessage;
use thiserror::Error;

/// Errors from outbound delivery
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("transport rejected the message: {0}")]
    Rejected(String),

    #[error("transport unreachable: {0}")]
    Unreachable(String),
}

/// Contract for pushing a reply back to a transport.
#[async_trait]
pub trait OutboundDelivery: Send + Sync {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), DeliveryError>;
}
