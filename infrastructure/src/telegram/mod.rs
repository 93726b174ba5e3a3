//! Telegram Bot API outbound client.
//!
//! The webhook transport acknowledges updates before a reply exists, so
//! replies go out through this client as a separate `sendMessage` call.
//! Delivery failures are reported to the caller, which logs them; no
//! retry happens here.

use async_trait::async_trait;
use crossbar_application::ports::delivery::{DeliveryError, OutboundDelivery};
use crossbar_domain::OutboundMessage;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Default Bot API base; overridable for tests and proxies.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Serialize)]
struct SendMessageBody<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Client for the Bot API `sendMessage` method.
pub struct TelegramApi {
    http: reqwest::Client,
    token: String,
    api_base: String,
}

impl TelegramApi {
    pub fn new(token: impl Into<String>, api_base: impl Into<String>) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DeliveryError::Unreachable(e.to_string()))?;
        Ok(Self {
            http,
            token: token.into(),
            api_base: api_base.into(),
        })
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_base.trim_end_matches('/'),
            self.token
        )
    }

    /// Send `text` to a chat.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), DeliveryError> {
        debug!(chat_id, "delivering reply via Bot API");
        let response = self
            .http
            .post(self.send_message_url())
            .json(&SendMessageBody { chat_id, text })
            .send()
            .await
            .map_err(|e| DeliveryError::Unreachable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DeliveryError::Rejected(format!("{}: {}", status, body)))
        }
    }
}

#[async_trait]
impl OutboundDelivery for TelegramApi {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        self.send_message(&message.conversation_id.peer, &message.reply)
            .await
    }
}
