//! Telegram webhook transport.
//!
//! The Bot API requires the webhook to acknowledge quickly; a slow
//! handler makes Telegram re-deliver the update. So this handler
//! validates the secret, extracts the message, spawns the orchestration
//! as a separate task, and returns 200 immediately. The eventual reply
//! travels through the outbound delivery port, not the webhook response.

use super::AppStateArc;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use crossbar_application::error_reply;
use crossbar_domain::{ConversationId, InboundMessage, OutboundMessage};
use serde::Deserialize;
use tracing::{debug, warn};

/// Header Telegram echoes the configured webhook secret in.
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

pub fn routes() -> Router<AppStateArc> {
    Router::new().route("/telegram/webhook", post(handle_update))
}

/// The slice of the Bot API Update schema the gateway consumes.
/// Unknown fields are ignored by design; Telegram adds them freely.
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    pub text: Option<String>,
    pub from: Option<TelegramUser>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    pub first_name: Option<String>,
}

async fn handle_update(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    Json(update): Json<TelegramUpdate>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let Some(telegram) = &state.telegram else {
        return Err(StatusCode::NOT_FOUND);
    };

    if !telegram.webhook_secret.is_empty() {
        let presented = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if presented != Some(telegram.webhook_secret.as_str()) {
            warn!("webhook update rejected: bad secret token");
            return Err(StatusCode::FORBIDDEN);
        }
    }

    // non-text updates (stickers, edits, joins) are acknowledged and dropped
    let Some((chat_id, text, sender)) = extract_text_message(&update) else {
        debug!(update_id = update.update_id, "ignoring non-text update");
        return Ok(Json(serde_json::json!({})));
    };

    let conversation_id = ConversationId::telegram(chat_id.to_string());
    let mut inbound = InboundMessage::new(conversation_id.clone(), text);
    if let Some(name) = sender {
        inbound = inbound.with_sender_name(name);
    }

    // acknowledge now, answer later: the orchestration must not block the
    // webhook response
    let use_case = state.use_case.clone();
    let delivery = telegram.delivery.clone();
    tokio::spawn(async move {
        let reply = match use_case.execute(inbound).await {
            Ok(outbound) => outbound.reply,
            Err(e) => error_reply(&e),
        };
        let outbound = OutboundMessage::new(conversation_id, reply);
        if let Err(e) = delivery.deliver(&outbound).await {
            warn!(
                conversation = %outbound.conversation_id,
                error = %e,
                "failed to deliver telegram reply"
            );
        }
    });

    Ok(Json(serde_json::json!({})))
}

fn extract_text_message(update: &TelegramUpdate) -> Option<(i64, String, Option<String>)> {
    let message = update.message.as_ref()?;
    let text = message.text.as_ref()?.clone();
    let sender = message
        .from
        .as_ref()
        .and_then(|u| u.first_name.clone());
    Some((message.chat.id, text, sender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_parses_with_unknown_fields() {
        let update: TelegramUpdate = serde_json::from_value(serde_json::json!({
            "update_id": 7,
            "message": {
                "message_id": 99,
                "date": 1700000000,
                "chat": {"id": 52384710, "type": "private"},
                "from": {"id": 1, "is_bot": false, "first_name": "Alice"},
                "text": "hello"
            }
        }))
        .unwrap();

        let (chat_id, text, sender) = extract_text_message(&update).unwrap();
        assert_eq!(chat_id, 52384710);
        assert_eq!(text, "hello");
        assert_eq!(sender.as_deref(), Some("Alice"));
    }

    #[test]
    fn sticker_update_yields_no_message() {
        let update: TelegramUpdate = serde_json::from_value(serde_json::json!({
            "update_id": 8,
            "message": {
                "chat": {"id": 1},
                "sticker": {"file_id": "xyz"}
            }
        }))
        .unwrap();
        assert!(extract_text_message(&update).is_none());
    }
}
