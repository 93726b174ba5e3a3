//! Web message endpoint.
//!
//! `POST /v1/message` accepts `{conversation_id?, text}` and answers
//! `{conversation_id, reply}`. A missing conversation id mints a fresh
//! one, which the client echoes back on subsequent requests to continue
//! the same conversation.

use super::AppStateArc;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use crossbar_application::{ProcessMessageError, error_reply};
use crossbar_domain::{ConversationId, InboundMessage};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

pub fn routes() -> Router<AppStateArc> {
    Router::new().route("/v1/message", post(handle_message))
}

#[derive(Debug, Deserialize)]
pub struct WebMessageRequest {
    pub conversation_id: Option<String>,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct WebMessageResponse {
    pub conversation_id: String,
    pub reply: String,
}

async fn handle_message(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    Json(request): Json<WebMessageRequest>,
) -> Result<Json<WebMessageResponse>, (StatusCode, String)> {
    check_api_key(&state.api_keys, &headers)?;

    if request.text.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "text must not be empty".into()));
    }

    let peer = request
        .conversation_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let conversation_id = ConversationId::web(peer.clone());
    let inbound = InboundMessage::new(conversation_id, request.text);

    match state.use_case.execute(inbound).await {
        Ok(outbound) => Ok(Json(WebMessageResponse {
            conversation_id: peer,
            reply: outbound.reply,
        })),
        Err(ProcessMessageError::Busy) => Err((
            StatusCode::CONFLICT,
            error_reply(&ProcessMessageError::Busy),
        )),
        Err(e) => {
            error!(error = %e, "web message processing failed");
            Err((StatusCode::BAD_GATEWAY, error_reply(&e)))
        }
    }
}

/// Enforce X-Api-Key when keys are configured. An empty key list leaves
/// the endpoint open (local deployments).
fn check_api_key(api_keys: &[String], headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    if api_keys.is_empty() {
        return Ok(());
    }
    match headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        None => Err((StatusCode::UNAUTHORIZED, "missing API key".into())),
        Some(key) if api_keys.iter().any(|k| k == key) => Ok(()),
        Some(_) => Err((StatusCode::FORBIDDEN, "invalid API key".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_list_leaves_endpoint_open() {
        assert!(check_api_key(&[], &HeaderMap::new()).is_ok());
    }

    #[test]
    fn missing_key_is_unauthorized_and_wrong_key_forbidden() {
        let keys = vec!["secret".to_string()];

        let err = check_api_key(&keys, &HeaderMap::new()).unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "wrong".parse().unwrap());
        let err = check_api_key(&keys, &headers).unwrap_err();
        assert_eq!(err.0, StatusCode::FORBIDDEN);

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "secret".parse().unwrap());
        assert!(check_api_key(&keys, &headers).is_ok());
    }
}
