//! Chat-completions wire format.
//!
//! Serde types for the OpenAI-compatible `/chat/completions` contract and
//! the pure mapping between domain turns and wire messages. Keeping the
//! mapping free of I/O makes it testable without a server.
//!
//! Two quirks of the wire format worth knowing:
//!
//! - tool-call arguments travel as a JSON *string*, not a JSON object,
//!   in both directions
//! - all tool calls of one step hang off a single assistant message, so
//!   consecutive `ToolCall` turns must be folded together when encoding

use crossbar_application::ports::llm_client::{LlmReply, ProviderError};
use crossbar_domain::{CallId, ToolDescriptor, ToolInvocation, Turn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: WireFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFunctionCall {
    pub name: String,
    /// JSON-encoded arguments object
    pub arguments: String,
}

#[derive(Debug, Serialize)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionSchema,
}

#[derive(Debug, Serialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Encode advertised descriptors as function schemas.
pub fn encode_tools(tools: &[ToolDescriptor]) -> Vec<ToolSchema> {
    tools
        .iter()
        .map(|t| ToolSchema {
            kind: "function",
            function: FunctionSchema {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.input_schema.clone(),
            },
        })
        .collect()
}

/// Encode the turn history as chat messages, folding each step's
/// consecutive tool calls into one assistant message.
pub fn encode_turns(system_prompt: Option<&str>, turns: &[Turn]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(turns.len() + 1);
    if let Some(system) = system_prompt {
        messages.push(ChatMessage::text("system", system));
    }

    let mut pending_calls: Vec<WireToolCall> = Vec::new();
    for turn in turns {
        if !matches!(turn, Turn::ToolCall { .. }) && !pending_calls.is_empty() {
            messages.push(tool_call_message(std::mem::take(&mut pending_calls)));
        }
        match turn {
            Turn::User { text } => messages.push(ChatMessage::text("user", text)),
            Turn::Assistant { text } => messages.push(ChatMessage::text("assistant", text)),
            Turn::ToolCall { invocation } => pending_calls.push(WireToolCall {
                id: invocation.call_id.to_string(),
                kind: "function".to_string(),
                function: WireFunctionCall {
                    name: invocation.tool_name.clone(),
                    arguments: invocation.arguments.to_string(),
                },
            }),
            Turn::ToolResult { outcome } => messages.push(ChatMessage {
                role: "tool".to_string(),
                content: Some(outcome.payload_text()),
                tool_calls: None,
                tool_call_id: Some(outcome.call_id.to_string()),
            }),
        }
    }
    if !pending_calls.is_empty() {
        messages.push(tool_call_message(pending_calls));
    }
    messages
}

fn tool_call_message(calls: Vec<WireToolCall>) -> ChatMessage {
    ChatMessage {
        role: "assistant".to_string(),
        content: None,
        tool_calls: Some(calls),
        tool_call_id: None,
    }
}

/// Decode the provider's first choice into an [`LlmReply`].
pub fn decode_reply(response: ChatResponse) -> Result<LlmReply, ProviderError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MalformedResponse("response had no choices".into()))?;

    if let Some(calls) = choice.message.tool_calls.filter(|c| !c.is_empty()) {
        let calls = calls
            .into_iter()
            .map(|call| {
                let arguments: serde_json::Value = serde_json::from_str(&call.function.arguments)
                    .map_err(|e| {
                    ProviderError::MalformedResponse(format!(
                        "tool call '{}' carried unparseable arguments: {}",
                        call.function.name, e
                    ))
                })?;
                Ok(ToolInvocation::new(call.function.name, arguments)
                    .with_call_id(CallId::new(call.id)))
            })
            .collect::<Result<Vec<_>, ProviderError>>()?;
        return Ok(LlmReply::ToolCalls { calls });
    }

    match choice.message.content {
        Some(text) => Ok(LlmReply::Final { text }),
        None => Err(ProviderError::MalformedResponse(
            "response had neither content nor tool calls".into(),
        )),
    }
}
