//! Conversation entities
//!
//! A [`Conversation`] is the ordered dialogue state between one peer and
//! the assistant on one transport. Turns are append-only: once recorded
//! they are never rewritten, which is what makes the correlation between
//! a [`Turn::ToolCall`] and its [`Turn::ToolResult`] meaningful.

use super::identity::ConversationId;
use crate::tool::{CallId, ToolInvocation, ToolOutcome};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One entry in a conversation's history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    /// Text the user sent
    User { text: String },
    /// Final (or synthetic) assistant reply
    Assistant { text: String },
    /// A tool call the LLM requested
    ToolCall { invocation: ToolInvocation },
    /// The settled result correlated to an earlier tool call
    ToolResult { outcome: ToolOutcome },
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Turn::User { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Turn::Assistant { text: text.into() }
    }

    pub fn tool_call(invocation: ToolInvocation) -> Self {
        Turn::ToolCall { invocation }
    }

    pub fn tool_result(outcome: ToolOutcome) -> Self {
        Turn::ToolResult { outcome }
    }

    /// Role label used in logs and transcripts
    pub fn role(&self) -> &'static str {
        match self {
            Turn::User { .. } => "user",
            Turn::Assistant { .. } => "assistant",
            Turn::ToolCall { .. } => "tool_call",
            Turn::ToolResult { .. } => "tool_result",
        }
    }

    /// The correlation id, for the two tool-related turn kinds
    pub fn call_id(&self) -> Option<&CallId> {
        match self {
            Turn::ToolCall { invocation } => Some(&invocation.call_id),
            Turn::ToolResult { outcome } => Some(&outcome.call_id),
            _ => None,
        }
    }
}

/// Ordered dialogue state for one conversation identity.
///
/// Created on the first inbound message for an identity, mutated only by
/// appending turns, and never destroyed explicitly; the session store's
/// idle-eviction policy removes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    id: ConversationId,
    turns: Vec<Turn>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: ConversationId) -> Self {
        let now = Utc::now();
        Self {
            id,
            turns: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Append a turn and refresh the activity timestamp.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.last_activity = Utc::now();
    }

    /// How long the conversation has been idle as of `now`.
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_activity
    }

    /// Whether every tool call so far has a correlated result.
    ///
    /// Holds between orchestration steps; a step is not settled until its
    /// calls are (a timeout produces a synthetic error result, so even
    /// abandoned calls settle).
    pub fn is_settled(&self) -> bool {
        self.turns
            .iter()
            .filter_map(|t| match t {
                Turn::ToolCall { invocation } => Some(&invocation.call_id),
                _ => None,
            })
            .all(|call_id| {
                self.turns.iter().any(|t| {
                    matches!(t, Turn::ToolResult { outcome } if &outcome.call_id == call_id)
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolFault;

    fn conversation() -> Conversation {
        Conversation::new(ConversationId::web("peer-1"))
    }

    #[test]
    fn append_preserves_order() {
        let mut convo = conversation();
        convo.append(Turn::user("hello"));
        convo.append(Turn::assistant("hi there"));

        let roles: Vec<_> = convo.turns().iter().map(|t| t.role()).collect();
        assert_eq!(roles, ["user", "assistant"]);
    }

    #[test]
    fn append_refreshes_activity() {
        let mut convo = conversation();
        let before = convo.last_activity();
        convo.append(Turn::user("hello"));
        assert!(convo.last_activity() >= before);
    }

    #[test]
    fn unanswered_tool_call_is_not_settled() {
        let mut convo = conversation();
        let invocation = ToolInvocation::new("get_weather", serde_json::json!({"city": "Paris"}));
        let call_id = invocation.call_id.clone();
        convo.append(Turn::tool_call(invocation));
        assert!(!convo.is_settled());

        convo.append(Turn::tool_result(ToolOutcome::success(
            call_id,
            "get_weather",
            "{\"temp\": 18}",
        )));
        assert!(convo.is_settled());
    }

    #[test]
    fn fault_result_settles_its_call() {
        let mut convo = conversation();
        let invocation = ToolInvocation::new("get_stock", serde_json::json!({}));
        let call_id = invocation.call_id.clone();
        convo.append(Turn::tool_call(invocation));
        convo.append(Turn::tool_result(ToolOutcome::fault(
            call_id,
            "get_stock",
            ToolFault::unknown_tool("get_stock"),
        )));
        assert!(convo.is_settled());
    }
}
