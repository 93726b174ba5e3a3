//! Tool outcome value objects
//!
//! Every dispatched tool call settles into exactly one [`ToolOutcome`],
//! successful or not. Faults are data, not control flow: the orchestrator
//! appends them to the conversation so the LLM can react (retry with a
//! different call, apologize, or answer with partial information).

use super::entities::CallId;
use serde::{Deserialize, Serialize};

/// Classification of a failed tool call.
///
/// | Code | Meaning |
/// |------|---------|
/// | `UNKNOWN_TOOL` | No backend currently advertises the requested name |
/// | `BACKEND_UNAVAILABLE` | The owning backend disconnected |
/// | `TIMEOUT` | The call exceeded its deadline; any late result is discarded |
/// | `INVOCATION_FAILED` | The backend reported an error of its own |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultCode {
    UnknownTool,
    BackendUnavailable,
    Timeout,
    InvocationFailed,
}

impl FaultCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultCode::UnknownTool => "UNKNOWN_TOOL",
            FaultCode::BackendUnavailable => "BACKEND_UNAVAILABLE",
            FaultCode::Timeout => "TIMEOUT",
            FaultCode::InvocationFailed => "INVOCATION_FAILED",
        }
    }
}

impl std::fmt::Display for FaultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured error payload for a failed tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolFault {
    pub code: FaultCode,
    pub message: String,
}

impl ToolFault {
    pub fn new(code: FaultCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unknown_tool(name: impl AsRef<str>) -> Self {
        Self::new(
            FaultCode::UnknownTool,
            format!("no backend advertises a tool named '{}'", name.as_ref()),
        )
    }

    pub fn backend_unavailable(backend: impl AsRef<str>) -> Self {
        Self::new(
            FaultCode::BackendUnavailable,
            format!("backend '{}' is not connected", backend.as_ref()),
        )
    }

    pub fn timeout(tool: impl AsRef<str>) -> Self {
        Self::new(
            FaultCode::Timeout,
            format!("tool '{}' did not answer before its deadline", tool.as_ref()),
        )
    }

    pub fn invocation_failed(message: impl Into<String>) -> Self {
        Self::new(FaultCode::InvocationFailed, message)
    }
}

impl std::fmt::Display for ToolFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Settled result of one tool call, correlated to its invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub call_id: CallId,
    /// Name of the tool that was (or would have been) invoked
    pub tool_name: String,
    /// Output payload for a successful call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Fault for a failed call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<ToolFault>,
}

impl ToolOutcome {
    pub fn success(call_id: CallId, tool_name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            call_id,
            tool_name: tool_name.into(),
            output: Some(output.into()),
            fault: None,
        }
    }

    pub fn fault(call_id: CallId, tool_name: impl Into<String>, fault: ToolFault) -> Self {
        Self {
            call_id,
            tool_name: tool_name.into(),
            output: None,
            fault: Some(fault),
        }
    }

    pub fn is_success(&self) -> bool {
        self.fault.is_none()
    }

    /// Text representation fed back to the LLM as the tool message body.
    pub fn payload_text(&self) -> String {
        match (&self.output, &self.fault) {
            (Some(output), _) => output.clone(),
            (None, Some(fault)) => fault.to_string(),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_codes_serialize_screaming() {
        let json = serde_json::to_value(FaultCode::BackendUnavailable).unwrap();
        assert_eq!(json, "BACKEND_UNAVAILABLE");
    }

    #[test]
    fn success_outcome_payload_is_output() {
        let outcome = ToolOutcome::success(CallId::new("c1"), "get_weather", "{\"temp\": 18}");
        assert!(outcome.is_success());
        assert_eq!(outcome.payload_text(), "{\"temp\": 18}");
    }

    #[test]
    fn fault_outcome_payload_names_the_code() {
        let outcome = ToolOutcome::fault(
            CallId::new("c2"),
            "get_stock",
            ToolFault::unknown_tool("get_stock"),
        );
        assert!(!outcome.is_success());
        assert!(outcome.payload_text().starts_with("[UNKNOWN_TOOL]"));
    }
}
