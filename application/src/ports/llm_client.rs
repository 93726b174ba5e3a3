//! LLM client port
//!
//! Defines the request/response contract with the LLM provider. The
//! provider is a black box: it receives the ordered turn history plus the
//! currently registered tool schemas, and answers with either a final text
//! or a batch of tool-call requests.

use async_trait::async_trait;
use crossbar_domain::{ToolDescriptor, ToolInvocation, Turn};
use thiserror::Error;

/// Errors from the LLM provider.
///
/// There is deliberately no retry inside the client: retrying is either
/// the orchestrator's decision or explicitly absent, so latency stays
/// predictable.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider transport error: {0}")]
    Transport(String),

    #[error("provider rejected credentials")]
    Unauthorized,

    #[error("provider rate limit exceeded")]
    RateLimited,

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

/// One completion from the provider: either the final answer for this
/// step, or a request to run tools and come back with results.
#[derive(Debug, Clone)]
pub enum LlmReply {
    /// Plain text: the orchestration loop ends here.
    Final { text: String },
    /// The model wants these tools invoked before it can answer.
    /// Calls within one reply may be dispatched concurrently.
    ToolCalls { calls: Vec<ToolInvocation> },
}

impl LlmReply {
    pub fn final_text(text: impl Into<String>) -> Self {
        LlmReply::Final { text: text.into() }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, LlmReply::Final { .. })
    }
}

/// Gateway-side contract for LLM completion.
///
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete the conversation given the full turn history and the
    /// tool schemas currently advertised by connected backends.
    async fn complete(
        &self,
        turns: &[Turn],
        tools: &[ToolDescriptor],
    ) -> Result<LlmReply, ProviderError>;
}
