//! Execution parameters
//!
//! Limits the orchestrator applies per inbound message. All values come
//! from configuration; the defaults here are the documented fallbacks.

use std::time::Duration;

/// Per-message execution limits
#[derive(Debug, Clone)]
pub struct ExecutionParams {
    /// Ceiling on LLM-call/tool-call cycles for one user message.
    /// Reaching it terminates the loop with a synthetic assistant reply.
    pub max_steps: u32,
    /// Deadline for each individual tool call.
    pub tool_timeout: Duration,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        Self {
            max_steps: 8,
            tool_timeout: Duration::from_secs(30),
        }
    }
}

impl ExecutionParams {
    pub fn new(max_steps: u32, tool_timeout: Duration) -> Self {
        Self {
            max_steps,
            tool_timeout,
        }
    }
}
