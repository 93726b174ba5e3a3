//! Tool invoker port
//!
//! Dispatches one resolved tool call to its owning backend with a
//! deadline. The deadline is enforced gateway-side: when it elapses the
//! wait is abandoned and the call reported as timed out, even if the
//! backend protocol has no native timeout (a late result is discarded).

use async_trait::async_trait;
use crossbar_domain::{BackendId, ToolInvocation, ToolOutcome};
use std::time::Duration;
use thiserror::Error;

/// Errors from tool dispatch.
///
/// These never abort an orchestration step; the orchestrator converts
/// them into fault [`ToolOutcome`]s the LLM can see.
#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("tool call exceeded its deadline")]
    Timeout,

    #[error("backend '{0}' is not connected")]
    BackendUnavailable(BackendId),
}

/// Contract for invoking a tool on a resolved backend.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Invoke `invocation` on `backend`, waiting at most `deadline`.
    ///
    /// A backend-reported error is a *successful* dispatch carrying a
    /// fault outcome; `Err` is reserved for the gateway-side failures
    /// above.
    async fn invoke(
        &self,
        backend: &BackendId,
        invocation: &ToolInvocation,
        deadline: Duration,
    ) -> Result<ToolOutcome, InvokeError>;
}
