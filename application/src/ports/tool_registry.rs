//! Tool registry port
//!
//! Maps tool names to the backends that advertise them. Registration
//! replaces a backend's whole descriptor set (reconnect-with-updated-
//! schema); resolution is read-only and lock-light so orchestration steps
//! never contend with each other.

use crossbar_domain::{BackendId, ToolDescriptor};
use thiserror::Error;

/// Errors from tool-name resolution
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

/// Port for the backend tool registry.
///
/// When two backends advertise the same tool name, the most recently
/// registered backend wins. This is a documented policy, not an accident of map
/// iteration order.
pub trait ToolRegistryPort: Send + Sync {
    /// Replace all descriptors owned by `backend` with `tools`.
    fn register(&self, backend: BackendId, tools: Vec<ToolDescriptor>);

    /// Remove every descriptor owned by `backend`.
    fn unregister(&self, backend: &BackendId);

    /// Resolve a tool name to its descriptor and owning backend.
    fn resolve(&self, tool_name: &str) -> Result<(ToolDescriptor, BackendId), RegistryError>;

    /// Merged descriptor set advertised to the LLM, one entry per
    /// distinct tool name (winner under the ambiguity policy).
    fn descriptors(&self) -> Vec<ToolDescriptor>;
}
