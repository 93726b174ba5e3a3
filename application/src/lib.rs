//! Application layer for crossbar
//!
//! This crate contains the orchestration use case, port definitions, and
//! execution parameters. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod stats;
pub mod use_cases;

// Re-export commonly used types
pub use config::ExecutionParams;
pub use ports::{
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    delivery::{DeliveryError, OutboundDelivery},
    llm_client::{LlmClient, LlmReply, ProviderError},
    session_store::{InFlightGuard, SessionError, SessionStorePort},
    tool_invoker::{InvokeError, ToolInvoker},
    tool_registry::{RegistryError, ToolRegistryPort},
};
pub use stats::{GatewayStats, StatsSnapshot};
pub use use_cases::process_message::{ProcessMessageError, ProcessMessageUseCase, error_reply};
