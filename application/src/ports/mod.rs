//! Port definitions
//!
//! Interfaces the use cases depend on. Implementations (adapters) live in
//! the infrastructure and presentation layers.

pub mod conversation_logger;
pub mod delivery;
pub mod llm_client;
pub mod session_store;
pub mod tool_invoker;
pub mod tool_registry;

pub use conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger};
pub use delivery::{DeliveryError, OutboundDelivery};
pub use llm_client::{LlmClient, LlmReply, ProviderError};
pub use session_store::{InFlightGuard, SessionError, SessionStorePort};
pub use tool_invoker::{InvokeError, ToolInvoker};
pub use tool_registry::{RegistryError, ToolRegistryPort};
