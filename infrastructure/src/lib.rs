//! Infrastructure layer for crossbar
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer: conversation storage, the backend tool registry and
//! hub, the LLM provider client, the Telegram outbound client,
//! configuration loading, and transcript logging.

pub mod bots;
pub mod config;
pub mod llm;
pub mod logging;
pub mod registry;
pub mod session;
pub mod telegram;

// Re-export commonly used types
pub use bots::{BotFrame, BotHub};
pub use config::{ConfigIssue, ConfigLoader, FileConfig, Severity};
pub use llm::{ChatCompletionsClient, LlmSettings};
pub use logging::JsonlConversationLogger;
pub use registry::BackendToolRegistry;
pub use session::{IdleSweeper, InMemorySessionStore};
pub use telegram::TelegramApi;
