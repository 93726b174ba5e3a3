//! LLM provider adapter.

pub mod client;
pub mod wire;

pub use client::{ChatCompletionsClient, LlmSettings};
