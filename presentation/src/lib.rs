//! Presentation layer for crossbar
//!
//! This crate contains the transport adapters: the axum HTTP surface
//! (web endpoint + Telegram webhook + operational routes) and the
//! interactive CLI REPL. Each adapter translates its wire format to the
//! canonical message model and back; none of them knows how a reply is
//! produced.

pub mod http;
pub mod repl;

pub use http::{AppState, TelegramContext, router, run};
pub use repl::GatewayRepl;
