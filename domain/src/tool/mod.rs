//! Tool domain module
//!
//! Abstractions for the gateway's tool-invocation pipeline: backends
//! advertise [`ToolDescriptor`]s at connection time, the LLM requests
//! [`ToolInvocation`]s, and every dispatched call settles into a
//! [`ToolOutcome`] - success or [`ToolFault`], never silence.
//!
//! ```text
//! ┌──────────────┐    ┌────────────────┐    ┌──────────────┐
//! │ ToolDescriptor│──▶│ ToolInvocation │──▶│ ToolOutcome  │
//! │ (registered)  │   │ (LLM request)  │    │ (settled)    │
//! └──────────────┘    └────────────────┘    └──────────────┘
//! ```
//!
//! The domain holds no I/O: registration, resolution, and dispatch live in
//! the infrastructure layer behind application ports.

pub mod entities;
pub mod value_objects;

pub use entities::{BackendId, CallId, ToolDescriptor, ToolInvocation};
pub use value_objects::{FaultCode, ToolFault, ToolOutcome};
