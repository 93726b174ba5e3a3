//! Session store port
//!
//! Holds per-conversation state keyed by [`ConversationId`]. The store is
//! the gateway's single mutual-exclusion point: the in-flight guard it
//! hands out serializes orchestration per conversation while unrelated
//! conversations proceed fully in parallel.

use async_trait::async_trait;
use crossbar_domain::{ConversationId, Turn};
use thiserror::Error;
use tokio::sync::OwnedSemaphorePermit;

/// Errors from session store operations
#[derive(Error, Debug)]
pub enum SessionError {
    /// The conversation is already processing a message. Callers reply
    /// with a "still processing" notice instead of queuing, so per-user
    /// backlog stays bounded.
    #[error("conversation is already processing a message")]
    Busy,

    /// The conversation was evicted mid-flight; the caller recreates it.
    #[error("conversation not found")]
    NotFound,
}

/// RAII guard marking a conversation as in-flight.
///
/// Holds the conversation's single semaphore permit; dropping the guard,
/// on the normal path or on an abort, releases it, so a failed step can
/// always be retried.
pub struct InFlightGuard {
    _permit: OwnedSemaphorePermit,
}

impl InFlightGuard {
    pub fn new(permit: OwnedSemaphorePermit) -> Self {
        Self { _permit: permit }
    }
}

/// Port for conversation state storage.
///
/// Implementations must make `load_or_create` atomic: two concurrent
/// first messages for the same identity observe exactly one conversation.
#[async_trait]
pub trait SessionStorePort: Send + Sync {
    /// Ensure a conversation exists. Returns `true` if it was created.
    async fn load_or_create(&self, id: &ConversationId) -> bool;

    /// Mark the conversation in-flight, failing fast when it already is.
    async fn try_acquire(&self, id: &ConversationId) -> Result<InFlightGuard, SessionError>;

    /// Append a turn under the conversation's lock.
    async fn append(&self, id: &ConversationId, turn: Turn) -> Result<(), SessionError>;

    /// Snapshot of the conversation's turns, oldest first.
    async fn history(&self, id: &ConversationId) -> Result<Vec<Turn>, SessionError>;

    /// Number of currently stored conversations.
    async fn active_count(&self) -> usize;
}
