//! In-memory session store with per-conversation locking.
//!
//! The conversation map uses a read-preferring access pattern: lookups
//! take a read lock, and the write lock is taken only to insert a missing
//! entry or to evict. Per-conversation state then has its own locks, so
//! unrelated conversations never contend:
//!
//! - a `tokio::sync::Mutex<Conversation>` guards the turn history
//! - a one-permit `Semaphore` is the in-flight flag; [`try_acquire`]
//!   hands its permit out as an RAII guard
//!
//! The map lock is never held across an `.await`.
//!
//! [`try_acquire`]: InMemorySessionStore::try_acquire

use async_trait::async_trait;
use chrono::Utc;
use crossbar_application::ports::session_store::{InFlightGuard, SessionError, SessionStorePort};
use crossbar_domain::{Conversation, ConversationId, Turn};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tracing::debug;

struct SessionEntry {
    conversation: Mutex<Conversation>,
    in_flight: Arc<Semaphore>,
}

impl SessionEntry {
    fn new(id: ConversationId) -> Self {
        Self {
            conversation: Mutex::new(Conversation::new(id)),
            in_flight: Arc::new(Semaphore::new(1)),
        }
    }
}

/// Process-wide conversation storage.
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<ConversationId, Arc<SessionEntry>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn entry(&self, id: &ConversationId) -> Option<Arc<SessionEntry>> {
        self.entries.read().unwrap().get(id).cloned()
    }

    /// Remove conversations idle longer than `threshold`.
    ///
    /// In-flight conversations are skipped: holding the permit means an
    /// orchestration step is running, and a conversation whose history
    /// mutex is momentarily taken is treated the same way. Returns the
    /// number of evicted conversations.
    pub fn evict_idle(&self, threshold: Duration) -> usize {
        let now = Utc::now();
        let threshold = chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::MAX);

        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|id, entry| {
            if entry.in_flight.available_permits() == 0 {
                return true;
            }
            match entry.conversation.try_lock() {
                Ok(conversation) => {
                    let keep = conversation.idle_for(now) < threshold;
                    if !keep {
                        debug!(conversation = %id, "evicting idle conversation");
                    }
                    keep
                }
                // someone is touching it right now, so not idle
                Err(_) => true,
            }
        });
        before - entries.len()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStorePort for InMemorySessionStore {
    async fn load_or_create(&self, id: &ConversationId) -> bool {
        // fast path: read lock only
        if self.entries.read().unwrap().contains_key(id) {
            return false;
        }
        // slow path: the entry API makes concurrent first messages safe:
        // exactly one caller inserts, the rest observe the same entry
        let mut entries = self.entries.write().unwrap();
        let mut created = false;
        entries.entry(id.clone()).or_insert_with(|| {
            created = true;
            Arc::new(SessionEntry::new(id.clone()))
        });
        created
    }

    async fn try_acquire(&self, id: &ConversationId) -> Result<InFlightGuard, SessionError> {
        let entry = self.entry(id).ok_or(SessionError::NotFound)?;
        entry
            .in_flight
            .clone()
            .try_acquire_owned()
            .map(InFlightGuard::new)
            .map_err(|_| SessionError::Busy)
    }

    async fn append(&self, id: &ConversationId, turn: Turn) -> Result<(), SessionError> {
        let entry = self.entry(id).ok_or(SessionError::NotFound)?;
        entry.conversation.lock().await.append(turn);
        Ok(())
    }

    async fn history(&self, id: &ConversationId) -> Result<Vec<Turn>, SessionError> {
        let entry = self.entry(id).ok_or(SessionError::NotFound)?;
        let conversation = entry.conversation.lock().await;
        Ok(conversation.turns().to_vec())
    }

    async fn active_count(&self) -> usize {
        self.entries.read().unwrap().len()
    }
}
