//! Idle-conversation sweeper.
//!
//! Background task that periodically asks the store to evict
//! conversations idle past the configured threshold. Eviction is the only
//! way a conversation ever leaves the store.

use super::store::InMemorySessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Periodic eviction of idle conversations.
pub struct IdleSweeper {
    store: Arc<InMemorySessionStore>,
    threshold: Duration,
    period: Duration,
}

impl IdleSweeper {
    pub fn new(store: Arc<InMemorySessionStore>, threshold: Duration, period: Duration) -> Self {
        Self {
            store,
            threshold,
            period,
        }
    }

    /// Spawn the sweep loop. It runs until `shutdown` is cancelled.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.period);
            // the first tick fires immediately; skip it
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = self.store.evict_idle(self.threshold);
                        if evicted > 0 {
                            info!(evicted, "evicted idle conversations");
                        } else {
                            debug!("sweep found nothing to evict");
                        }
                    }
                    _ = shutdown.cancelled() => {
                        debug!("sweeper shutting down");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbar_application::ports::session_store::SessionStorePort;
    use crossbar_domain::ConversationId;

    #[tokio::test]
    async fn sweeper_stops_on_cancellation() {
        let store = Arc::new(InMemorySessionStore::new());
        store.load_or_create(&ConversationId::web("x")).await;

        let token = CancellationToken::new();
        let handle = IdleSweeper::new(
            store.clone(),
            Duration::from_secs(3600),
            Duration::from_millis(10),
        )
        .spawn(token.clone());

        token.cancel();
        handle.await.unwrap();
        // nothing evicted with a fresh conversation and an hour threshold
        assert_eq!(store.active_count().await, 1);
    }

    #[tokio::test]
    async fn sweeper_evicts_on_tick() {
        let store = Arc::new(InMemorySessionStore::new());
        store.load_or_create(&ConversationId::web("y")).await;

        let token = CancellationToken::new();
        let handle = IdleSweeper::new(store.clone(), Duration::ZERO, Duration::from_millis(5))
            .spawn(token.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(store.active_count().await, 0);
    }
}
