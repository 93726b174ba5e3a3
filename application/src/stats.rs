//! Gateway statistics
//!
//! Process-wide counters surfaced on the stats endpoint. Plain atomics:
//! the gateway deliberately carries no metrics framework, but operators
//! still get message volumes and error counts per transport.

use chrono::{DateTime, Utc};
use crossbar_domain::TransportKind;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the orchestrator, read by the status endpoint
#[derive(Debug)]
pub struct GatewayStats {
    started_at: DateTime<Utc>,
    total_messages: AtomicU64,
    cli_messages: AtomicU64,
    web_messages: AtomicU64,
    telegram_messages: AtomicU64,
    errors: AtomicU64,
}

impl GatewayStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            total_messages: AtomicU64::new(0),
            cli_messages: AtomicU64::new(0),
            web_messages: AtomicU64::new(0),
            telegram_messages: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn record_message(&self, transport: TransportKind) {
        self.total_messages.fetch_add(1, Ordering::Relaxed);
        match transport {
            TransportKind::Cli => &self.cli_messages,
            TransportKind::Web => &self.web_messages,
            TransportKind::Telegram => &self.telegram_messages,
        }
        .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, active_conversations: usize) -> StatsSnapshot {
        let now = Utc::now();
        StatsSnapshot {
            uptime_seconds: (now - self.started_at).num_seconds().max(0) as u64,
            total_messages: self.total_messages.load(Ordering::Relaxed),
            cli_messages: self.cli_messages.load(Ordering::Relaxed),
            web_messages: self.web_messages.load(Ordering::Relaxed),
            telegram_messages: self.telegram_messages.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            active_conversations,
        }
    }
}

impl Default for GatewayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view serialized on the stats endpoint
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub uptime_seconds: u64,
    pub total_messages: u64,
    pub cli_messages: u64,
    pub web_messages: u64,
    pub telegram_messages: u64,
    pub errors: u64,
    pub active_conversations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_transport_counters_are_independent() {
        let stats = GatewayStats::new();
        stats.record_message(TransportKind::Web);
        stats.record_message(TransportKind::Web);
        stats.record_message(TransportKind::Telegram);
        stats.record_error();

        let snap = stats.snapshot(3);
        assert_eq!(snap.total_messages, 3);
        assert_eq!(snap.web_messages, 2);
        assert_eq!(snap.telegram_messages, 1);
        assert_eq!(snap.cli_messages, 0);
        assert_eq!(snap.errors, 1);
        assert_eq!(snap.active_conversations, 3);
    }
}
