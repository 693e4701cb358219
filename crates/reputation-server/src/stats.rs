//! Report counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// A progress line is logged each time this many reports have been accepted.
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Counters shared by all intake tasks.
#[derive(Debug, Default)]
pub struct ServerStats {
    received: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
    events: AtomicU64,
}

/// Point-in-time copy of [`ServerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub events: u64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an accepted report carrying `events` event entries.
    pub fn record_accepted(&self, events: usize) {
        self.events.fetch_add(events as u64, Ordering::Relaxed);
        let accepted = self.accepted.fetch_add(1, Ordering::Relaxed) + 1;
        if accepted % PROGRESS_INTERVAL == 0 {
            let snapshot = self.snapshot();
            info!(
                accepted,
                received = snapshot.received,
                rejected = snapshot.rejected,
                events = snapshot.events,
                "Report progress"
            );
        }
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
        }
    }
}
