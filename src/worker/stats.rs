//! Worker counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Per-process message counters
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Deliveries taken off the inbound queue
    pub received: AtomicU64,
    /// Results published to the outbound queue
    pub published: AtomicU64,
    /// Bodies that failed to parse
    pub rejected: AtomicU64,
    /// Objects that could not be fetched
    pub fetch_failures: AtomicU64,
    /// Documents that produced no text
    pub empty_results: AtomicU64,
    /// Results the broker did not accept
    pub publish_failures: AtomicU64,
    /// Handler panics caught at the message boundary
    pub panics: AtomicU64,
}

impl WorkerStats {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            empty_results: self.empty_results.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            panics: self.panics.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`WorkerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStatsSnapshot {
    pub received: u64,
    pub published: u64,
    pub rejected: u64,
    pub fetch_failures: u64,
    pub empty_results: u64,
    pub publish_failures: u64,
    pub panics: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = WorkerStats::default();
        WorkerStats::incr(&stats.received);
        WorkerStats::incr(&stats.received);
        WorkerStats::incr(&stats.published);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.received, 2);
        assert_eq!(snapshot.published, 1);
        assert_eq!(snapshot.panics, 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(WorkerStatsSnapshot::default()).unwrap();
        assert_eq!(json["publish_failures"], 0);
    }
}
