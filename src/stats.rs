//! Observability snapshot: a point-in-time view of broker state (§11 of the
//! expanded spec). Ambient, not a protocol feature: nothing here is sent
//! over the wire; it exists for operators tailing logs or wiring in a
//! future metrics exporter.

use crate::drop_oracle::DropReason;
use crate::tracker::InFlightTracker;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Counts of deliveries and drops, broken down by [`DropReason`]. Cheap to
/// update on the hot path: one atomic per delivery, one map bump per drop
/// behind a short-lived lock.
#[derive(Default)]
pub struct BrokerStats {
    delivered: AtomicU64,
    dropped_by_reason: Mutex<HashMap<String, u64>>,
}

impl BrokerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, reason: DropReason) {
        let mut guard = self.dropped_by_reason.lock().expect("stats mutex poisoned");
        *guard.entry(reason.to_string()).or_insert(0) += 1;
    }

    pub fn snapshot(&self, registry_len: usize, tracker: &InFlightTracker) -> StatsSnapshot {
        let dropped_by_reason = self.dropped_by_reason.lock().expect("stats mutex poisoned").clone();
        StatsSnapshot {
            registered_nodes: registry_len,
            active_transmissions: tracker.active_transmissions(),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped_by_reason,
        }
    }
}

/// An owned, loggable copy of [`BrokerStats`] at one instant.
#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    pub registered_nodes: usize,
    pub active_transmissions: i64,
    pub delivered: u64,
    pub dropped_by_reason: HashMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_deliveries_and_drops() {
        let stats = BrokerStats::new();
        stats.record_delivered();
        stats.record_delivered();
        stats.record_dropped(DropReason::OutOfRange);
        stats.record_dropped(DropReason::OutOfRange);
        stats.record_dropped(DropReason::LowRssi);

        let tracker = InFlightTracker::new();
        let snap = stats.snapshot(3, &tracker);
        assert_eq!(snap.registered_nodes, 3);
        assert_eq!(snap.delivered, 2);
        assert_eq!(snap.dropped_by_reason.get("OUT_OF_RANGE"), Some(&2));
        assert_eq!(snap.dropped_by_reason.get("LOW_RSSI"), Some(&1));
    }
}
