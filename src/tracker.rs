//! In-flight tracker: the global counters and per-pair/per-receiver history
//! the drop oracle reads (§3, §4.1 "In-flight tracker").
//!
//! `active_transmissions` and the per-SF concurrency counters are atomics;
//! no lock is needed for a single increment/decrement. `last_delivery_at`
//! and `loss_streak` are sharded maps, each shard behind its own lock held
//! only for the single read-modify-write each operation needs, never across
//! an `.await` (§5: "one mutex per receiver id, sharded or per-entry").

use crate::constants::{sf_index, SF_MAX, SF_MIN};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

const SF_COUNT: usize = (SF_MAX - SF_MIN + 1) as usize;

/// Number of lock shards for the per-receiver / per-pair maps. A fixed power
/// of two keeps many concurrent receivers from serializing on one global
/// mutex while staying cheap to allocate up front.
const SHARD_COUNT: usize = 16;

fn shard_index<K: Hash>(key: &K) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() as usize) % SHARD_COUNT
}

pub struct InFlightTracker {
    active_transmissions: AtomicI64,
    concurrent_by_sf: [AtomicI64; SF_COUNT],
    last_delivery_at: [Mutex<HashMap<u64, Instant>>; SHARD_COUNT],
    loss_streak: [Mutex<HashMap<(u64, u64), u32>>; SHARD_COUNT],
}

impl Default for InFlightTracker {
    fn default() -> Self {
        Self {
            active_transmissions: AtomicI64::new(0),
            concurrent_by_sf: std::array::from_fn(|_| AtomicI64::new(0)),
            last_delivery_at: std::array::from_fn(|_| Mutex::new(HashMap::new())),
            loss_streak: std::array::from_fn(|_| Mutex::new(HashMap::new())),
        }
    }
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_transmissions(&self) -> i64 {
        self.active_transmissions.load(Ordering::SeqCst)
    }

    pub fn concurrent_on_sf(&self, sf: u8) -> i64 {
        self.concurrent_by_sf[sf_index(sf)].load(Ordering::SeqCst)
    }

    /// Accept a frame for delivery: increment both counters (§4.4 step 3).
    pub fn begin(&self, sf: u8) {
        self.active_transmissions.fetch_add(1, Ordering::SeqCst);
        self.concurrent_by_sf[sf_index(sf)].fetch_add(1, Ordering::SeqCst);
    }

    /// Release a frame that finished delivering or was dropped after being
    /// accepted. Every `begin` is paired with exactly one `end` (§3
    /// invariant).
    pub fn end(&self, sf: u8) {
        self.active_transmissions.fetch_sub(1, Ordering::SeqCst);
        self.concurrent_by_sf[sf_index(sf)].fetch_sub(1, Ordering::SeqCst);
    }

    pub fn loss_streak(&self, sender: u64, receiver: u64) -> u32 {
        let key = (sender, receiver);
        *self.loss_streak[shard_index(&key)]
            .lock()
            .expect("loss_streak mutex poisoned")
            .get(&key)
            .unwrap_or(&0)
    }

    pub fn record_drop(&self, sender: u64, receiver: u64) {
        let key = (sender, receiver);
        let mut guard = self.loss_streak[shard_index(&key)].lock().expect("loss_streak mutex poisoned");
        *guard.entry(key).or_insert(0) += 1;
    }

    /// Milliseconds since the last frame *delivered* to `receiver`, or
    /// `None` if none has ever been delivered.
    pub fn ms_since_last_delivery(&self, receiver: u64) -> Option<u64> {
        let guard = self.last_delivery_at[shard_index(&receiver)]
            .lock()
            .expect("last_delivery_at mutex poisoned");
        guard.get(&receiver).map(|t| t.elapsed().as_millis() as u64)
    }

    /// Record a successful delivery: reset the pair's streak and stamp the
    /// receiver's last-delivery time (§4.5).
    pub fn record_delivery(&self, sender: u64, receiver: u64) {
        let key = (sender, receiver);
        self.loss_streak[shard_index(&key)]
            .lock()
            .expect("loss_streak mutex poisoned")
            .insert(key, 0);
        self.last_delivery_at[shard_index(&receiver)]
            .lock()
            .expect("last_delivery_at mutex poisoned")
            .insert(receiver, Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_end_restores_counters() {
        let t = InFlightTracker::new();
        t.begin(9);
        assert_eq!(t.active_transmissions(), 1);
        assert_eq!(t.concurrent_on_sf(9), 1);
        t.end(9);
        assert_eq!(t.active_transmissions(), 0);
        assert_eq!(t.concurrent_on_sf(9), 0);
    }

    #[test]
    fn streak_resets_on_delivery() {
        let t = InFlightTracker::new();
        t.record_drop(1, 2);
        t.record_drop(1, 2);
        t.record_drop(1, 2);
        assert_eq!(t.loss_streak(1, 2), 3);
        t.record_delivery(1, 2);
        assert_eq!(t.loss_streak(1, 2), 0);
    }

    #[test]
    fn delivery_timestamp_only_updates_on_delivery() {
        let t = InFlightTracker::new();
        assert!(t.ms_since_last_delivery(5).is_none());
        t.record_delivery(1, 5);
        assert!(t.ms_since_last_delivery(5).is_some());
    }

    #[test]
    fn streaks_for_different_pairs_do_not_collide() {
        let t = InFlightTracker::new();
        for receiver in 0..64u64 {
            t.record_drop(1, receiver);
        }
        for receiver in 0..64u64 {
            assert_eq!(t.loss_streak(1, receiver), 1, "receiver={receiver}");
        }
        t.record_delivery(1, 10);
        assert_eq!(t.loss_streak(1, 10), 0);
        assert_eq!(t.loss_streak(1, 11), 1);
    }
}
