//! Replay detection.

use dashmap::DashMap;
use reputation_core::NONCE_LEN;

type ReplayKey = (u32, [u8; NONCE_LEN]);

/// Seconds between `now` and `timestamp` on the wrapping 32-bit
/// clock.
pub(crate) fn clock_distance(now: u32, timestamp: u32) -> u32 {
    (now.wrapping_sub(timestamp) as i32).unsigned_abs()
}

/// `(timestamp, nonce)` pairs of reports accepted within the freshness
/// window.
#[derive(Debug)]
pub struct ReplayCache {
    seen: DashMap<ReplayKey, ()>,
    window: u32,
}

impl ReplayCache {
    pub fn new(window: u32) -> Self {
        Self {
            seen: DashMap::new(),
            window,
        }
    }

    /// Record a report. Returns `false` if it was already seen.
    pub fn check_and_insert(&self, timestamp: u32, nonce: [u8; NONCE_LEN]) -> bool {
        self.seen.insert((timestamp, nonce), ()).is_none()
    }

    pub fn contains(&self, timestamp: u32, nonce: [u8; NONCE_LEN]) -> bool {
        self.seen.contains_key(&(timestamp, nonce))
    }

    /// Drop entries that are outside the freshness window at `now`, and
    /// return how many were removed.
    pub fn purge(&self, now: u32) -> usize {
        // Inserts may land while retain walks the shards, so count in place.
        let mut removed = 0;
        self.seen.retain(|(timestamp, _), _| {
            let keep = clock_distance(now, *timestamp) <= self.window;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_insert_is_a_replay() {
        let cache = ReplayCache::new(120);
        assert!(cache.check_and_insert(1000, [1; 8]));
        assert!(!cache.check_and_insert(1000, [1; 8]));
        assert!(cache.check_and_insert(1000, [2; 8]));
        assert!(cache.check_and_insert(1001, [1; 8]));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_purge_keeps_window() {
        let cache = ReplayCache::new(120);
        cache.check_and_insert(1000, [1; 8]);
        cache.check_and_insert(1100, [1; 8]);
        cache.check_and_insert(1200, [1; 8]);

        assert_eq!(cache.purge(1200), 1);
        assert!(!cache.contains(1000, [1; 8]));
        assert!(cache.contains(1100, [1; 8]));
        assert!(cache.contains(1200, [1; 8]));
    }

    #[test]
    fn test_purge_during_concurrent_inserts() {
        let cache = ReplayCache::new(120);
        std::thread::scope(|scope| {
            let writer = scope.spawn(|| {
                for i in 0..200_000u64 {
                    cache.check_and_insert(1000, i.to_be_bytes());
                }
            });
            while !writer.is_finished() {
                assert_eq!(cache.purge(1000), 0);
            }
        });
        assert_eq!(cache.len(), 200_000);
        assert_eq!(cache.purge(2000), 200_000);
    }

    #[test]
    fn test_clock_distance_wraps() {
        assert_eq!(clock_distance(5, u32::MAX - 4), 10);
        assert_eq!(clock_distance(u32::MAX - 4, 5), 10);
        assert_eq!(clock_distance(100, 100), 0);
    }

    #[test]
    fn test_purge_across_wrap() {
        let cache = ReplayCache::new(120);
        cache.check_and_insert(u32::MAX - 10, [1; 8]);
        assert_eq!(cache.purge(50), 0);
        assert_eq!(cache.purge(500), 1);
        assert!(cache.is_empty());
    }
}
