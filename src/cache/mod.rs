// Pooled key/value cache with pattern invalidation (spec.md §4.10).
//
// Each logical pool (`pods`, `streams`, `singleRecords`, `recordLists`) gets
// its own size cap and TTL, grounded on the teacher's plain `DashMap`
// process-global caches (e.g. `ArunaStorage`-style object/user caches) with
// a TTL added on top since the spec calls for one per pool.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// A single named cache pool. Generic over the value type so each of the
/// four pools in spec.md §4.10 can hold what it actually needs (a pod row,
/// a stream row, a record row, a page of list results) without boxing.
pub struct Pool<V: Clone + Send + Sync> {
    entries: DashMap<String, Entry<V>>,
    cap: usize,
    ttl: Duration,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<V: Clone + Send + Sync> Pool<V> {
    pub fn new(cap: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            cap,
            ttl,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        // Compute the hit/miss outcome and drop the shard guard before any
        // `remove`, which would otherwise self-deadlock on the same shard.
        let fresh = self.entries.get(key).and_then(|e| {
            if e.inserted_at.elapsed() < self.ttl {
                Some(e.value.clone())
            } else {
                None
            }
        });
        match fresh {
            Some(v) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(v)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                self.entries.remove(key);
                None
            }
        }
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        if self.entries.len() >= self.cap {
            // Best-effort cap: evict one arbitrary entry rather than grow
            // unbounded. Invalidation races here are harmless (spec.md §5).
            // The iterator guard must be dropped before `remove`, which
            // would otherwise self-deadlock on the same shard.
            let evict_key: Option<String> = self.entries.iter().next().map(|e| e.key().clone());
            if let Some(evict_key) = evict_key {
                self.entries.remove(&evict_key);
            }
        }
        self.entries.insert(
            key.into(),
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Removes every key sharing `prefix`, the invalidation helper used for
    /// e.g. a stream's list pool or `userPods` (spec.md §4.10).
    pub fn clear_prefix(&self, prefix: &str) {
        self.entries.retain(|k, _| !k.starts_with(prefix));
    }

    pub fn clear_all(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cumulative hit/miss counts (spec.md §2 ambient "Metrics" row).
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_delete_roundtrip() {
        let pool: Pool<String> = Pool::new(10, Duration::from_secs(60));
        assert_eq!(pool.get("a"), None);
        pool.set("a", "hello".to_string());
        assert_eq!(pool.get("a"), Some("hello".to_string()));
        pool.delete("a");
        assert_eq!(pool.get("a"), None);
    }

    #[test]
    fn ttl_expires_entries() {
        let pool: Pool<i32> = Pool::new(10, Duration::from_millis(1));
        pool.set("k", 1);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(pool.get("k"), None);
    }

    #[test]
    fn clear_prefix_invalidates_matching_keys_only() {
        let pool: Pool<i32> = Pool::new(10, Duration::from_secs(60));
        pool.set("stream:1:list", 1);
        pool.set("stream:1:meta", 2);
        pool.set("stream:2:list", 3);
        pool.clear_prefix("stream:1:");
        assert_eq!(pool.get("stream:1:list"), None);
        assert_eq!(pool.get("stream:1:meta"), None);
        assert_eq!(pool.get("stream:2:list"), Some(3));
    }

    #[test]
    fn cap_evicts_rather_than_grows_unbounded() {
        let pool: Pool<i32> = Pool::new(2, Duration::from_secs(60));
        pool.set("a", 1);
        pool.set("b", 2);
        pool.set("c", 3);
        assert!(pool.len() <= 2);
    }

    #[test]
    fn hit_and_miss_counters_track_get_outcomes() {
        let pool: Pool<i32> = Pool::new(10, Duration::from_secs(60));
        pool.get("missing");
        pool.set("k", 1);
        pool.get("k");
        pool.get("k");
        assert_eq!(pool.misses(), 1);
        assert_eq!(pool.hits(), 2);
    }
}
