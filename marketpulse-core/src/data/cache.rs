//! In-memory TTL cache fronting the providers.
//!
//! Entries expire a fixed wall-clock interval after insertion. The cache is
//! safe to share between concurrent runs; writes are last-writer-wins and
//! there is no ordering guarantee beyond that.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::domain::{CacheKey, Series};

/// Default time-to-live: one hour.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug)]
struct Entry<V> {
    value: V,
    /// `None` when the TTL runs past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// A time-boxed cache of cloneable values.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    ttl: Duration,
}

/// The cache the pipeline uses: fetched series keyed by request.
pub type SeriesCache = TtlCache<CacheKey, Series>;

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`, if any. Expired entries are evicted on read.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_fresh(Instant::now()) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store `value`, replacing whatever was there and restarting its TTL.
    pub fn insert(&self, key: K, value: V) {
        let expires_at = Instant::now().checked_add(self.ttl);
        self.lock().insert(key, Entry { value, expires_at });
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| e.is_fresh(now));
        before - entries.len()
    }

    /// Number of stored entries, fresh or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, Entry<V>>> {
        // A panic while holding the lock cannot leave an entry half-written.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<K: Eq + Hash, V: Clone> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn hit_within_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("bitcoin", 42.0);
        assert_eq!(cache.get(&"bitcoin"), Some(42.0));
        assert_eq!(cache.get(&"ethereum"), None);
    }

    #[test]
    fn expires_after_ttl() {
        let cache = TtlCache::new(Duration::from_millis(10));
        cache.insert("bitcoin", 1);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&"bitcoin"), None);
        // Expired read evicts.
        assert!(cache.is_empty());
    }

    #[test]
    fn unrepresentable_ttl_never_expires() {
        let cache = TtlCache::new(Duration::MAX);
        cache.insert("bitcoin", 1);
        assert_eq!(cache.get(&"bitcoin"), Some(1));
        assert_eq!(cache.purge_expired(), 0);
    }

    #[test]
    fn last_writer_wins() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("k", 1);
        cache.insert("k", 2);
        assert_eq!(cache.get(&"k"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn purge_removes_only_expired() {
        let cache = TtlCache::new(Duration::from_millis(10));
        cache.insert("old", 1);
        thread::sleep(Duration::from_millis(20));
        cache.insert("new", 2);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.get(&"new"), Some(2));
    }

    #[test]
    fn concurrent_writers_are_safe() {
        let cache = Arc::new(TtlCache::new(Duration::from_secs(60)));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let c = Arc::clone(&cache);
                thread::spawn(move || {
                    for j in 0..100 {
                        c.insert(j % 10, i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 10);
        assert!(cache.get(&3).is_some());
    }
}
