use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use parking_lot::Mutex;
use lru::LruCache;

const DEFAULT_CAPACITY: usize = 1000;

/// Longest lifetime an entry can get; larger TTLs are capped to it.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Cache entry with expiration tracking
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub created_at: Instant,
    pub expires_at: Instant,
    pub access_count: u64,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            data,
            created_at: now,
            expires_at: now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now),
            access_count: 0,
        }
    }

    /// An entry is stale from the instant `expires_at` is reached.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    pub fn access(&mut self) -> &T {
        self.access_count += 1;
        &self.data
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub total_entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Inner<V> {
    entries: LruCache<String, CacheEntry<V>>,
    stats: CacheStats,
}

/// In-memory key/value store with per-entry expiry.
///
/// Expired entries are evicted lazily when they are read; there is no
/// background sweep. When `capacity` is reached the least recently used
/// entry makes room. Clones share the same storage, so one instance can be
/// handed to every request task.
pub struct TtlCache<V> {
    inner: Arc<Mutex<Inner<V>>>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or_else(|| NonZeroUsize::new(DEFAULT_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);

        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            })),
        }
    }

    /// Returns the value if present and unexpired.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock();
        let Inner { entries, stats } = &mut *inner;

        let expired = match entries.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                stats.hits += 1;
                return Some(entry.access().clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(key);
            stats.expirations += 1;
            stats.total_entries = entries.len();
        }

        stats.misses += 1;
        None
    }

    /// Stores `value` until `now + ttl`, replacing any previous entry for `key`.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let mut inner = self.inner.lock();
        let Inner { entries, stats } = &mut *inner;

        if let Some((evicted_key, _)) = entries.push(key.into(), CacheEntry::new(value, ttl)) {
            // push returns the old entry on overwrite too; only count real evictions
            if !entries.contains(&evicted_key) {
                stats.evictions += 1;
            }
        }

        stats.total_entries = entries.len();
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock();
        let result = inner.entries.pop(key).map(|entry| entry.data);
        inner.stats.total_entries = inner.entries.len();
        result
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.stats.total_entries = 0;
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let Inner { entries, stats } = &mut *inner;

        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
            stats.expirations += 1;
        }

        stats.total_entries = entries.len();
        expired.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
