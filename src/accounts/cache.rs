//! Account state caching with expiry.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Key-value cache with per-entry time-to-live.
///
/// Implementations must tolerate concurrent `get`/`set`/`delete`; per-key
/// consistency is last-writer-wins.
pub trait Cache<V>: Send + Sync {
    fn get(&self, key: &str) -> Option<V>;
    fn set(&self, key: &str, value: V, ttl: Duration);
    fn delete(&self, key: &str);
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
    inserted_at: Instant,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// A thread-safe, capacity-bounded TTL cache.
///
/// When full, expired entries are purged first; if none expired, the oldest
/// insertion is evicted. A capacity of zero disables caching.
#[derive(Clone)]
pub struct TtlCache<V> {
    inner: Arc<DashMap<String, Entry<V>>>,
    capacity: usize,
}

impl<V: Clone + Send + Sync> TtlCache<V> {
    /// Create a new empty cache.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            capacity,
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(0)
    }

    /// Count live and not-yet-purged entries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn make_room(&self, now: Instant) {
        self.inner.retain(|_, entry| entry.is_live(now));
        if self.inner.len() < self.capacity {
            return;
        }
        let oldest = self
            .inner
            .iter()
            .min_by_key(|r| r.value().inserted_at)
            .map(|r| r.key().clone());
        if let Some(key) = oldest {
            self.inner.remove(&key);
        }
    }
}

impl<V: Clone + Send + Sync> Cache<V> for TtlCache<V> {
    fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let value = {
            let entry = self.inner.get(key)?;
            entry.is_live(now).then(|| entry.value.clone())
        };
        if value.is_none() {
            self.inner.remove_if(key, |_, entry| !entry.is_live(now));
        }
        value
    }

    fn set(&self, key: &str, value: V, ttl: Duration) {
        if self.capacity == 0 {
            return;
        }
        let now = Instant::now();
        if !self.inner.contains_key(key) && self.inner.len() >= self.capacity {
            self.make_room(now);
        }
        self.inner.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now + ttl,
                inserted_at: now,
            },
        );
    }

    fn delete(&self, key: &str) {
        self.inner.remove(key);
    }
}
