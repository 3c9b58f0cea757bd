//! Time-expiring key/value cache for loaded resource bytes

use crate::Result;
use chrono::{DateTime, Duration, Utc};
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

/// Source of the current time for expiry checks
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

/// Cached bytes shared between the cache and its readers
pub type CachedBytes = Rc<Vec<u8>>;

/// A TTL keyed store for image, attachment and font bytes
pub trait CacheProvider {
    /// Cached bytes for `key` unless missing or expired
    fn get(&mut self, key: &str) -> Option<CachedBytes>;

    /// Store `value` under `key` for `ttl`
    fn set(&mut self, key: &str, value: CachedBytes, ttl: Duration);

    /// Drop an entry
    fn remove(&mut self, key: &str) -> Option<CachedBytes>;

    /// Cached bytes for `key`, loading and storing them on a miss
    fn get_or_load(
        &mut self,
        key: &str,
        ttl: Duration,
        load: &mut dyn FnMut() -> Result<Vec<u8>>,
    ) -> Result<CachedBytes> {
        if let Some(found) = self.get(key) {
            return Ok(found);
        }
        let value: CachedBytes = Rc::new(load()?);
        self.set(key, Rc::clone(&value), ttl);
        Ok(value)
    }
}

#[derive(Debug)]
struct CacheEntry {
    value: CachedBytes,
    expires: DateTime<Utc>,
}

/// Cache hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
}

impl CacheStats {
    /// Hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// In-process cache provider
pub struct InMemoryCache {
    entries: HashMap<String, CacheEntry>,
    clock: Box<dyn Clock>,
    stats: CacheStats,
}

impl std::fmt::Debug for InMemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCache")
            .field("entries", &self.entries.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            entries: HashMap::new(),
            clock: Box::new(clock),
            stats: CacheStats::default(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires > now);
        before - self.entries.len()
    }
}

impl CacheProvider for InMemoryCache {
    fn get(&mut self, key: &str) -> Option<CachedBytes> {
        let now = self.clock.now();
        match self.entries.get(key) {
            Some(entry) if entry.expires > now => {
                self.stats.hits += 1;
                Some(Rc::clone(&entry.value))
            }
            Some(_) => {
                self.entries.remove(key);
                self.stats.expired += 1;
                self.stats.misses += 1;
                tracing::trace!(key, "cache entry expired");
                None
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    fn set(&mut self, key: &str, value: CachedBytes, ttl: Duration) {
        let expires = self.clock.now() + ttl;
        self.entries.insert(key.to_string(), CacheEntry { value, expires });
    }

    fn remove(&mut self, key: &str) -> Option<CachedBytes> {
        self.entries.remove(key).map(|e| e.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_entries_expire() {
        let clock = clock();
        let mut cache = InMemoryCache::with_clock(clock.clone());

        cache.set("logo", Rc::new(vec![1, 2, 3]), Duration::seconds(60));
        assert_eq!(cache.get("logo").unwrap().len(), 3);

        clock.advance(Duration::seconds(61));
        assert!(cache.get("logo").is_none());
        assert_eq!(cache.stats().expired, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_get_or_load_loads_once() {
        let mut cache = InMemoryCache::with_clock(clock());
        let mut loads = 0;

        for _ in 0..3 {
            let bytes = cache
                .get_or_load("data", Duration::minutes(5), &mut || {
                    loads += 1;
                    Ok(vec![9; 4])
                })
                .unwrap();
            assert_eq!(bytes.len(), 4);
        }

        assert_eq!(loads, 1);
        assert_eq!(cache.stats().hits, 2);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_purge_expired() {
        let clock = clock();
        let mut cache = InMemoryCache::with_clock(clock.clone());
        cache.set("a", Rc::new(vec![]), Duration::seconds(10));
        cache.set("b", Rc::new(vec![]), Duration::seconds(100));

        clock.advance(Duration::seconds(50));
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cached_bytes_outlive_the_source_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.bin");
        std::fs::write(&path, [1u8, 2, 3, 4, 5]).unwrap();

        let mut cache = InMemoryCache::with_clock(clock());
        let first = cache
            .get_or_load("logo", Duration::minutes(5), &mut || Ok(std::fs::read(&path)?))
            .unwrap();
        std::fs::remove_file(&path).unwrap();

        let second = cache
            .get_or_load("logo", Duration::minutes(5), &mut || Ok(std::fs::read(&path)?))
            .unwrap();
        assert!(Rc::ptr_eq(&first, &second));

        let missing = cache.get_or_load("other", Duration::minutes(5), &mut || Ok(std::fs::read(&path)?));
        assert!(matches!(missing, Err(crate::ResourceError::Io(_))));
    }
}
