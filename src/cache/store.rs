//! In-process cache backends.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;

use super::lock::mutex_lock;
use super::{CacheBackend, CacheError};

const SOURCE: &str = "cache::store";

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Bounded LRU with per-entry expiry.
///
/// Expired entries are dropped lazily on read; capacity pressure evicts the
/// least recently used entry.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemoryCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<String, CacheError> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Err(CacheError::Miss)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| CacheError::Codec(format!("ttl {ttl:?} is out of range")))?;
        mutex_lock(&self.entries, SOURCE, "set").put(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        mutex_lock(&self.entries, SOURCE, "delete").pop(key);
        Ok(())
    }
}

/// Backend used when caching is switched off: every read misses and every
/// write is accepted and discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCache;

#[async_trait]
impl CacheBackend for DisabledCache {
    async fn get(&self, _key: &str) -> Result<String, CacheError> {
        Err(CacheError::Miss)
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }
}
