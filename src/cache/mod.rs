//! Talkback cache layer
//!
//! The cache is never authoritative. Reads fall back to the store on any
//! cache failure and writes only ever invalidate or populate best-effort.
//!
//! - [`CacheBackend`]: opaque string keys and JSON string values, with a
//!   miss distinguishable from transport failures. Implemented in memory
//!   ([`MemoryCache`]), on Redis ([`RedisCache`]) and as a no-op
//!   ([`DisabledCache`]).
//! - [`CommentCache`]: reply subtrees and top-level comment pages.
//! - [`PostCache`]: single posts and post listings.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! backend = "redis"            # memory | redis | disabled
//! redis_url = "redis://127.0.0.1:6379"
//! ttl_seconds = 300
//! ```

mod comments;
mod config;
mod keys;
mod lock;
mod posts;
mod remote;
mod store;

pub use comments::CommentCache;
pub use config::{CacheBackendKind, CacheConfig};
pub use keys::search_digest;
pub use posts::PostCache;
pub use remote::RedisCache;
pub use store::{DisabledCache, MemoryCache};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

pub(crate) const METRIC_CACHE_HIT: &str = "talkback_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "talkback_cache_miss_total";
pub(crate) const METRIC_CACHE_ERROR: &str = "talkback_cache_error_total";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache miss")]
    Miss,
    #[error("cache transport error: {0}")]
    Transport(String),
    #[error("cache codec error: {0}")]
    Codec(String),
}

impl CacheError {
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Returns [`CacheError::Miss`] when the key is absent or expired.
    async fn get(&self, key: &str) -> Result<String, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Build the configured backend.
pub async fn connect_backend(config: &CacheConfig) -> Result<Arc<dyn CacheBackend>, CacheError> {
    match config.backend {
        CacheBackendKind::Memory => Ok(Arc::new(MemoryCache::new(config.memory_capacity_non_zero()))),
        CacheBackendKind::Redis => {
            let url = config.redis_url.as_deref().ok_or_else(|| {
                CacheError::Transport("cache.redis_url is required for the redis backend".into())
            })?;
            let cache = RedisCache::connect(url, config.operation_timeout).await?;
            Ok(Arc::new(cache))
        }
        CacheBackendKind::Disabled => Ok(Arc::new(DisabledCache)),
    }
}

/// Run cache work on its own task, bounded by `timeout`.
///
/// The task outlives the caller: dropping the returned handle, or the request
/// that spawned it, does not cancel it. `work` logs its own failures.
pub(crate) fn spawn_detached<F>(timeout: Duration, op: &'static str, work: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if tokio::time::timeout(timeout, work).await.is_err() {
            warn!(target = "talkback::cache", op, "detached cache work timed out");
        }
    })
}

/// Wait for detached work spawned by [`spawn_detached`].
pub(crate) async fn join_detached(op: &'static str, task: JoinHandle<()>) {
    if let Err(err) = task.await {
        warn!(target = "talkback::cache", op, error = %err, "detached cache task failed");
    }
}

/// JSON codec and hit/miss bookkeeping shared by the typed caches.
#[derive(Clone)]
pub(crate) struct TypedCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
    timeout: Duration,
}

impl TypedCache {
    pub(crate) fn new(backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        Self {
            backend,
            ttl: config.ttl,
            timeout: config.operation_timeout,
        }
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        family: &'static str,
        key: &str,
    ) -> Result<T, CacheError> {
        let raw = match self.get_raw(key).await {
            Ok(raw) => raw,
            Err(CacheError::Miss) => {
                counter!(METRIC_CACHE_MISS, "family" => family).increment(1);
                debug!(target = "talkback::cache", family, key, "cache miss");
                return Err(CacheError::Miss);
            }
            Err(err) => {
                counter!(METRIC_CACHE_ERROR, "family" => family).increment(1);
                warn!(target = "talkback::cache", family, key, error = %err, "cache read failed");
                return Err(err);
            }
        };

        match serde_json::from_str::<T>(&raw) {
            Ok(value) => {
                counter!(METRIC_CACHE_HIT, "family" => family).increment(1);
                Ok(value)
            }
            Err(err) => {
                counter!(METRIC_CACHE_ERROR, "family" => family).increment(1);
                warn!(target = "talkback::cache", family, key, error = %err, "cached value could not be decoded");
                Err(CacheError::Codec(err.to_string()))
            }
        }
    }

    pub(crate) async fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value).map_err(|err| CacheError::Codec(err.to_string()))?;
        self.set_raw(key, raw).await
    }

    pub(crate) async fn get_raw(&self, key: &str) -> Result<String, CacheError> {
        match tokio::time::timeout(self.timeout, self.backend.get(key)).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Transport("cache read timed out".into())),
        }
    }

    pub(crate) async fn set_raw(&self, key: &str, raw: String) -> Result<(), CacheError> {
        match tokio::time::timeout(self.timeout, self.backend.set(key, raw, self.ttl)).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Transport("cache write timed out".into())),
        }
    }

    /// Token stored under `key`, minting one when none exists.
    pub(crate) async fn generation(&self, key: &str) -> Result<String, CacheError> {
        match self.get_raw(key).await {
            Ok(generation) => Ok(generation),
            Err(CacheError::Miss) => {
                let generation = new_generation();
                self.set_raw(key, generation.clone()).await?;
                Ok(generation)
            }
            Err(err) => Err(err),
        }
    }

    /// Replace the token under `key`, retiring every entry keyed by the old one.
    pub(crate) async fn bump_generation(&self, key: &str) -> Result<(), CacheError> {
        self.set_raw(key, new_generation()).await
    }

    pub(crate) async fn delete(&self, key: &str) -> Result<(), CacheError> {
        match tokio::time::timeout(self.timeout, self.backend.delete(key)).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Transport("cache delete timed out".into())),
        }
    }
}

fn new_generation() -> String {
    Uuid::new_v4().simple().to_string()
}
