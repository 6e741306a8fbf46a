//! Redis-backed cache.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tracing::info;

use super::{CacheBackend, CacheError};

/// Shared multiplexed connection; cloning is cheap and every clone talks to
/// the same socket.
#[derive(Clone)]
pub struct RedisCache {
    connection: MultiplexedConnection,
    timeout: Duration,
}

impl RedisCache {
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(transport)?;
        let connection = tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| CacheError::Transport("timed out connecting to redis".into()))?
            .map_err(transport)?;
        info!(target = "talkback::cache::redis", "redis cache connected");
        Ok(Self {
            connection,
            timeout,
        })
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, CacheError>
    where
        F: std::future::Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result.map_err(transport),
            Err(_) => Err(CacheError::Transport("redis operation timed out".into())),
        }
    }
}

fn transport(err: redis::RedisError) -> CacheError {
    CacheError::Transport(err.to_string())
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<String, CacheError> {
        let mut connection = self.connection.clone();
        let value: Option<String> = self.bounded(connection.get(key)).await?;
        value.ok_or(CacheError::Miss)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        let seconds = ttl.as_secs().max(1);
        let _: () = self.bounded(connection.set_ex(key, value, seconds)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        let _: () = self.bounded(connection.del(key)).await?;
        Ok(())
    }
}
