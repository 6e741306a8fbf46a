//! Postgres-backed repository implementations.

mod comments;
mod posts;
mod retry;
mod util;

pub(crate) use retry::METRIC_STORE_RETRY;
pub use retry::{RetryPolicy, with_retry};
pub use util::map_sqlx_error;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::repos::{RepoError, StoreHealth};

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
    retry: RetryPolicy,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool, retry: RetryPolicy) -> Self {
        Self {
            pool: Arc::new(pool),
            retry,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }
}

#[async_trait]
impl StoreHealth for PostgresRepositories {
    async fn ping(&self) -> Result<(), RepoError> {
        let call_timeout = self.retry.call_timeout;
        match tokio::time::timeout(call_timeout, self.health_check()).await {
            Ok(result) => result.map_err(map_sqlx_error),
            Err(_) => Err(RepoError::Timeout),
        }
    }
}
