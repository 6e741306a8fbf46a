//! Typed cache for single posts and post listings.
//!
//! Cached posts carry the `comments_count` computed when they were loaded.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::application::pagination::PageSlice;
use crate::application::repos::PostListQuery;
use crate::domain::entities::PostRecord;

use super::{CacheBackend, CacheConfig, CacheError, TypedCache, keys};

const FAMILY_POST: &str = "post";
const FAMILY_POST_LIST: &str = "post_list";

#[derive(Serialize, Deserialize)]
struct CachedPostList {
    posts: Vec<PostRecord>,
    total: u64,
}

#[derive(Clone)]
pub struct PostCache {
    inner: TypedCache,
}

impl PostCache {
    pub fn new(backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        Self {
            inner: TypedCache::new(backend, config),
        }
    }

    pub async fn get_post(&self, id: i64) -> Result<PostRecord, CacheError> {
        self.inner.get_json(FAMILY_POST, &keys::post(id)).await
    }

    pub async fn set_post(&self, post: &PostRecord) -> Result<(), CacheError> {
        self.inner.set_json(&keys::post(post.id), post).await
    }

    pub async fn invalidate_post(&self, id: i64) -> Result<(), CacheError> {
        self.inner.delete(&keys::post(id)).await
    }

    /// Current listing generation, minting one when none exists.
    pub async fn list_generation(&self) -> Result<String, CacheError> {
        self.inner.generation(&keys::post_list_generation()).await
    }

    pub async fn get_list(
        &self,
        query: &PostListQuery,
        generation: &str,
    ) -> Result<PageSlice<PostRecord>, CacheError> {
        let cached: CachedPostList = self
            .inner
            .get_json(FAMILY_POST_LIST, &keys::post_list(query, generation))
            .await?;
        Ok(PageSlice::new(cached.posts, cached.total))
    }

    pub async fn set_list(
        &self,
        query: &PostListQuery,
        generation: &str,
        list: PageSlice<PostRecord>,
    ) -> Result<(), CacheError> {
        let value = CachedPostList {
            posts: list.items,
            total: list.total,
        };
        self.inner
            .set_json(&keys::post_list(query, generation), &value)
            .await
    }

    pub async fn invalidate_lists(&self) -> Result<(), CacheError> {
        self.inner
            .bump_generation(&keys::post_list_generation())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use std::num::NonZeroUsize;
    use time::OffsetDateTime;

    fn cache() -> PostCache {
        let backend = Arc::new(MemoryCache::new(NonZeroUsize::new(16).expect("capacity")));
        PostCache::new(backend, &CacheConfig::default())
    }

    fn post(id: i64) -> PostRecord {
        PostRecord {
            id,
            title: format!("post {id}"),
            content: "body".into(),
            author: "writer".into(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
            comments_count: 3,
        }
    }

    #[tokio::test]
    async fn post_round_trip_keeps_comment_count() {
        let cache = cache();
        cache.set_post(&post(4)).await.expect("set");
        let cached = cache.get_post(4).await.expect("hit");
        assert_eq!(cached.comments_count, 3);

        cache.invalidate_post(4).await.expect("invalidate");
        assert!(cache.get_post(4).await.expect_err("gone").is_miss());
    }

    #[tokio::test]
    async fn list_invalidation_bumps_generation() {
        let cache = cache();
        let query = PostListQuery::default();
        let generation = cache.list_generation().await.expect("generation");
        cache
            .set_list(&query, &generation, PageSlice::new(vec![post(1)], 1))
            .await
            .expect("set");
        assert_eq!(
            cache.get_list(&query, &generation).await.expect("hit").total,
            1
        );

        cache.invalidate_lists().await.expect("invalidate");
        let fresh = cache.list_generation().await.expect("generation");
        assert_ne!(fresh, generation);
        assert!(cache.get_list(&query, &fresh).await.expect_err("retired").is_miss());
    }
}
