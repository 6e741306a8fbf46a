//! Typed cache for reply subtrees and comment pages.
//!
//! Subtree keys embed the root's current generation and page keys the post's.
//! Callers read the generation before querying the store, so a value computed
//! from rows read before an invalidation is written under a retired generation
//! and can never be served afterwards.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::application::pagination::PageSlice;
use crate::application::repos::CommentPageQuery;
use crate::domain::entities::CommentRecord;

use super::{CacheBackend, CacheConfig, CacheError, TypedCache, keys};

const FAMILY_SUBTREE: &str = "subtree";
const FAMILY_PAGE: &str = "comment_page";

#[derive(Serialize)]
struct CachedPageRef<'a> {
    comments: &'a [CommentRecord],
    total: u64,
}

#[derive(Deserialize)]
struct CachedPage {
    comments: Vec<CommentRecord>,
    total: u64,
}

#[derive(Clone)]
pub struct CommentCache {
    inner: TypedCache,
}

impl CommentCache {
    pub fn new(backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        Self {
            inner: TypedCache::new(backend, config),
        }
    }

    /// Current subtree generation of `root_id`, minting one when none exists.
    pub async fn subtree_generation(&self, post_id: i64, root_id: i64) -> Result<String, CacheError> {
        self.inner
            .generation(&keys::subtree_generation(post_id, root_id))
            .await
    }

    /// The materialized replies of `root_id`, nested.
    pub async fn get_subtree(
        &self,
        post_id: i64,
        root_id: i64,
        generation: &str,
    ) -> Result<Vec<CommentRecord>, CacheError> {
        self.inner
            .get_json(FAMILY_SUBTREE, &keys::subtree(post_id, root_id, generation))
            .await
    }

    pub async fn set_subtree(
        &self,
        post_id: i64,
        root_id: i64,
        generation: &str,
        children: &[CommentRecord],
    ) -> Result<(), CacheError> {
        self.inner
            .set_json(&keys::subtree(post_id, root_id, generation), children)
            .await
    }

    pub async fn invalidate_subtree(&self, post_id: i64, root_id: i64) -> Result<(), CacheError> {
        self.inner
            .bump_generation(&keys::subtree_generation(post_id, root_id))
            .await
    }

    /// Current page generation of `post_id`, minting one when none exists.
    pub async fn page_generation(&self, post_id: i64) -> Result<String, CacheError> {
        self.inner
            .generation(&keys::comment_pages_generation(post_id))
            .await
    }

    pub async fn get_page(
        &self,
        query: &CommentPageQuery,
        generation: &str,
    ) -> Result<PageSlice<CommentRecord>, CacheError> {
        let cached: CachedPage = self
            .inner
            .get_json(FAMILY_PAGE, &keys::comment_page(query, generation))
            .await?;
        Ok(PageSlice::new(cached.comments, cached.total))
    }

    pub async fn set_page(
        &self,
        query: &CommentPageQuery,
        generation: &str,
        page: &PageSlice<CommentRecord>,
    ) -> Result<(), CacheError> {
        let value = CachedPageRef {
            comments: &page.items,
            total: page.total,
        };
        self.inner
            .set_json(&keys::comment_page(query, generation), &value)
            .await
    }

    /// Retire every cached page of `post_id`, whatever its scope or filters.
    pub async fn invalidate_pages(&self, post_id: i64) -> Result<(), CacheError> {
        self.inner
            .bump_generation(&keys::comment_pages_generation(post_id))
            .await
    }
}
