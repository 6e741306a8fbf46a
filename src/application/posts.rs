//! Post orchestration. Reads go through the post cache; cache population is
//! detached from the request and its outcome is only ever logged.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::application::error::ErrorKind;
use crate::application::pagination::PostList;
use crate::application::repos::{PostListQuery, PostsRepo, RepoError};
use crate::cache::{CacheError, CommentCache, PostCache, join_detached, spawn_detached};
use crate::domain::entities::{NewPost, PostRecord};
use crate::domain::limits::{AuthorError, POST_CONTENT_MAX, POST_TITLE_MAX, char_len, check_author};

const TARGET: &str = "talkback::posts";

#[derive(Debug, Error)]
pub enum PostServiceError {
    #[error("post id must be a positive integer")]
    InvalidPostId,
    #[error("title is required")]
    TitleRequired,
    #[error("title must be at most 200 characters")]
    TitleTooLong,
    #[error("content is required")]
    ContentRequired,
    #[error("content must be at most 10000 characters")]
    ContentTooLong,
    #[error("author is required")]
    AuthorRequired,
    #[error("author must be at least 2 characters")]
    AuthorTooShort,
    #[error("author must be at most 50 characters")]
    AuthorTooLong,
    #[error("post not found")]
    PostNotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl PostServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPostId
            | Self::TitleRequired
            | Self::TitleTooLong
            | Self::ContentRequired
            | Self::ContentTooLong
            | Self::AuthorRequired
            | Self::AuthorTooShort
            | Self::AuthorTooLong => ErrorKind::Validation,
            Self::PostNotFound => ErrorKind::NotFound,
            Self::Repo(err) => ErrorKind::from_repo(err),
        }
    }
}

impl From<AuthorError> for PostServiceError {
    fn from(err: AuthorError) -> Self {
        match err {
            AuthorError::Required => Self::AuthorRequired,
            AuthorError::TooShort => Self::AuthorTooShort,
            AuthorError::TooLong => Self::AuthorTooLong,
        }
    }
}

#[derive(Clone)]
pub struct PostService {
    repo: Arc<dyn PostsRepo>,
    cache: PostCache,
    comment_cache: CommentCache,
    detached_timeout: Duration,
}

impl PostService {
    pub fn new(
        repo: Arc<dyn PostsRepo>,
        cache: PostCache,
        comment_cache: CommentCache,
        detached_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            cache,
            comment_cache,
            detached_timeout,
        }
    }

    pub async fn create_post(&self, mut params: NewPost) -> Result<PostRecord, PostServiceError> {
        Self::validate_new_post(&params)?;
        params.author = params.author.trim().to_string();

        let created = self.repo.create_post(params).await?;
        debug!(target = TARGET, post_id = created.id, "post created");

        let invalidation = self.spawn_invalidation(created.id, false);
        join_detached("post_invalidation", invalidation).await;

        Ok(created)
    }

    pub async fn get_post(&self, id: i64) -> Result<PostRecord, PostServiceError> {
        if id <= 0 {
            return Err(PostServiceError::InvalidPostId);
        }

        if let Ok(post) = self.cache.get_post(id).await {
            return Ok(post);
        }

        let mut post = match self.repo.get_post(id).await {
            Ok(post) => post,
            Err(RepoError::NotFound) => return Err(PostServiceError::PostNotFound),
            Err(err) => return Err(err.into()),
        };
        post.comments_count = self.comments_count(id).await;

        let cache = self.cache.clone();
        let cached = post.clone();
        self.spawn_write_back("post", async move { cache.set_post(&cached).await });

        Ok(post)
    }

    pub async fn list_posts(&self, query: PostListQuery) -> Result<PostList, PostServiceError> {
        let generation = match self.cache.list_generation().await {
            Ok(generation) => Some(generation),
            Err(err) => {
                warn!(target = TARGET, error = %err, "listing generation unavailable, bypassing listing cache");
                None
            }
        };

        if let Some(generation) = generation.as_deref() {
            if let Ok(list) = self.cache.get_list(&query, generation).await {
                return Ok(PostList::new(list.items, list.total, query.page));
            }
        }

        let mut list = self.repo.list_posts(&query).await?;
        for post in &mut list.items {
            post.comments_count = self.comments_count(post.id).await;
        }

        if let Some(generation) = generation {
            let cache = self.cache.clone();
            let cached = list.clone();
            let cached_query = query.clone();
            self.spawn_write_back("post_list", async move {
                cache.set_list(&cached_query, &generation, cached).await
            });
        }

        Ok(PostList::new(list.items, list.total, query.page))
    }

    /// Deletes the post and, through the store, every comment on it.
    pub async fn delete_post(&self, id: i64) -> Result<(), PostServiceError> {
        if id <= 0 {
            return Err(PostServiceError::InvalidPostId);
        }
        if !self.repo.post_exists(id).await? {
            return Err(PostServiceError::PostNotFound);
        }

        let removed = self.repo.delete_post(id).await?;
        debug!(target = TARGET, post_id = id, removed, "post deleted");

        let invalidation = self.spawn_invalidation(id, true);
        join_detached("post_invalidation", invalidation).await;

        Ok(())
    }

    fn validate_new_post(params: &NewPost) -> Result<(), PostServiceError> {
        if params.title.trim().is_empty() {
            return Err(PostServiceError::TitleRequired);
        }
        if char_len(&params.title) > POST_TITLE_MAX {
            return Err(PostServiceError::TitleTooLong);
        }
        if params.content.trim().is_empty() {
            return Err(PostServiceError::ContentRequired);
        }
        if char_len(&params.content) > POST_CONTENT_MAX {
            return Err(PostServiceError::ContentTooLong);
        }
        check_author(&params.author)?;
        Ok(())
    }

    async fn comments_count(&self, post_id: i64) -> u64 {
        match self.repo.count_comments(post_id).await {
            Ok(count) => count,
            Err(err) => {
                warn!(target = TARGET, post_id, error = %err, "failed to count comments, reporting zero");
                0
            }
        }
    }

    /// Fire-and-forget cache write; the caller never waits for it.
    fn spawn_write_back<F>(&self, family: &'static str, write: F)
    where
        F: Future<Output = Result<(), CacheError>> + Send + 'static,
    {
        spawn_detached(self.detached_timeout, "post_write_back", async move {
            if let Err(err) = write.await {
                warn!(target = TARGET, family, error = %err, "cache write-back failed");
            }
        });
    }

    /// Retire the listings, and for a deleted post its cached copy and comment
    /// pages. Runs on its own task so a cancelled request still invalidates
    /// what it wrote.
    fn spawn_invalidation(&self, post_id: i64, deleted: bool) -> JoinHandle<()> {
        let cache = self.cache.clone();
        let comment_cache = self.comment_cache.clone();
        spawn_detached(self.detached_timeout, "post_invalidation", async move {
            if deleted {
                if let Err(err) = cache.invalidate_post(post_id).await {
                    warn!(target = TARGET, post_id, error = %err, "failed to invalidate cached post");
                }
            }
            if let Err(err) = cache.invalidate_lists().await {
                warn!(target = TARGET, post_id, error = %err, "failed to invalidate post listings");
            }
            if deleted {
                if let Err(err) = comment_cache.invalidate_pages(post_id).await {
                    warn!(target = TARGET, post_id, error = %err, "failed to invalidate comment pages");
                }
            }
        })
    }
}
