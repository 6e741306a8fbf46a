//! Comment orchestration: validation, cache-then-store reads and
//! store-then-invalidate writes.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::application::error::ErrorKind;
use crate::application::pagination::CommentTree;
use crate::application::repos::{CommentPageQuery, CommentsRepo, RepoError};
use crate::cache::{CommentCache, join_detached, spawn_detached};
use crate::domain::entities::{CommentRecord, NewComment};
use crate::domain::limits::{
    AuthorError, COMMENT_CONTENT_MAX, MAX_REPLY_DEPTH, char_len, check_author,
};
use crate::domain::tree::build_comment_tree;

const TARGET: &str = "talkback::comments";

#[derive(Debug, Error)]
pub enum CommentServiceError {
    #[error("post id must be a positive integer")]
    InvalidPostId,
    #[error("comment id must be a positive integer")]
    InvalidCommentId,
    #[error("content is required")]
    ContentRequired,
    #[error("content must be at most 1000 characters")]
    ContentTooLong,
    #[error("author is required")]
    AuthorRequired,
    #[error("author must be at least 2 characters")]
    AuthorTooShort,
    #[error("author must be at most 50 characters")]
    AuthorTooLong,
    #[error("replies may nest at most 50 levels deep")]
    ThreadTooDeep,
    #[error("parent comment {0} does not exist")]
    InvalidParentId(i64),
    #[error("comment not found")]
    CommentNotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl CommentServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPostId
            | Self::InvalidCommentId
            | Self::ContentRequired
            | Self::ContentTooLong
            | Self::AuthorRequired
            | Self::AuthorTooShort
            | Self::AuthorTooLong
            | Self::ThreadTooDeep => ErrorKind::Validation,
            Self::InvalidParentId(_) => ErrorKind::Conflict,
            Self::CommentNotFound => ErrorKind::NotFound,
            Self::Repo(err) => ErrorKind::from_repo(err),
        }
    }
}

impl From<AuthorError> for CommentServiceError {
    fn from(err: AuthorError) -> Self {
        match err {
            AuthorError::Required => Self::AuthorRequired,
            AuthorError::TooShort => Self::AuthorTooShort,
            AuthorError::TooLong => Self::AuthorTooLong,
        }
    }
}

#[derive(Clone)]
pub struct CommentService {
    repo: Arc<dyn CommentsRepo>,
    cache: CommentCache,
    detached_timeout: Duration,
}

impl CommentService {
    pub fn new(repo: Arc<dyn CommentsRepo>, cache: CommentCache, detached_timeout: Duration) -> Self {
        Self {
            repo,
            cache,
            detached_timeout,
        }
    }

    pub async fn create_comment(
        &self,
        mut params: NewComment,
    ) -> Result<CommentRecord, CommentServiceError> {
        Self::validate_new_comment(&params)?;
        params.author = params.author.trim().to_string();

        let mut stale_roots = Vec::new();
        if let Some(parent_id) = params.parent_id {
            if parent_id <= 0 {
                return Err(CommentServiceError::InvalidParentId(parent_id));
            }
            match self.repo.get_comment(parent_id).await {
                Ok(parent) if parent.post_id == params.post_id => {}
                Ok(_) | Err(RepoError::NotFound) => {
                    return Err(CommentServiceError::InvalidParentId(parent_id));
                }
                Err(err) => return Err(err.into()),
            }

            // The chain holds the parent and everything above it.
            let ancestors = self.repo.get_comment_ancestors(parent_id).await?;
            if ancestors.is_empty() {
                return Err(CommentServiceError::InvalidParentId(parent_id));
            }
            if ancestors.len() >= MAX_REPLY_DEPTH {
                return Err(CommentServiceError::ThreadTooDeep);
            }
            stale_roots = ancestors;
        }

        let created = self.repo.create_comment(params).await?;
        debug!(
            target = TARGET,
            comment_id = created.id,
            post_id = created.post_id,
            parent_id = ?created.parent_id,
            "comment created"
        );

        let invalidation = self.spawn_invalidation(created.post_id, stale_roots);
        join_detached("comment_invalidation", invalidation).await;

        Ok(created)
    }

    /// With `query.parent_id` set, returns that comment alone decorated with
    /// its full reply tree. Otherwise returns one page of top-level comments;
    /// unless searching, each carries its full reply tree.
    pub async fn get_comments(
        &self,
        query: CommentPageQuery,
    ) -> Result<CommentTree, CommentServiceError> {
        if query.post_id <= 0 {
            return Err(CommentServiceError::InvalidPostId);
        }

        match query.parent_id {
            Some(parent_id) => self.get_thread(query.post_id, parent_id).await,
            None => self.get_top_level_page(&query).await,
        }
    }

    /// Deletes the comment and all of its replies; returns the rows removed.
    pub async fn delete_comment(&self, id: i64) -> Result<u64, CommentServiceError> {
        if id <= 0 {
            return Err(CommentServiceError::InvalidCommentId);
        }
        if !self.repo.comment_exists(id).await? {
            return Err(CommentServiceError::CommentNotFound);
        }

        let comment = match self.repo.get_comment(id).await {
            Ok(comment) => comment,
            Err(RepoError::NotFound) => return Err(CommentServiceError::CommentNotFound),
            Err(err) => return Err(err.into()),
        };

        let stale_roots = self.stale_roots_of(id, comment.parent_id).await;
        let removed = self.repo.delete_comment(id).await?;
        debug!(
            target = TARGET,
            comment_id = id,
            post_id = comment.post_id,
            removed,
            "comment subtree deleted"
        );

        let invalidation = self.spawn_invalidation(comment.post_id, stale_roots);
        join_detached("comment_invalidation", invalidation).await;

        Ok(removed)
    }

    fn validate_new_comment(params: &NewComment) -> Result<(), CommentServiceError> {
        if params.post_id <= 0 {
            return Err(CommentServiceError::InvalidPostId);
        }
        if params.content.trim().is_empty() {
            return Err(CommentServiceError::ContentRequired);
        }
        if char_len(&params.content) > COMMENT_CONTENT_MAX {
            return Err(CommentServiceError::ContentTooLong);
        }
        check_author(&params.author)?;
        Ok(())
    }

    async fn get_thread(
        &self,
        post_id: i64,
        parent_id: i64,
    ) -> Result<CommentTree, CommentServiceError> {
        if parent_id <= 0 {
            return Err(CommentServiceError::InvalidCommentId);
        }

        let mut parent = match self.repo.get_comment(parent_id).await {
            Ok(parent) if parent.post_id == post_id => parent,
            Ok(_) | Err(RepoError::NotFound) => {
                return Err(CommentServiceError::CommentNotFound);
            }
            Err(err) => return Err(err.into()),
        };

        parent.children = self.load_subtree(post_id, parent_id).await?;
        Ok(CommentTree::single(parent))
    }

    async fn get_top_level_page(
        &self,
        query: &CommentPageQuery,
    ) -> Result<CommentTree, CommentServiceError> {
        let generation = match self.cache.page_generation(query.post_id).await {
            Ok(generation) => Some(generation),
            Err(err) => {
                warn!(
                    target = TARGET,
                    post_id = query.post_id,
                    error = %err,
                    "page generation unavailable, bypassing page cache"
                );
                None
            }
        };

        if let Some(generation) = generation.as_deref() {
            if let Ok(page) = self.cache.get_page(query, generation).await {
                return Ok(CommentTree::new(page.items, page.total, query.page));
            }
        }

        let mut page = self.repo.get_comment_page(query).await?;

        let mut complete = true;
        if !query.has_search() {
            for comment in &mut page.items {
                match self.load_subtree(query.post_id, comment.id).await {
                    Ok(children) => comment.children = children,
                    Err(err) => {
                        complete = false;
                        warn!(
                            target = TARGET,
                            post_id = query.post_id,
                            comment_id = comment.id,
                            error = %err,
                            "failed to load replies, returning comment without them"
                        );
                    }
                }
            }
        }

        if let (Some(generation), true) = (generation.as_deref(), complete) {
            if let Err(err) = self.cache.set_page(query, generation, &page).await {
                warn!(
                    target = TARGET,
                    post_id = query.post_id,
                    error = %err,
                    "failed to cache comment page"
                );
            }
        }

        Ok(CommentTree::new(page.items, page.total, query.page))
    }

    /// Replies of `root_id`, nested, read through the subtree cache.
    async fn load_subtree(
        &self,
        post_id: i64,
        root_id: i64,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        let generation = match self.cache.subtree_generation(post_id, root_id).await {
            Ok(generation) => Some(generation),
            Err(err) => {
                warn!(
                    target = TARGET,
                    post_id,
                    comment_id = root_id,
                    error = %err,
                    "subtree generation unavailable, bypassing subtree cache"
                );
                None
            }
        };

        if let Some(generation) = generation.as_deref() {
            if let Ok(children) = self.cache.get_subtree(post_id, root_id, generation).await {
                return Ok(children);
            }
        }

        let rows = self.repo.get_comment_tree(post_id, root_id).await?;
        let children = build_comment_tree(rows, Some(root_id))
            .pop()
            .map(|root| root.children)
            .unwrap_or_default();

        if let Some(generation) = generation.as_deref() {
            if let Err(err) = self
                .cache
                .set_subtree(post_id, root_id, generation, &children)
                .await
            {
                warn!(
                    target = TARGET,
                    post_id,
                    comment_id = root_id,
                    error = %err,
                    "failed to cache reply subtree"
                );
            }
        }

        Ok(children)
    }

    /// Every cached subtree that contains `id`: the comment itself and each
    /// comment above it. Falls back to `id` and its parent when the chain
    /// cannot be read.
    async fn stale_roots_of(&self, id: i64, parent_id: Option<i64>) -> Vec<i64> {
        let nearest = || std::iter::once(id).chain(parent_id).collect();
        match self.repo.get_comment_ancestors(id).await {
            Ok(ancestors) if !ancestors.is_empty() => ancestors,
            Ok(_) => nearest(),
            Err(err) => {
                warn!(
                    target = TARGET,
                    comment_id = id,
                    error = %err,
                    "failed to resolve ancestors, invalidating comment and parent only"
                );
                nearest()
            }
        }
    }

    /// Retire the subtrees rooted at `roots` and every comment page of the
    /// post. Runs on its own task so a cancelled request still invalidates
    /// what it wrote.
    fn spawn_invalidation(&self, post_id: i64, roots: Vec<i64>) -> JoinHandle<()> {
        let cache = self.cache.clone();
        spawn_detached(self.detached_timeout, "comment_invalidation", async move {
            for root_id in roots {
                if let Err(err) = cache.invalidate_subtree(post_id, root_id).await {
                    warn!(
                        target = TARGET,
                        post_id,
                        comment_id = root_id,
                        error = %err,
                        "failed to invalidate reply subtree"
                    );
                }
            }

            if let Err(err) = cache.invalidate_pages(post_id).await {
                warn!(
                    target = TARGET,
                    post_id,
                    error = %err,
                    "failed to invalidate comment pages"
                );
            }
        })
    }
}
