//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::application::pagination::{PageParams, PageSlice};
use crate::domain::entities::{CommentRecord, NewComment, NewPost, PostRecord};
use crate::domain::types::{CommentSortField, PostSortField, SortDirection};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error("database unavailable: {0}")]
    Unavailable(String),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    /// Transport-level failures that may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Unavailable(_))
    }

    /// The store rejected the row on a constraint.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::Duplicate { .. } | Self::InvalidInput { .. } | Self::Integrity { .. }
        )
    }
}

/// Filter, sort and page selection for a comment listing.
///
/// `parent_id = None` selects top-level comments of the post.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommentPageQuery {
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub page: PageParams,
    pub search: String,
    pub sort_by: CommentSortField,
    pub sort_dir: SortDirection,
}

impl CommentPageQuery {
    pub fn top_level(post_id: i64, page: PageParams) -> Self {
        Self {
            post_id,
            parent_id: None,
            page,
            search: String::new(),
            sort_by: CommentSortField::default(),
            sort_dir: SortDirection::default(),
        }
    }

    pub fn has_search(&self) -> bool {
        !self.search.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostListQuery {
    pub page: PageParams,
    pub search: String,
    pub sort_by: PostSortField,
    pub sort_dir: SortDirection,
}

impl Default for PostListQuery {
    fn default() -> Self {
        Self {
            page: PageParams::default(),
            search: String::new(),
            sort_by: PostSortField::default(),
            sort_dir: SortDirection::default(),
        }
    }
}

impl PostListQuery {
    pub fn has_search(&self) -> bool {
        !self.search.trim().is_empty()
    }
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    /// Insert a comment; id and timestamps are assigned by the store.
    async fn create_comment(&self, params: NewComment) -> Result<CommentRecord, RepoError>;

    /// `Ok(false)` for an absent id; errors only on transport failure.
    async fn comment_exists(&self, id: i64) -> Result<bool, RepoError>;

    /// Fails with [`RepoError::NotFound`] when absent.
    async fn get_comment(&self, id: i64) -> Result<CommentRecord, RepoError>;

    /// Flat rows of the subtree rooted at `root_id` (root inclusive),
    /// ordered by `created_at` ascending.
    async fn get_comment_tree(
        &self,
        post_id: i64,
        root_id: i64,
    ) -> Result<Vec<CommentRecord>, RepoError>;

    /// Ids of `id` and every comment above it, in no particular order.
    /// Empty when `id` does not exist.
    async fn get_comment_ancestors(&self, id: i64) -> Result<Vec<i64>, RepoError>;

    /// One page of comments directly under the query scope plus the total
    /// number of matching rows.
    async fn get_comment_page(
        &self,
        query: &CommentPageQuery,
    ) -> Result<PageSlice<CommentRecord>, RepoError>;

    /// Delete `id` and every descendant atomically; returns rows removed.
    async fn delete_comment(&self, id: i64) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn create_post(&self, params: NewPost) -> Result<PostRecord, RepoError>;

    async fn post_exists(&self, id: i64) -> Result<bool, RepoError>;

    /// Fails with [`RepoError::NotFound`] when absent. `comments_count` is
    /// left at zero; see [`PostsRepo::count_comments`].
    async fn get_post(&self, id: i64) -> Result<PostRecord, RepoError>;

    async fn list_posts(&self, query: &PostListQuery) -> Result<PageSlice<PostRecord>, RepoError>;

    /// Deletes the post; its comments go with it.
    async fn delete_post(&self, id: i64) -> Result<u64, RepoError>;

    async fn count_comments(&self, post_id: i64) -> Result<u64, RepoError>;
}

/// Liveness probe for the backing store.
#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}
