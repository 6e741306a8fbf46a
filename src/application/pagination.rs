//! Offset pagination helpers and the listing envelopes returned by services.

use serde::{Deserialize, Serialize};

use crate::domain::entities::{CommentRecord, PostRecord};
use crate::domain::limits::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// A normalized page request. Construct through [`PageParams::new`] so the
/// bounds always hold: `page >= 1` and `1 <= page_size <= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageParams {
    page: i64,
    page_size: i64,
}

impl PageParams {
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = match page {
            Some(value) if value >= 1 => value,
            _ => DEFAULT_PAGE,
        };
        let page_size = match page_size {
            Some(value) if value > MAX_PAGE_SIZE => MAX_PAGE_SIZE,
            Some(value) if value >= 1 => value,
            _ => DEFAULT_PAGE_SIZE,
        };
        Self { page, page_size }
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    /// Row offset of the first item, `(page - 1) * page_size`, saturating.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn has_next(&self, total: u64) -> bool {
        (self.page as u128) * (self.page_size as u128) < total as u128
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// A slice of rows together with the total count matching the same filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSlice<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> PageSlice<T> {
    pub fn new(items: Vec<T>, total: u64) -> Self {
        Self { items, total }
    }
}

/// Comment listing envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentTree {
    pub comments: Vec<CommentRecord>,
    pub total: u64,
    pub page: i64,
    pub page_size: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl CommentTree {
    pub fn new(comments: Vec<CommentRecord>, total: u64, params: PageParams) -> Self {
        Self {
            comments,
            total,
            page: params.page(),
            page_size: params.page_size(),
            has_next: params.has_next(total),
            has_prev: params.has_prev(),
        }
    }

    /// Envelope for a single comment decorated with its replies.
    pub fn single(comment: CommentRecord) -> Self {
        Self::new(vec![comment], 1, PageParams::new(Some(1), Some(1)))
    }
}

/// Post listing envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostList {
    pub posts: Vec<PostRecord>,
    pub total: u64,
    pub page: i64,
    pub page_size: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PostList {
    pub fn new(posts: Vec<PostRecord>, total: u64, params: PageParams) -> Self {
        Self {
            posts,
            total,
            page: params.page(),
            page_size: params.page_size(),
            has_next: params.has_next(total),
            has_prev: params.has_prev(),
        }
    }
}
