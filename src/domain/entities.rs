//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A single comment row. `children` is never persisted; it is filled in
/// while a reply tree is assembled and travels through the cache with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub author: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default)]
    pub children: Vec<CommentRecord>,
}

impl CommentRecord {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Number of comments in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        let mut len = 0;
        let mut pending = vec![self];
        while let Some(comment) = pending.pop() {
            len += 1;
            pending.extend(comment.children.iter());
        }
        len
    }
}

/// Input for a comment insert; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// Derived on read; never stored in the posts table.
    #[serde(default)]
    pub comments_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub author: String,
}
