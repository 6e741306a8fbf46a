use serde::{Deserialize, Serialize};

use crate::application::pagination::PageParams;
use crate::application::repos::{CommentPageQuery, PostListQuery};
use crate::domain::entities::{NewComment, NewPost};
use crate::domain::types::{CommentSortField, PostSortField, SortDirection};

#[derive(Debug, Deserialize, Serialize)]
pub struct PostCreateRequest {
    pub title: String,
    pub content: String,
    pub author: String,
}

impl From<PostCreateRequest> for NewPost {
    fn from(request: PostCreateRequest) -> Self {
        Self {
            title: request.title,
            content: request.content,
            author: request.author,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentCreateRequest {
    #[serde(default)]
    pub parent_id: Option<i64>,
    pub content: String,
    pub author: String,
}

impl CommentCreateRequest {
    pub fn into_new_comment(self, post_id: i64) -> NewComment {
        NewComment {
            post_id,
            parent_id: self.parent_id,
            content: self.content,
            author: self.author,
        }
    }
}

/// Raw listing parameters. Every value is kept as text so that an
/// unparsable number falls back to its default instead of rejecting the
/// request.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub parent: Option<String>,
}

impl ListParams {
    pub fn page_params(&self) -> PageParams {
        PageParams::new(lenient_i64(&self.page), lenient_i64(&self.page_size))
    }

    pub fn search(&self) -> String {
        self.search
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.sort_order
            .as_deref()
            .map(SortDirection::parse_lenient)
            .unwrap_or_default()
    }

    /// `Err` carries the rejected text.
    pub fn parent(&self) -> Result<Option<i64>, String> {
        match self.parent.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => value.parse().map(Some).map_err(|_| value.to_string()),
        }
    }

    pub fn post_list_query(&self) -> PostListQuery {
        PostListQuery {
            page: self.page_params(),
            search: self.search(),
            sort_by: self
                .sort_by
                .as_deref()
                .map(PostSortField::parse_lenient)
                .unwrap_or_default(),
            sort_dir: self.sort_direction(),
        }
    }

    pub fn comment_page_query(
        &self,
        post_id: i64,
        parent_id: Option<i64>,
    ) -> CommentPageQuery {
        CommentPageQuery {
            post_id,
            parent_id,
            page: self.page_params(),
            search: self.search(),
            sort_by: self
                .sort_by
                .as_deref()
                .map(CommentSortField::parse_lenient)
                .unwrap_or_default(),
            sort_dir: self.sort_direction(),
        }
    }
}

fn lenient_i64(value: &Option<String>) -> Option<i64> {
    value.as_deref().and_then(|raw| raw.trim().parse().ok())
}
