//! Cache key layout.
//!
//! Every key lives under the `talkback:` prefix. Subtree and listing keys
//! embed a generation token read from a `gen` key; replacing that token
//! retires every key written under the old one.

use sha2::{Digest, Sha256};

use crate::application::repos::{CommentPageQuery, PostListQuery};

const PREFIX: &str = "talkback";
const SEARCH_DIGEST_LEN: usize = 16;

/// Stable digest of a search string; an empty search renders as `-`.
pub fn search_digest(search: &str) -> String {
    let search = search.trim();
    if search.is_empty() {
        return "-".to_string();
    }
    let mut hasher = Sha256::new();
    hasher.update(search.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..SEARCH_DIGEST_LEN].to_string()
}

pub(crate) fn subtree_generation(post_id: i64, root_id: i64) -> String {
    format!("{PREFIX}:comments:tree:{post_id}:{root_id}:gen")
}

pub(crate) fn subtree(post_id: i64, root_id: i64, generation: &str) -> String {
    format!("{PREFIX}:comments:tree:{post_id}:{root_id}:{generation}")
}

pub(crate) fn comment_pages_generation(post_id: i64) -> String {
    format!("{PREFIX}:comments:pages:{post_id}:gen")
}

pub(crate) fn comment_page(query: &CommentPageQuery, generation: &str) -> String {
    let scope = match query.parent_id {
        Some(parent_id) => format!("parent-{parent_id}"),
        None => "root".to_string(),
    };
    format!(
        "{PREFIX}:comments:pages:{post_id}:{generation}:{scope}:{page}:{page_size}:{search}:{sort}:{dir}",
        post_id = query.post_id,
        page = query.page.page(),
        page_size = query.page.page_size(),
        search = search_digest(&query.search),
        sort = query.sort_by.as_str(),
        dir = query.sort_dir.as_str(),
    )
}

pub(crate) fn post(id: i64) -> String {
    format!("{PREFIX}:post:{id}")
}

pub(crate) fn post_list_generation() -> String {
    format!("{PREFIX}:posts:gen")
}

pub(crate) fn post_list(query: &PostListQuery, generation: &str) -> String {
    format!(
        "{PREFIX}:posts:{generation}:{page}:{page_size}:{search}:{sort}:{dir}",
        page = query.page.page(),
        page_size = query.page.page_size(),
        search = search_digest(&query.search),
        sort = query.sort_by.as_str(),
        dir = query.sort_dir.as_str(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pagination::PageParams;
    use crate::domain::types::{CommentSortField, SortDirection};

    #[test]
    fn empty_search_renders_as_dash() {
        assert_eq!(search_digest(""), "-");
        assert_eq!(search_digest("   "), "-");
    }

    #[test]
    fn search_digest_is_stable_and_bounded() {
        let digest = search_digest("hello: world");
        assert_eq!(digest, search_digest("hello: world"));
        assert_eq!(digest.len(), SEARCH_DIGEST_LEN);
        assert!(!digest.contains(':'));
        assert_ne!(digest, search_digest("hello"));
    }

    #[test]
    fn subtree_key_layout() {
        assert_eq!(subtree_generation(3, 17), "talkback:comments:tree:3:17:gen");
        assert_eq!(subtree(3, 17, "g1"), "talkback:comments:tree:3:17:g1");
        assert_eq!(comment_pages_generation(3), "talkback:comments:pages:3:gen");
    }

    #[test]
    fn comment_page_key_covers_every_query_dimension() {
        let mut query = CommentPageQuery::top_level(7, PageParams::new(Some(2), Some(20)));
        assert_eq!(
            comment_page(&query, "g1"),
            "talkback:comments:pages:7:g1:root:2:20:-:created_at:desc"
        );

        query.parent_id = Some(4);
        query.sort_by = CommentSortField::Id;
        query.sort_dir = SortDirection::Asc;
        let key = comment_page(&query, "g1");
        assert!(key.starts_with("talkback:comments:pages:7:g1:parent-4:2:20:"));
        assert!(key.ends_with(":id:asc"));

        assert_ne!(comment_page(&query, "g1"), comment_page(&query, "g2"));
    }

    #[test]
    fn post_keys_layout() {
        assert_eq!(post(9), "talkback:post:9");
        assert_eq!(post_list_generation(), "talkback:posts:gen");
        let key = post_list(&PostListQuery::default(), "g");
        assert_eq!(key, "talkback:posts:g:1:10:-:created_at:desc");
    }
}
