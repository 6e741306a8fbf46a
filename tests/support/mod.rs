//! In-memory stand-ins for the store and cache used by the service and API
//! tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use talkback::application::comments::CommentService;
use talkback::application::pagination::PageSlice;
use talkback::application::posts::PostService;
use talkback::application::repos::{
    CommentPageQuery, CommentsRepo, PostListQuery, PostsRepo, RepoError, StoreHealth,
};
use talkback::cache::{CacheBackend, CacheConfig, CacheError, CommentCache, MemoryCache, PostCache};
use talkback::domain::entities::{CommentRecord, NewComment, NewPost, PostRecord};
use talkback::domain::types::{CommentSortField, PostSortField, SortDirection};
use talkback::infra::http::ApiState;

#[derive(Default)]
struct StoreState {
    next_id: i64,
    ticks: i64,
    posts: BTreeMap<i64, PostRecord>,
    comments: BTreeMap<i64, CommentRecord>,
}

impl StoreState {
    fn next(&mut self) -> (i64, OffsetDateTime) {
        self.next_id += 1;
        self.ticks += 1;
        let at = OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(1_700_000_000 + self.ticks);
        (self.next_id, at)
    }

    fn descendants(&self, root: i64) -> Vec<i64> {
        let mut found = vec![root];
        let mut cursor = 0;
        while cursor < found.len() {
            let current = found[cursor];
            found.extend(
                self.comments
                    .values()
                    .filter(|comment| comment.parent_id == Some(current))
                    .map(|comment| comment.id),
            );
            cursor += 1;
        }
        found
    }
}

/// Relational store double with per-operation call counters and failure
/// switches. A failing operation returns [`RepoError::Unavailable`].
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<StoreState>,
    calls: Mutex<HashMap<&'static str, usize>>,
    failing: Mutex<HashSet<&'static str>>,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn calls(&self, op: &'static str) -> usize {
        self.calls.lock().await.get(op).copied().unwrap_or(0)
    }

    pub async fn fail(&self, op: &'static str) {
        self.failing.lock().await.insert(op);
    }

    pub async fn recover(&self, op: &'static str) {
        self.failing.lock().await.remove(op);
    }

    pub async fn comment_count(&self) -> usize {
        self.state.lock().await.comments.len()
    }

    async fn enter(&self, op: &'static str) -> Result<(), RepoError> {
        *self.calls.lock().await.entry(op).or_insert(0) += 1;
        if self.failing.lock().await.contains(op) {
            return Err(RepoError::Unavailable(format!("{op} unavailable")));
        }
        Ok(())
    }
}

fn compare_comments(
    a: &CommentRecord,
    b: &CommentRecord,
    field: CommentSortField,
) -> std::cmp::Ordering {
    let primary = match field {
        CommentSortField::Id => a.id.cmp(&b.id),
        CommentSortField::CreatedAt => a.created_at.cmp(&b.created_at),
        CommentSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    };
    primary.then(a.id.cmp(&b.id))
}

fn compare_posts(a: &PostRecord, b: &PostRecord, field: PostSortField) -> std::cmp::Ordering {
    let primary = match field {
        PostSortField::Id => a.id.cmp(&b.id),
        PostSortField::CreatedAt => a.created_at.cmp(&b.created_at),
        PostSortField::Title => a.title.cmp(&b.title),
    };
    primary.then(a.id.cmp(&b.id))
}

fn window<T>(items: Vec<T>, offset: i64, limit: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(0))
        .take(usize::try_from(limit).unwrap_or(0))
        .collect()
}

#[async_trait]
impl CommentsRepo for FakeStore {
    async fn create_comment(&self, params: NewComment) -> Result<CommentRecord, RepoError> {
        self.enter("create_comment").await?;
        let mut state = self.state.lock().await;

        if !state.posts.contains_key(&params.post_id) {
            return Err(RepoError::InvalidInput {
                message: "violates foreign key constraint \"comments_post_id_fkey\"".into(),
            });
        }
        if let Some(parent_id) = params.parent_id {
            let same_post = state
                .comments
                .get(&parent_id)
                .is_some_and(|parent| parent.post_id == params.post_id);
            if !same_post {
                return Err(RepoError::InvalidInput {
                    message: "violates foreign key constraint \"comments_parent_fkey\"".into(),
                });
            }
        }

        let (id, at) = state.next();
        let record = CommentRecord {
            id,
            post_id: params.post_id,
            parent_id: params.parent_id,
            content: params.content,
            author: params.author,
            created_at: at,
            updated_at: at,
            children: Vec::new(),
        };
        state.comments.insert(id, record.clone());
        Ok(record)
    }

    async fn comment_exists(&self, id: i64) -> Result<bool, RepoError> {
        self.enter("comment_exists").await?;
        Ok(self.state.lock().await.comments.contains_key(&id))
    }

    async fn get_comment(&self, id: i64) -> Result<CommentRecord, RepoError> {
        self.enter("get_comment").await?;
        self.state
            .lock()
            .await
            .comments
            .get(&id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn get_comment_tree(
        &self,
        post_id: i64,
        root_id: i64,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        self.enter("get_comment_tree").await?;
        let state = self.state.lock().await;
        if !state
            .comments
            .get(&root_id)
            .is_some_and(|root| root.post_id == post_id)
        {
            return Ok(Vec::new());
        }

        let mut rows: Vec<CommentRecord> = state
            .descendants(root_id)
            .into_iter()
            .filter_map(|id| state.comments.get(&id).cloned())
            .collect();
        rows.sort_by(|a, b| compare_comments(a, b, CommentSortField::CreatedAt));
        Ok(rows)
    }

    async fn get_comment_ancestors(&self, id: i64) -> Result<Vec<i64>, RepoError> {
        self.enter("get_comment_ancestors").await?;
        let state = self.state.lock().await;
        let mut chain = Vec::new();
        let mut current = state.comments.get(&id);
        while let Some(comment) = current {
            chain.push(comment.id);
            current = comment.parent_id.and_then(|parent| state.comments.get(&parent));
        }
        Ok(chain)
    }

    async fn get_comment_page(
        &self,
        query: &CommentPageQuery,
    ) -> Result<PageSlice<CommentRecord>, RepoError> {
        self.enter("get_comment_page").await?;
        let state = self.state.lock().await;
        let needle = query.search.trim().to_lowercase();

        let mut matching: Vec<CommentRecord> = state
            .comments
            .values()
            .filter(|comment| comment.post_id == query.post_id)
            .filter(|comment| comment.parent_id == query.parent_id)
            .filter(|comment| needle.is_empty() || comment.content.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        matching.sort_by(|a, b| compare_comments(a, b, query.sort_by));
        if query.sort_dir == SortDirection::Desc {
            matching.reverse();
        }

        let total = matching.len() as u64;
        let items = window(matching, query.page.offset(), query.page.page_size());
        Ok(PageSlice::new(items, total))
    }

    async fn delete_comment(&self, id: i64) -> Result<u64, RepoError> {
        self.enter("delete_comment").await?;
        let mut state = self.state.lock().await;
        if !state.comments.contains_key(&id) {
            return Ok(0);
        }
        let doomed = state.descendants(id);
        for comment_id in &doomed {
            state.comments.remove(comment_id);
        }
        Ok(doomed.len() as u64)
    }
}

#[async_trait]
impl PostsRepo for FakeStore {
    async fn create_post(&self, params: NewPost) -> Result<PostRecord, RepoError> {
        self.enter("create_post").await?;
        let mut state = self.state.lock().await;
        let (id, at) = state.next();
        let record = PostRecord {
            id,
            title: params.title,
            content: params.content,
            author: params.author,
            created_at: at,
            updated_at: at,
            comments_count: 0,
        };
        state.posts.insert(id, record.clone());
        Ok(record)
    }

    async fn post_exists(&self, id: i64) -> Result<bool, RepoError> {
        self.enter("post_exists").await?;
        Ok(self.state.lock().await.posts.contains_key(&id))
    }

    async fn get_post(&self, id: i64) -> Result<PostRecord, RepoError> {
        self.enter("get_post").await?;
        self.state
            .lock()
            .await
            .posts
            .get(&id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn list_posts(&self, query: &PostListQuery) -> Result<PageSlice<PostRecord>, RepoError> {
        self.enter("list_posts").await?;
        let state = self.state.lock().await;
        let needle = query.search.trim().to_lowercase();

        let mut matching: Vec<PostRecord> = state
            .posts
            .values()
            .filter(|post| {
                needle.is_empty()
                    || post.title.to_lowercase().contains(&needle)
                    || post.content.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| compare_posts(a, b, query.sort_by));
        if query.sort_dir == SortDirection::Desc {
            matching.reverse();
        }

        let total = matching.len() as u64;
        let items = window(matching, query.page.offset(), query.page.page_size());
        Ok(PageSlice::new(items, total))
    }

    async fn delete_post(&self, id: i64) -> Result<u64, RepoError> {
        self.enter("delete_post").await?;
        let mut state = self.state.lock().await;
        if state.posts.remove(&id).is_none() {
            return Ok(0);
        }
        state.comments.retain(|_, comment| comment.post_id != id);
        Ok(1)
    }

    async fn count_comments(&self, post_id: i64) -> Result<u64, RepoError> {
        self.enter("count_comments").await?;
        let state = self.state.lock().await;
        Ok(state
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id)
            .count() as u64)
    }
}

#[async_trait]
impl StoreHealth for FakeStore {
    async fn ping(&self) -> Result<(), RepoError> {
        self.enter("ping").await
    }
}

/// Cache backend whose every operation fails in transport.
pub struct FailingCache;

#[async_trait]
impl CacheBackend for FailingCache {
    async fn get(&self, _key: &str) -> Result<String, CacheError> {
        Err(CacheError::Transport("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Transport("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Transport("connection refused".into()))
    }
}

/// Memory cache whose writes and deletes take `delay` to land.
pub struct SlowCache {
    inner: MemoryCache,
    delay: Duration,
}

impl SlowCache {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryCache::new(NonZeroUsize::new(1_024).unwrap_or(NonZeroUsize::MIN)),
            delay,
        })
    }
}

#[async_trait]
impl CacheBackend for SlowCache {
    async fn get(&self, key: &str) -> Result<String, CacheError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        tokio::time::sleep(self.delay).await;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete(key).await
    }
}

pub fn memory_backend() -> Arc<dyn CacheBackend> {
    Arc::new(MemoryCache::new(
        NonZeroUsize::new(1_024).unwrap_or(NonZeroUsize::MIN),
    ))
}

pub struct Harness {
    pub store: Arc<FakeStore>,
    pub comments: CommentService,
    pub posts: PostService,
}

impl Harness {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        let store = FakeStore::new();
        let config = CacheConfig::default();
        let comment_cache = CommentCache::new(backend.clone(), &config);
        let post_cache = PostCache::new(backend, &config);

        let comments_repo: Arc<dyn CommentsRepo> = store.clone();
        let posts_repo: Arc<dyn PostsRepo> = store.clone();

        Self {
            comments: CommentService::new(
                comments_repo,
                comment_cache.clone(),
                config.detached_timeout,
            ),
            posts: PostService::new(
                posts_repo,
                post_cache,
                comment_cache,
                config.detached_timeout,
            ),
            store,
        }
    }

    pub fn with_memory_cache() -> Self {
        Self::new(memory_backend())
    }

    pub fn api_state(&self) -> ApiState {
        let health: Arc<dyn StoreHealth> = self.store.clone();
        ApiState {
            comments: Arc::new(self.comments.clone()),
            posts: Arc::new(self.posts.clone()),
            health,
            request_timeout: Duration::from_secs(5),
        }
    }

    pub async fn post(&self, title: &str) -> PostRecord {
        self.posts
            .create_post(NewPost {
                title: title.to_string(),
                content: format!("{title} body"),
                author: "writer".to_string(),
            })
            .await
            .expect("create post")
    }

    pub async fn comment(&self, post_id: i64, parent_id: Option<i64>, content: &str) -> CommentRecord {
        self.comments
            .create_comment(NewComment {
                post_id,
                parent_id,
                content: content.to_string(),
                author: "reader".to_string(),
            })
            .await
            .expect("create comment")
    }
}

/// Let detached cache write-backs land.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
