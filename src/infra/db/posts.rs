use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::application::pagination::PageSlice;
use crate::application::repos::{PostListQuery, PostsRepo, RepoError};
use crate::domain::entities::{NewPost, PostRecord};
use crate::domain::types::PostSortField;

use super::PostgresRepositories;
use super::retry::with_retry;
use super::util::{contains_pattern, convert_count, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    title: String,
    content: String,
    author: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            content: row.content,
            author: row.author,
            created_at: row.created_at,
            updated_at: row.updated_at,
            comments_count: 0,
        }
    }
}

fn sort_column(field: PostSortField) -> &'static str {
    match field {
        PostSortField::Id => "id",
        PostSortField::CreatedAt => "created_at",
        PostSortField::Title => "title",
    }
}

impl PostgresRepositories {
    fn push_post_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, query: &PostListQuery) {
        qb.push(" WHERE 1=1");
        if query.has_search() {
            let pattern = contains_pattern(query.search.trim());
            qb.push(" AND (title ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\' OR content ILIKE ");
            qb.push_bind(pattern);
            qb.push(" ESCAPE '\\')");
        }
    }

    async fn insert_post(&self, params: &NewPost) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO posts (title, content, author)
            VALUES ($1, $2, $3)
            RETURNING id, title, content, author, created_at, updated_at
            "#,
        )
        .bind(&params.title)
        .bind(&params.content)
        .bind(&params.author)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn select_post_exists(&self, id: i64) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM posts WHERE id = $1)")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn select_post(&self, id: i64) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, title, content, author, created_at, updated_at
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(PostRecord::from).ok_or(RepoError::NotFound)
    }

    async fn select_post_page(
        &self,
        query: &PostListQuery,
    ) -> Result<PageSlice<PostRecord>, RepoError> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM posts");
        Self::push_post_filter(&mut count_qb, query);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::new(
            "SELECT id, title, content, author, created_at, updated_at FROM posts",
        );
        Self::push_post_filter(&mut qb, query);
        let direction = query.sort_dir.as_sql();
        qb.push(format!(
            " ORDER BY {column} {direction}, id {direction}",
            column = sort_column(query.sort_by),
        ));
        qb.push(" LIMIT ");
        qb.push_bind(query.page.page_size());
        qb.push(" OFFSET ");
        qb.push_bind(query.page.offset());

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(PageSlice::new(
            rows.into_iter().map(PostRecord::from).collect(),
            convert_count(total)?,
        ))
    }

    async fn delete_post_row(&self, id: i64) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn count_post_comments(&self, post_id: i64) -> Result<u64, RepoError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        convert_count(count)
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn create_post(&self, params: NewPost) -> Result<PostRecord, RepoError> {
        let policy = self.retry_policy().single_attempt();
        with_retry(&policy, "create_post", || self.insert_post(&params)).await
    }

    async fn post_exists(&self, id: i64) -> Result<bool, RepoError> {
        with_retry(self.retry_policy(), "post_exists", || self.select_post_exists(id)).await
    }

    async fn get_post(&self, id: i64) -> Result<PostRecord, RepoError> {
        with_retry(self.retry_policy(), "get_post", || self.select_post(id)).await
    }

    async fn list_posts(&self, query: &PostListQuery) -> Result<PageSlice<PostRecord>, RepoError> {
        with_retry(self.retry_policy(), "list_posts", || self.select_post_page(query)).await
    }

    async fn delete_post(&self, id: i64) -> Result<u64, RepoError> {
        with_retry(self.retry_policy(), "delete_post", || self.delete_post_row(id)).await
    }

    async fn count_comments(&self, post_id: i64) -> Result<u64, RepoError> {
        with_retry(self.retry_policy(), "count_comments", || {
            self.count_post_comments(post_id)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_covers_title_and_content() {
        let query = PostListQuery {
            search: "rust".into(),
            ..PostListQuery::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts");
        PostgresRepositories::push_post_filter(&mut qb, &query);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM posts WHERE 1=1 AND (title ILIKE $1 ESCAPE '\\' OR content ILIKE $2 ESCAPE '\\')"
        );
    }

    #[test]
    fn sort_columns_are_whitelisted() {
        assert_eq!(sort_column(PostSortField::Id), "id");
        assert_eq!(sort_column(PostSortField::CreatedAt), "created_at");
        assert_eq!(sort_column(PostSortField::Title), "title");
    }
}
