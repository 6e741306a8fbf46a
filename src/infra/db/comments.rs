use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::application::pagination::PageSlice;
use crate::application::repos::{CommentPageQuery, CommentsRepo, RepoError};
use crate::domain::entities::{CommentRecord, NewComment};
use crate::domain::types::CommentSortField;

use super::PostgresRepositories;
use super::retry::with_retry;
use super::util::{contains_pattern, convert_count, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    post_id: i64,
    parent_id: Option<i64>,
    content: String,
    author: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            parent_id: row.parent_id,
            content: row.content,
            author: row.author,
            created_at: row.created_at,
            updated_at: row.updated_at,
            children: Vec::new(),
        }
    }
}

const SELECT_SUBTREE: &str = r#"
    WITH RECURSIVE subtree AS (
        SELECT id, post_id, parent_id, content, author, created_at, updated_at
        FROM comments
        WHERE id = $1 AND post_id = $2
        UNION
        SELECT c.id, c.post_id, c.parent_id, c.content, c.author, c.created_at, c.updated_at
        FROM comments c
        INNER JOIN subtree s ON c.parent_id = s.id
    )
    SELECT id, post_id, parent_id, content, author, created_at, updated_at
    FROM subtree
    ORDER BY created_at ASC, id ASC
"#;

const SELECT_ANCESTORS: &str = r#"
    WITH RECURSIVE chain AS (
        SELECT id, parent_id FROM comments WHERE id = $1
        UNION
        SELECT c.id, c.parent_id FROM comments c INNER JOIN chain ch ON c.id = ch.parent_id
    )
    SELECT id FROM chain
"#;

const DELETE_SUBTREE: &str = r#"
    WITH RECURSIVE doomed AS (
        SELECT id FROM comments WHERE id = $1
        UNION
        SELECT c.id FROM comments c INNER JOIN doomed d ON c.parent_id = d.id
    )
    DELETE FROM comments WHERE id IN (SELECT id FROM doomed)
"#;

fn sort_column(field: CommentSortField) -> &'static str {
    match field {
        CommentSortField::Id => "id",
        CommentSortField::CreatedAt => "created_at",
        CommentSortField::UpdatedAt => "updated_at",
    }
}

impl PostgresRepositories {
    /// Predicate shared by the page and count queries.
    fn push_comment_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, query: &CommentPageQuery) {
        qb.push(" WHERE post_id = ");
        qb.push_bind(query.post_id);
        match query.parent_id {
            Some(parent_id) => {
                qb.push(" AND parent_id = ");
                qb.push_bind(parent_id);
            }
            None => {
                qb.push(" AND parent_id IS NULL");
            }
        }
        if query.has_search() {
            qb.push(" AND content ILIKE ");
            qb.push_bind(contains_pattern(query.search.trim()));
            qb.push(" ESCAPE '\\'");
        }
    }

    async fn insert_comment(&self, params: &NewComment) -> Result<CommentRecord, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            INSERT INTO comments (post_id, parent_id, content, author)
            VALUES ($1, $2, $3, $4)
            RETURNING id, post_id, parent_id, content, author, created_at, updated_at
            "#,
        )
        .bind(params.post_id)
        .bind(params.parent_id)
        .bind(&params.content)
        .bind(&params.author)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn select_comment_exists(&self, id: i64) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM comments WHERE id = $1)")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn select_comment(&self, id: i64) -> Result<CommentRecord, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, post_id, parent_id, content, author, created_at, updated_at
            FROM comments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(CommentRecord::from).ok_or(RepoError::NotFound)
    }

    async fn select_comment_tree(
        &self,
        post_id: i64,
        root_id: i64,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        let rows = sqlx::query_as::<_, CommentRow>(SELECT_SUBTREE)
            .bind(root_id)
            .bind(post_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CommentRecord::from).collect())
    }

    async fn select_comment_ancestors(&self, id: i64) -> Result<Vec<i64>, RepoError> {
        sqlx::query_scalar::<_, i64>(SELECT_ANCESTORS)
            .bind(id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn select_comment_page(
        &self,
        query: &CommentPageQuery,
    ) -> Result<PageSlice<CommentRecord>, RepoError> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM comments");
        Self::push_comment_filter(&mut count_qb, query);
        let total: i64 = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::new(
            "SELECT id, post_id, parent_id, content, author, created_at, updated_at FROM comments",
        );
        Self::push_comment_filter(&mut qb, query);
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
            .build_query_as::<CommentRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(PageSlice::new(
            rows.into_iter().map(CommentRecord::from).collect(),
            convert_count(total)?,
        ))
    }

    async fn delete_comment_subtree(&self, id: i64) -> Result<u64, RepoError> {
        let result = sqlx::query(DELETE_SUBTREE)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn create_comment(&self, params: NewComment) -> Result<CommentRecord, RepoError> {
        let policy = self.retry_policy().single_attempt();
        with_retry(&policy, "create_comment", || self.insert_comment(&params)).await
    }

    async fn comment_exists(&self, id: i64) -> Result<bool, RepoError> {
        with_retry(self.retry_policy(), "comment_exists", || {
            self.select_comment_exists(id)
        })
        .await
    }

    async fn get_comment(&self, id: i64) -> Result<CommentRecord, RepoError> {
        with_retry(self.retry_policy(), "get_comment", || self.select_comment(id)).await
    }

    async fn get_comment_tree(
        &self,
        post_id: i64,
        root_id: i64,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        with_retry(self.retry_policy(), "get_comment_tree", || {
            self.select_comment_tree(post_id, root_id)
        })
        .await
    }

    async fn get_comment_ancestors(&self, id: i64) -> Result<Vec<i64>, RepoError> {
        with_retry(self.retry_policy(), "get_comment_ancestors", || {
            self.select_comment_ancestors(id)
        })
        .await
    }

    async fn get_comment_page(
        &self,
        query: &CommentPageQuery,
    ) -> Result<PageSlice<CommentRecord>, RepoError> {
        with_retry(self.retry_policy(), "get_comment_page", || {
            self.select_comment_page(query)
        })
        .await
    }

    async fn delete_comment(&self, id: i64) -> Result<u64, RepoError> {
        with_retry(self.retry_policy(), "delete_comment", || {
            self.delete_comment_subtree(id)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pagination::PageParams;

    #[test]
    fn page_filter_scopes_by_parent_and_search() {
        let mut query = CommentPageQuery::top_level(3, PageParams::default());
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM comments");
        PostgresRepositories::push_comment_filter(&mut qb, &query);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM comments WHERE post_id = $1 AND parent_id IS NULL"
        );

        query.parent_id = Some(9);
        query.search = "needle".into();
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM comments");
        PostgresRepositories::push_comment_filter(&mut qb, &query);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM comments WHERE post_id = $1 AND parent_id = $2 AND content ILIKE $3 ESCAPE '\\'"
        );
    }

    #[test]
    fn sort_columns_are_whitelisted() {
        assert_eq!(sort_column(CommentSortField::Id), "id");
        assert_eq!(sort_column(CommentSortField::CreatedAt), "created_at");
        assert_eq!(sort_column(CommentSortField::UpdatedAt), "updated_at");
    }
}
