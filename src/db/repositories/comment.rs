//! Comment repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

use crate::models::{Comment, CommentStatus, ListParams, NewComment};

const COMMENT_SELECT: &str = "SELECT c.id, c.post_id, cp.slug AS post_slug, c.author_id, u.username AS author_username, \
    c.parent_id, c.body, c.status, c.created_at, c.updated_at, \
    (SELECT COUNT(*) FROM comment_likes cl WHERE cl.comment_id = c.id) AS like_count, \
    (SELECT COUNT(*) FROM comments r WHERE r.parent_id = c.id AND r.status = 'published') AS reply_count \
    FROM comments c JOIN users u ON u.id = c.author_id JOIN posts cp ON cp.id = c.post_id";

const NEWEST_FIRST: &str = " ORDER BY c.created_at DESC, c.id DESC";

/// Which comments of a post to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Thread {
    /// Comments without a parent
    TopLevel,
    /// Replies to the given comment
    RepliesTo(i64),
}

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, comment: &NewComment) -> Result<Comment>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    async fn update(&self, id: i64, body: &str, status: CommentStatus) -> Result<Option<Comment>>;

    /// Comments of a post, newest first. Published comments are always
    /// included; drafts only when written by `viewer_id`.
    async fn list_for_post(
        &self,
        post_id: i64,
        thread: Thread,
        viewer_id: Option<i64>,
        params: &ListParams,
    ) -> Result<(Vec<Comment>, i64)>;

    /// Comments written by one author, newest first. With `public_only`
    /// only published comments on published posts are returned; otherwise
    /// drafts are included but comments on someone else's draft post are not.
    async fn list_by_author(
        &self,
        author_id: i64,
        public_only: bool,
        params: &ListParams,
    ) -> Result<(Vec<Comment>, i64)>;

    /// Flip the (comment, user) like, returning whether it is now liked
    async fn toggle_like(&self, comment_id: i64, user_id: i64) -> Result<bool>;
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    pool: SqlitePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: SqlitePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, comment: &NewComment) -> Result<Comment> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO comments (post_id, author_id, parent_id, body, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(comment.parent_id)
        .bind(&comment.body)
        .bind(comment.status.to_string())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create comment")?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .with_context(|| format!("Comment {} vanished after insert", id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let row = sqlx::query(&format!("{} WHERE c.id = ?", COMMENT_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get comment by ID")?;

        row.as_ref().map(row_to_comment).transpose()
    }

    async fn update(&self, id: i64, body: &str, status: CommentStatus) -> Result<Option<Comment>> {
        let result = sqlx::query("UPDATE comments SET body = ?, status = ?, updated_at = ? WHERE id = ?")
            .bind(body)
            .bind(status.to_string())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update comment")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn list_for_post(
        &self,
        post_id: i64,
        thread: Thread,
        viewer_id: Option<i64>,
        params: &ListParams,
    ) -> Result<(Vec<Comment>, i64)> {
        let mut count_query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM comments c");
        push_thread_filter(&mut count_query, post_id, thread, viewer_id);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count comments")?;

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(COMMENT_SELECT);
        push_thread_filter(&mut query, post_id, thread, viewer_id);
        query
            .push(NEWEST_FIRST)
            .push(" LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list comments")?;

        let comments = rows.iter().map(row_to_comment).collect::<Result<Vec<_>>>()?;
        Ok((comments, total))
    }

    async fn list_by_author(
        &self,
        author_id: i64,
        public_only: bool,
        params: &ListParams,
    ) -> Result<(Vec<Comment>, i64)> {
        let visibility = if public_only {
            " AND c.status = 'published' \
              AND EXISTS (SELECT 1 FROM posts p WHERE p.id = c.post_id AND p.status = 'published')"
        } else {
            " AND EXISTS (SELECT 1 FROM posts p WHERE p.id = c.post_id \
              AND (p.status = 'published' OR p.author_id = c.author_id))"
        };

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM comments c WHERE c.author_id = ?{}",
            visibility
        ))
        .bind(author_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count comments by author")?;

        let rows = sqlx::query(&format!(
            "{} WHERE c.author_id = ?{}{} LIMIT ? OFFSET ?",
            COMMENT_SELECT, visibility, NEWEST_FIRST
        ))
        .bind(author_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list comments by author")?;

        let comments = rows.iter().map(row_to_comment).collect::<Result<Vec<_>>>()?;
        Ok((comments, total))
    }

    async fn toggle_like(&self, comment_id: i64, user_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM comment_likes WHERE comment_id = ? AND user_id = ?")
            .bind(comment_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("Failed to remove comment like")?
            .rows_affected();

        let liked = removed == 0;
        if liked {
            sqlx::query("INSERT INTO comment_likes (comment_id, user_id) VALUES (?, ?)")
                .bind(comment_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .context("Failed to add comment like")?;
        }

        tx.commit().await?;
        Ok(liked)
    }
}

fn push_thread_filter(
    query: &mut QueryBuilder<'_, Sqlite>,
    post_id: i64,
    thread: Thread,
    viewer_id: Option<i64>,
) {
    query.push(" WHERE c.post_id = ").push_bind(post_id);
    match thread {
        Thread::TopLevel => {
            query.push(" AND c.parent_id IS NULL");
        }
        Thread::RepliesTo(parent_id) => {
            query.push(" AND c.parent_id = ").push_bind(parent_id);
        }
    }
    query
        .push(" AND (c.status = 'published' OR c.author_id = ")
        .push_bind(viewer_id)
        .push(")");
}

fn row_to_comment(row: &SqliteRow) -> Result<Comment> {
    let status_str: String = row.get("status");
    let status = CommentStatus::from_str(&status_str).map_err(anyhow::Error::msg)?;

    Ok(Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        post_slug: row.get("post_slug"),
        author_id: row.get("author_id"),
        author_username: row.get("author_username"),
        parent_id: row.get("parent_id"),
        body: row.get("body"),
        status,
        like_count: row.get("like_count"),
        reply_count: row.get("reply_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
