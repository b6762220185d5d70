//! Post repository
//!
//! Posts are always read joined with their author's username. Inserts and
//! updates report a slug collision as `Ok(None)` so that the caller can pick
//! another slug and retry; the unique index on `posts.slug` is the only
//! arbiter of slug ownership.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use std::sync::Arc;

use crate::db::is_unique_violation;
use crate::models::{ListParams, NewPost, Post, PostChanges, PostStatus};

const POST_SELECT: &str = "SELECT p.id, p.title, p.slug, p.content, p.author_id, \
    u.username AS author_username, p.status, p.hit_count, p.created_at, p.updated_at \
    FROM posts p JOIN users u ON u.id = p.author_id";

const NEWEST_FIRST: &str = " ORDER BY p.created_at DESC, p.id DESC";

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a post; `None` when the slug is already taken
    async fn create(&self, post: &NewPost) -> Result<Option<Post>>;

    /// Overwrite a post's editable columns; `None` when the new slug is taken
    async fn update(&self, id: i64, changes: &PostChanges) -> Result<Option<Post>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Published posts, newest first. Every search term must match the title
    /// or one of the post's taglines (case-insensitive substring).
    async fn list_published(
        &self,
        search_terms: &[String],
        params: &ListParams,
    ) -> Result<(Vec<Post>, i64)>;

    /// Posts by one author, newest first
    async fn list_by_author(
        &self,
        author_id: i64,
        include_drafts: bool,
        params: &ListParams,
    ) -> Result<(Vec<Post>, i64)>;

    /// Increment the hit counter, returning the new value
    async fn increment_hits(&self, id: i64) -> Result<i64>;

    /// Flip the (post, user) like, returning whether the post is now liked
    async fn toggle_like(&self, post_id: i64, user_id: i64) -> Result<bool>;

    async fn like_count(&self, post_id: i64) -> Result<i64>;

    async fn is_liked(&self, post_id: i64, user_id: i64) -> Result<bool>;
}

/// SQLx-based post repository implementation
pub struct SqlxPostRepository {
    pool: SqlitePool,
}

impl SqlxPostRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: SqlitePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &NewPost) -> Result<Option<Post>> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO posts (title, slug, content, author_id, status, hit_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.content)
        .bind(post.author_id)
        .bind(post.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create post");

        let id = match result {
            Ok(done) => done.last_insert_rowid(),
            Err(err) if is_unique_violation(&err) => return Ok(None),
            Err(err) => return Err(err),
        };

        self.get_by_id(id).await
    }

    async fn update(&self, id: i64, changes: &PostChanges) -> Result<Option<Post>> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET title = ?, slug = ?, content = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&changes.title)
        .bind(&changes.slug)
        .bind(&changes.content)
        .bind(changes.status.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update post");

        match result {
            Ok(_) => self.get_by_id(id).await,
            Err(err) if is_unique_violation(&err) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let row = sqlx::query(&format!("{} WHERE p.id = ?", POST_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get post by ID")?;

        row.as_ref().map(row_to_post).transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let row = sqlx::query(&format!("{} WHERE p.slug = ?", POST_SELECT))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get post by slug")?;

        row.as_ref().map(row_to_post).transpose()
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete post")?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_published(
        &self,
        search_terms: &[String],
        params: &ListParams,
    ) -> Result<(Vec<Post>, i64)> {
        let mut count_query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT COUNT(*) FROM posts p WHERE p.status = 'published'",
        );
        push_search_filter(&mut count_query, search_terms);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count published posts")?;

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(POST_SELECT);
        query.push(" WHERE p.status = 'published'");
        push_search_filter(&mut query, search_terms);
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
            .context("Failed to list published posts")?;

        let posts = rows.iter().map(row_to_post).collect::<Result<Vec<_>>>()?;
        Ok((posts, total))
    }

    async fn list_by_author(
        &self,
        author_id: i64,
        include_drafts: bool,
        params: &ListParams,
    ) -> Result<(Vec<Post>, i64)> {
        let status_filter = if include_drafts {
            ""
        } else {
            " AND p.status = 'published'"
        };

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM posts p WHERE p.author_id = ?{}",
            status_filter
        ))
        .bind(author_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count posts by author")?;

        let rows = sqlx::query(&format!(
            "{} WHERE p.author_id = ?{}{} LIMIT ? OFFSET ?",
            POST_SELECT, status_filter, NEWEST_FIRST
        ))
        .bind(author_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list posts by author")?;

        let posts = rows.iter().map(row_to_post).collect::<Result<Vec<_>>>()?;
        Ok((posts, total))
    }

    async fn increment_hits(&self, id: i64) -> Result<i64> {
        let hits: i64 =
            sqlx::query_scalar("UPDATE posts SET hit_count = hit_count + 1 WHERE id = ? RETURNING hit_count")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .context("Failed to increment hit count")?;
        Ok(hits)
    }

    async fn toggle_like(&self, post_id: i64, user_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM post_likes WHERE post_id = ? AND user_id = ?")
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("Failed to remove post like")?
            .rows_affected();

        let liked = if removed == 0 {
            sqlx::query("INSERT INTO post_likes (post_id, user_id) VALUES (?, ?)")
                .bind(post_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .context("Failed to add post like")?;
            true
        } else {
            false
        };

        tx.commit().await?;
        Ok(liked)
    }

    async fn like_count(&self, post_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM post_likes WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count post likes")?;
        Ok(count)
    }

    async fn is_liked(&self, post_id: i64, user_id: i64) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM post_likes WHERE post_id = ? AND user_id = ?")
                .bind(post_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to check post like")?;
        Ok(found.is_some())
    }
}

/// Escape LIKE wildcards so that search terms match literally
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_search_filter(query: &mut QueryBuilder<'_, Sqlite>, search_terms: &[String]) {
    for term in search_terms {
        let pattern = like_pattern(term);
        query
            .push(" AND (p.title LIKE ")
            .push_bind(pattern.clone())
            .push(
                " ESCAPE '\\' OR EXISTS (SELECT 1 FROM post_tags pt JOIN tags t ON t.id = pt.tag_id \
                 WHERE pt.post_id = p.id AND t.tagline LIKE ",
            )
            .push_bind(pattern)
            .push(" ESCAPE '\\'))");
    }
}

fn row_to_post(row: &SqliteRow) -> Result<Post> {
    let status_str: String = row.get("status");
    let status = PostStatus::from_str(&status_str)
        .with_context(|| format!("Invalid post status in database: {}", status_str))?;

    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        content: row.get("content"),
        author_id: row.get("author_id"),
        author_username: row.get("author_username"),
        status,
        hit_count: row.get("hit_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
