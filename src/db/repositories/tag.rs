//! Tag repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::Tag;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Fetch the tag with this tagline, creating it if needed
    async fn get_or_create(&self, tagline: &str) -> Result<Tag>;

    /// Tags of one post, ordered by tagline
    async fn get_by_post(&self, post_id: i64) -> Result<Vec<Tag>>;

    /// Tags of many posts keyed by post id
    async fn get_by_posts(&self, post_ids: &[i64]) -> Result<HashMap<i64, Vec<Tag>>>;

    async fn attach(&self, post_id: i64, tag_id: i64) -> Result<()>;

    async fn detach(&self, post_id: i64, tag_id: i64) -> Result<()>;
}

/// SQLx-based tag repository implementation
pub struct SqlxTagRepository {
    pool: SqlitePool,
}

impl SqlxTagRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: SqlitePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn get_or_create(&self, tagline: &str) -> Result<Tag> {
        sqlx::query("INSERT OR IGNORE INTO tags (tagline) VALUES (?)")
            .bind(tagline)
            .execute(&self.pool)
            .await
            .context("Failed to create tag")?;

        let row = sqlx::query("SELECT id, tagline FROM tags WHERE tagline = ?")
            .bind(tagline)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to load tag '{}'", tagline))?;

        Ok(Tag {
            id: row.get("id"),
            tagline: row.get("tagline"),
        })
    }

    async fn get_by_post(&self, post_id: i64) -> Result<Vec<Tag>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.tagline
            FROM tags t
            JOIN post_tags pt ON pt.tag_id = t.id
            WHERE pt.post_id = ?
            ORDER BY t.tagline
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to get tags by post")?;

        Ok(rows
            .iter()
            .map(|row| Tag {
                id: row.get("id"),
                tagline: row.get("tagline"),
            })
            .collect())
    }

    async fn get_by_posts(&self, post_ids: &[i64]) -> Result<HashMap<i64, Vec<Tag>>> {
        let mut by_post: HashMap<i64, Vec<Tag>> = HashMap::new();
        if post_ids.is_empty() {
            return Ok(by_post);
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT pt.post_id, t.id, t.tagline FROM tags t \
             JOIN post_tags pt ON pt.tag_id = t.id WHERE pt.post_id IN (",
        );
        let mut ids = query.separated(", ");
        for id in post_ids {
            ids.push_bind(*id);
        }
        query.push(") ORDER BY t.tagline");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to get tags by posts")?;

        for row in rows {
            by_post.entry(row.get("post_id")).or_default().push(Tag {
                id: row.get("id"),
                tagline: row.get("tagline"),
            });
        }
        Ok(by_post)
    }

    async fn attach(&self, post_id: i64, tag_id: i64) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await
            .context("Failed to attach tag")?;
        Ok(())
    }

    async fn detach(&self, post_id: i64, tag_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM post_tags WHERE post_id = ? AND tag_id = ?")
            .bind(post_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await
            .context("Failed to detach tag")?;
        Ok(())
    }
}
