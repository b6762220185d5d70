//! Report repository
//!
//! Each reported post or comment has one report row holding a denormalized
//! `total_reports` counter plus the set of users who reported it. The
//! counter only moves when a user reports an object for the first time.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Report repository trait
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Record a report on a post; `false` when this user already reported it
    async fn report_post(&self, post_id: i64, user_id: i64) -> Result<bool>;

    /// Record a report on a comment; `false` when this user already reported it
    async fn report_comment(&self, comment_id: i64, user_id: i64) -> Result<bool>;
}

/// Table layout shared by post and comment reports
struct ReportTables {
    reports: &'static str,
    reporters: &'static str,
    target_column: &'static str,
}

const POST_REPORTS: ReportTables = ReportTables {
    reports: "post_reports",
    reporters: "post_report_users",
    target_column: "post_id",
};

const COMMENT_REPORTS: ReportTables = ReportTables {
    reports: "comment_reports",
    reporters: "comment_report_users",
    target_column: "comment_id",
};

/// SQLx-based report repository implementation
pub struct SqlxReportRepository {
    pool: SqlitePool,
}

impl SqlxReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: SqlitePool) -> Arc<dyn ReportRepository> {
        Arc::new(Self::new(pool))
    }

    async fn record(&self, tables: &ReportTables, target_id: i64, user_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT OR IGNORE INTO {} ({}, total_reports) VALUES (?, 0)",
            tables.reports, tables.target_column
        ))
        .bind(target_id)
        .execute(&mut *tx)
        .await
        .context("Failed to open report")?;

        let report_id: i64 = sqlx::query_scalar(&format!(
            "SELECT id FROM {} WHERE {} = ?",
            tables.reports, tables.target_column
        ))
        .bind(target_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to load report")?;

        let inserted = sqlx::query(&format!(
            "INSERT OR IGNORE INTO {} (report_id, user_id) VALUES (?, ?)",
            tables.reporters
        ))
        .bind(report_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to record reporter")?
        .rows_affected()
            == 1;

        if inserted {
            sqlx::query(&format!(
                "UPDATE {} SET total_reports = total_reports + 1 WHERE id = ?",
                tables.reports
            ))
            .bind(report_id)
            .execute(&mut *tx)
            .await
            .context("Failed to increment report counter")?;
        }

        tx.commit().await?;
        Ok(inserted)
    }
}

#[async_trait]
impl ReportRepository for SqlxReportRepository {
    async fn report_post(&self, post_id: i64, user_id: i64) -> Result<bool> {
        self.record(&POST_REPORTS, post_id, user_id).await
    }

    async fn report_comment(&self, comment_id: i64, user_id: i64) -> Result<bool> {
        self.record(&COMMENT_REPORTS, comment_id, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Utc;

    async fn setup() -> (SqlitePool, SqlxReportRepository, i64, i64, i64) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let now = Utc::now();

        let mut users = Vec::new();
        for name in ["a", "b"] {
            let id = sqlx::query(
                "INSERT INTO users (username, email, password_hash, created_at, updated_at) \
                 VALUES (?, ?, 'h', ?, ?)",
            )
            .bind(name)
            .bind(format!("{}@example.com", name))
            .bind(now)
            .bind(now)
            .execute(&pool)
            .await
            .unwrap()
            .last_insert_rowid();
            users.push(id);
        }

        let post = sqlx::query(
            "INSERT INTO posts (title, slug, content, author_id, status, created_at, updated_at) \
             VALUES ('t', 's', 'c', ?, 'published', ?, ?)",
        )
        .bind(users[0])
        .bind(now)
        .bind(now)
        .execute(&pool)
        .await
        .unwrap()
        .last_insert_rowid();

        (pool.clone(), SqlxReportRepository::new(pool), users[0], users[1], post)
    }

    async fn report_total(pool: &SqlitePool, table: &str, column: &str, id: i64) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!(
            "SELECT total_reports FROM {} WHERE {} = ?",
            table, column
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .unwrap()
        .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_post_report_counts_each_user_once() {
        let (pool, repo, a, b, post) = setup().await;

        assert_eq!(report_total(&pool, "post_reports", "post_id", post).await, 0);
        assert!(repo.report_post(post, a).await.unwrap());
        assert!(!repo.report_post(post, a).await.unwrap());
        assert_eq!(report_total(&pool, "post_reports", "post_id", post).await, 1);

        assert!(repo.report_post(post, b).await.unwrap());
        assert_eq!(report_total(&pool, "post_reports", "post_id", post).await, 2);
    }

    #[tokio::test]
    async fn test_comment_report_counts_each_user_once() {
        let (pool, repo, a, _b, post) = setup().await;
        let now = Utc::now();
        let comment = sqlx::query(
            "INSERT INTO comments (post_id, author_id, body, created_at, updated_at) \
             VALUES (?, ?, 'x', ?, ?)",
        )
        .bind(post)
        .bind(a)
        .bind(now)
        .bind(now)
        .execute(&pool)
        .await
        .unwrap()
        .last_insert_rowid();

        assert!(repo.report_comment(comment, a).await.unwrap());
        assert!(!repo.report_comment(comment, a).await.unwrap());
        assert_eq!(report_total(&pool, "comment_reports", "comment_id", comment).await, 1);
        assert_eq!(report_total(&pool, "post_reports", "post_id", post).await, 0);
    }
}
