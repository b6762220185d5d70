//! Refresh-token blacklist repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Token blacklist repository trait
#[async_trait]
pub trait TokenBlacklistRepository: Send + Sync {
    /// Blacklist a token id; `false` when it was already blacklisted
    async fn blacklist(&self, jti: &str, user_id: i64, expires_at: DateTime<Utc>) -> Result<bool>;

    /// Drop entries whose token has expired anyway
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// SQLx-based token blacklist implementation
pub struct SqlxTokenBlacklistRepository {
    pool: SqlitePool,
}

impl SqlxTokenBlacklistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: SqlitePool) -> Arc<dyn TokenBlacklistRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TokenBlacklistRepository for SqlxTokenBlacklistRepository {
    async fn blacklist(&self, jti: &str, user_id: i64, expires_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO token_blacklist (jti, user_id, expires_at, blacklisted_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(jti)
        .bind(user_id)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to blacklist token")?;

        Ok(result.rows_affected() == 1)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM token_blacklist WHERE expires_at < ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .context("Failed to purge token blacklist")?;
        Ok(result.rows_affected())
    }
}
