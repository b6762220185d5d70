//! User repository
//!
//! - `UserRepository` defines account data access
//! - `SqlxUserRepository` implements it on SQLite

use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user, returning it with its assigned id
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Email lookup is case-insensitive
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn update_profile(&self, id: i64, bio: &str, email: &str) -> Result<()>;

    async fn set_active(&self, id: i64, active: bool) -> Result<()>;

    async fn set_password(&self, id: i64, password_hash: &str) -> Result<()>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: SqlitePool,
}

impl SqlxUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: SqlitePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_one_where(&self, clause: &str, value: &str) -> Result<Option<User>> {
        let sql = format!(
            "SELECT id, username, email, password_hash, bio, is_active, created_at, updated_at \
             FROM users WHERE {}",
            clause
        );
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to get user where {}", clause))?;

        Ok(row.as_ref().map(row_to_user))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, bio, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.bio)
        .bind(user.is_active)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create user")?;

        Ok(User {
            id: result.last_insert_rowid(),
            created_at: now,
            updated_at: now,
            ..user.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, password_hash, bio, is_active, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get user by ID")?;

        Ok(row.as_ref().map(row_to_user))
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        self.fetch_one_where("username = ?", username).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        self.fetch_one_where("email = ? COLLATE NOCASE", email).await
    }

    async fn update_profile(&self, id: i64, bio: &str, email: &str) -> Result<()> {
        sqlx::query("UPDATE users SET bio = ?, email = ?, updated_at = ? WHERE id = ?")
            .bind(bio)
            .bind(email)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update user profile")?;
        Ok(())
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<()> {
        sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update user activation")?;
        Ok(())
    }

    async fn set_password(&self, id: i64, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update user password")?;
        Ok(())
    }
}

fn row_to_user(row: &SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        bio: row.get("bio"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
