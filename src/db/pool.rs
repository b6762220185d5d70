//! SQLite connection pool
//!
//! The pool is created from `DatabaseConfig::url`, which may be a bare file
//! path, a `sqlite:` URL, or `:memory:`. Foreign keys are enforced on every
//! connection so that cascade deletes behave.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;

const MAX_CONNECTIONS: u32 = 20;

/// Create a connection pool for the configured database.
///
/// Parent directories of a file-backed database are created on demand.
pub async fn create_pool(config: &DatabaseConfig) -> Result<SqlitePool> {
    let url = config.url.as_str();
    if is_memory_url(url) {
        return memory_pool().await;
    }

    let path = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:")).unwrap_or(url);
    let path = path.split('?').next().unwrap_or(path);
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to SQLite database: {}", url))
}

/// Create an in-memory database pool for tests.
pub async fn create_test_pool() -> Result<SqlitePool> {
    memory_pool().await
}

/// Check that the database answers queries.
pub async fn ping(pool: &SqlitePool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Database ping failed")?;
    Ok(())
}

fn is_memory_url(url: &str) -> bool {
    url == ":memory:" || url.starts_with("sqlite::memory:")
}

// A single long-lived connection keeps the in-memory database alive and
// shared by every query.
async fn memory_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .context("Invalid in-memory SQLite URL")?
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .context("Failed to open in-memory SQLite database")
}
