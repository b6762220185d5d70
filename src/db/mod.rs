//! Database layer
//!
//! SQLite pool construction, embedded migrations and the repositories that
//! services use for data access.
//!
//! ```ignore
//! let pool = quillpost::db::create_pool(&config.database).await?;
//! quillpost::db::migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, ping};

/// True when `err` is a unique-constraint violation raised by the database.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    })
}
