//! Database repositories
//!
//! One repository per aggregate. Each exposes an `#[async_trait]` trait used
//! by the services and a `Sqlx*` implementation over the SQLite pool.

pub mod comment;
pub mod post;
pub mod report;
pub mod tag;
pub mod token;
pub mod user;

pub use comment::{CommentRepository, SqlxCommentRepository, Thread};
pub use post::{PostRepository, SqlxPostRepository};
pub use report::{ReportRepository, SqlxReportRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use token::{SqlxTokenBlacklistRepository, TokenBlacklistRepository};
pub use user::{SqlxUserRepository, UserRepository};
