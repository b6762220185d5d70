//! Data models
//!
//! Entities stored in the database, the input types accepted by services,
//! and pagination helpers.

mod comment;
mod pagination;
mod post;
mod tag;
mod user;

pub use comment::{Comment, CommentStatus, CreateCommentInput, NewComment, UpdateCommentInput};
pub use pagination::{total_pages, ListParams, PagedResult, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use post::{CreatePostInput, NewPost, Post, PostChanges, PostStatus, UpdatePostInput};
pub use tag::{Tag, MAX_TAGLINE_LEN};
pub use user::{RegisterInput, UpdateProfileInput, User};
