//! Comment service
//!
//! Comments hang off published posts and may be threaded one level deep: a
//! reply must point at a top-level comment of the same post. Drafts are
//! visible to their author only.

use crate::db::repositories::{CommentRepository, PostRepository, ReportRepository, Thread};
use crate::models::{
    Comment, CreateCommentInput, ListParams, NewComment, PagedResult, Post, UpdateCommentInput,
    User,
};
use crate::services::{required_text, FieldErrors};
use anyhow::anyhow;
use std::sync::Arc;

/// Longest accepted comment body, in characters
pub const MAX_COMMENT_LEN: usize = 5000;

/// Error types for comment service operations
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    /// Post or comment does not exist or is not visible to the requester
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Requester is not the author
    #[error("You do not have permission to modify this comment")]
    Forbidden,

    #[error("Validation error: {0}")]
    Validation(FieldErrors),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<FieldErrors> for CommentServiceError {
    fn from(errors: FieldErrors) -> Self {
        CommentServiceError::Validation(errors)
    }
}

/// Comment service
pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    posts: Arc<dyn PostRepository>,
    reports: Arc<dyn ReportRepository>,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentRepository>,
        posts: Arc<dyn PostRepository>,
        reports: Arc<dyn ReportRepository>,
    ) -> Self {
        Self {
            comments,
            posts,
            reports,
        }
    }

    /// Comment on a published post, optionally as a reply.
    pub async fn create(
        &self,
        post_slug: &str,
        author: &User,
        input: CreateCommentInput,
    ) -> Result<Comment, CommentServiceError> {
        let post = match self.posts.get_by_slug(post_slug).await? {
            Some(post) if post.is_published() => post,
            _ => return Err(CommentServiceError::NotFound("Post")),
        };

        let mut errors = FieldErrors::new();
        let body = required_text(&mut errors, "body", input.body.as_deref(), MAX_COMMENT_LEN);

        if let Some(parent_id) = input.parent {
            match self.comments.get_by_id(parent_id).await? {
                Some(parent) if parent.is_visible_to(Some(author)) => {
                    if parent.post_id != post.id {
                        errors.add("parent", "The parent comment belongs to another post.");
                    } else if !parent.is_top_level() {
                        errors.add("parent", "Replies are only allowed to top-level comments.");
                    }
                }
                _ => errors.add(
                    "parent",
                    format!("Invalid pk \"{}\" - object does not exist.", parent_id),
                ),
            }
        }

        errors.into_result()?;
        let body = body.ok_or_else(|| anyhow!("validated comment input missing body"))?;

        let comment = self
            .comments
            .create(&NewComment {
                post_id: post.id,
                author_id: author.id,
                parent_id: input.parent,
                body,
                status: input.status.unwrap_or_default(),
            })
            .await?;

        tracing::info!("Comment {} added to '{}' by {}", comment.id, post.slug, author.username);
        Ok(comment)
    }

    /// Top-level comments of a post, newest first
    pub async fn list_top_level(
        &self,
        post_slug: &str,
        viewer: Option<&User>,
        params: &ListParams,
    ) -> Result<PagedResult<Comment>, CommentServiceError> {
        let post = self.visible_post(post_slug, viewer).await?;
        self.list_thread(post.id, Thread::TopLevel, viewer, params).await
    }

    /// Replies to one comment, newest first
    pub async fn list_replies(
        &self,
        post_slug: &str,
        comment_id: i64,
        viewer: Option<&User>,
        params: &ListParams,
    ) -> Result<PagedResult<Comment>, CommentServiceError> {
        let (post, parent) = self.visible_comment(post_slug, comment_id, viewer).await?;
        self.list_thread(post.id, Thread::RepliesTo(parent.id), viewer, params)
            .await
    }

    pub async fn get(
        &self,
        post_slug: &str,
        comment_id: i64,
        viewer: Option<&User>,
    ) -> Result<Comment, CommentServiceError> {
        let (_, comment) = self.visible_comment(post_slug, comment_id, viewer).await?;
        Ok(comment)
    }

    /// Partial update of body and status; only the author may edit.
    pub async fn update(
        &self,
        post_slug: &str,
        comment_id: i64,
        requester: &User,
        input: UpdateCommentInput,
    ) -> Result<Comment, CommentServiceError> {
        let (_, comment) = self
            .visible_comment(post_slug, comment_id, Some(requester))
            .await?;
        if !requester.owns(comment.author_id) {
            return Err(CommentServiceError::Forbidden);
        }

        let mut errors = FieldErrors::new();
        let body = input
            .body
            .as_deref()
            .and_then(|b| required_text(&mut errors, "body", Some(b), MAX_COMMENT_LEN));
        errors.into_result()?;

        let body = body.unwrap_or_else(|| comment.body.clone());
        let status = input.status.unwrap_or(comment.status);
        self.comments
            .update(comment.id, &body, status)
            .await?
            .ok_or(CommentServiceError::NotFound("Comment"))
    }

    /// Flip the user's like, returning `(liked, like_count)`.
    pub async fn toggle_like(
        &self,
        post_slug: &str,
        comment_id: i64,
        user: &User,
    ) -> Result<(bool, i64), CommentServiceError> {
        let (_, comment) = self.visible_comment(post_slug, comment_id, Some(user)).await?;
        let liked = self.comments.toggle_like(comment.id, user.id).await?;
        let likes = self
            .comments
            .get_by_id(comment.id)
            .await?
            .map(|c| c.like_count)
            .unwrap_or_default();
        Ok((liked, likes))
    }

    /// Report a comment; `false` when the user already reported it.
    pub async fn report(
        &self,
        post_slug: &str,
        comment_id: i64,
        user: &User,
    ) -> Result<bool, CommentServiceError> {
        let (_, comment) = self.visible_comment(post_slug, comment_id, Some(user)).await?;
        let reported = self.reports.report_comment(comment.id, user.id).await?;
        if reported {
            tracing::info!("Comment {} reported by {}", comment.id, user.username);
        }
        Ok(reported)
    }

    /// Comments written by `author`. Other viewers only see published
    /// comments on published posts.
    pub async fn list_by_author(
        &self,
        author: &User,
        viewer: Option<&User>,
        params: &ListParams,
    ) -> Result<PagedResult<Comment>, CommentServiceError> {
        let public_only = !viewer.is_some_and(|v| v.owns(author.id));
        let (comments, total) = self
            .comments
            .list_by_author(author.id, public_only, params)
            .await?;
        Ok(PagedResult::new(comments, total, params))
    }

    async fn list_thread(
        &self,
        post_id: i64,
        thread: Thread,
        viewer: Option<&User>,
        params: &ListParams,
    ) -> Result<PagedResult<Comment>, CommentServiceError> {
        let (comments, total) = self
            .comments
            .list_for_post(post_id, thread, viewer.map(|u| u.id), params)
            .await?;
        Ok(PagedResult::new(comments, total, params))
    }

    async fn visible_post(
        &self,
        slug: &str,
        viewer: Option<&User>,
    ) -> Result<Post, CommentServiceError> {
        match self.posts.get_by_slug(slug).await? {
            Some(post) if post.is_visible_to(viewer) => Ok(post),
            _ => Err(CommentServiceError::NotFound("Post")),
        }
    }

    async fn visible_comment(
        &self,
        post_slug: &str,
        comment_id: i64,
        viewer: Option<&User>,
    ) -> Result<(Post, Comment), CommentServiceError> {
        let post = self.visible_post(post_slug, viewer).await?;
        match self.comments.get_by_id(comment_id).await? {
            Some(comment) if comment.post_id == post.id && comment.is_visible_to(viewer) => {
                Ok((post, comment))
            }
            _ => Err(CommentServiceError::NotFound("Comment")),
        }
    }
}
