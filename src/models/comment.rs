//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::User;

/// Comment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    Draft,
    #[default]
    Published,
}

impl std::fmt::Display for CommentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Published => write!(f, "published"),
        }
    }
}

impl std::str::FromStr for CommentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            _ => Err(format!("Invalid comment status: {}", s)),
        }
    }
}

/// Comment entity with display counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub post_slug: String,
    pub author_id: i64,
    pub author_username: String,
    /// `None` for top-level comments
    pub parent_id: Option<i64>,
    pub body: String,
    pub status: CommentStatus,
    pub like_count: i64,
    /// Published replies
    pub reply_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_visible_to(&self, viewer: Option<&User>) -> bool {
        self.status == CommentStatus::Published || viewer.is_some_and(|u| u.owns(self.author_id))
    }
}

/// Input for creating a comment
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCommentInput {
    #[serde(default)]
    pub body: Option<String>,
    /// Id of the top-level comment being replied to
    #[serde(default)]
    pub parent: Option<i64>,
    #[serde(default)]
    pub status: Option<CommentStatus>,
}

impl CreateCommentInput {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            parent: None,
            status: None,
        }
    }

    pub fn reply_to(mut self, parent: i64) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_status(mut self, status: CommentStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Partial comment update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCommentInput {
    pub body: Option<String>,
    pub status: Option<CommentStatus>,
}

/// Row values written by the repository on insert
#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub author_id: i64,
    pub parent_id: Option<i64>,
    pub body: String,
    pub status: CommentStatus,
}
