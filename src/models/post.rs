//! Post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::User;

/// Publication status shared by posts and comments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Visible to the author only
    #[default]
    Draft,
    /// Visible to everyone
    Published,
}

impl PostStatus {
    /// Database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }

    /// Parse the database string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(PostStatus::Draft),
            "published" => Some(PostStatus::Published),
            _ => None,
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A blog post, joined with its author's username.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    /// Unique URL identifier
    pub slug: String,
    /// Sanitized HTML
    pub content: String,
    pub author_id: i64,
    pub author_username: String,
    pub status: PostStatus,
    pub hit_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }

    /// Published posts are visible to everyone, drafts only to their author.
    pub fn is_visible_to(&self, viewer: Option<&User>) -> bool {
        self.is_published() || viewer.is_some_and(|u| u.owns(self.author_id))
    }

    /// The first `max_chars` characters of the content.
    pub fn excerpt(&self, max_chars: usize) -> String {
        match self.content.char_indices().nth(max_chars) {
            Some((idx, _)) => self.content[..idx].to_string(),
            None => self.content.clone(),
        }
    }
}

/// Input for creating a post
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePostInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub status: Option<PostStatus>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl CreatePostInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            content: Some(content.into()),
            status: None,
            tags: None,
        }
    }

    pub fn with_status(mut self, status: PostStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }
}

/// Partial update of a post; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<PostStatus>,
    /// Present (even empty) means "reconcile the tag set to this list"
    pub tags: Option<Vec<String>>,
}

impl UpdatePostInput {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn status(mut self, status: PostStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }
}

/// Row values written by the repository on insert
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub author_id: i64,
    pub status: PostStatus,
}

/// Row values written by the repository on update
#[derive(Debug, Clone)]
pub struct PostChanges {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub status: PostStatus,
}
