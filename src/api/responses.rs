//! Shared API response types
//!
//! Response structures used across the blog and user endpoints. Every
//! link in a response is absolute, built through `Urls`.

use serde::Serialize;

use crate::api::common::Urls;
use crate::models::{Comment, Post, Tag, User};
use crate::services::{PostDetail, EXCERPT_LEN};

// ============================================================================
// Post Response Types
// ============================================================================

/// Post as shown in list views
#[derive(Debug, Serialize)]
pub struct PostListItem {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub slug: String,
    pub status: String,
    /// First characters of the content only
    pub content: String,
    pub author_username: String,
    pub author: String,
    pub tags: Vec<String>,
    pub created_on: String,
    pub updated_on: String,
}

impl PostListItem {
    pub fn new(post: Post, tags: &[Tag], urls: Urls<'_>) -> Self {
        Self {
            id: post.id,
            url: urls.post(&post.slug),
            content: post.excerpt(EXCERPT_LEN),
            author: urls.profile(&post.author_username),
            tags: taglines(tags),
            status: post.status.as_str().to_string(),
            created_on: post.created_at.to_rfc3339(),
            updated_on: post.updated_at.to_rfc3339(),
            title: post.title,
            slug: post.slug,
            author_username: post.author_username,
        }
    }
}

/// Full post response
#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub slug: String,
    pub status: String,
    pub content: String,
    pub author_username: String,
    pub author: String,
    pub tags: Vec<String>,
    pub likes: i64,
    pub is_liked: bool,
    pub hit_count: i64,
    pub comments_count: i64,
    pub comments_url: String,
    pub created_on: String,
    pub updated_on: String,
}

impl PostResponse {
    pub fn new(detail: PostDetail, urls: Urls<'_>) -> Self {
        let PostDetail {
            post,
            tags,
            likes,
            is_liked,
            comments_count,
        } = detail;
        Self {
            id: post.id,
            url: urls.post(&post.slug),
            comments_url: urls.comments(&post.slug),
            author: urls.profile(&post.author_username),
            tags: taglines(&tags),
            status: post.status.as_str().to_string(),
            hit_count: post.hit_count,
            likes,
            is_liked,
            comments_count,
            created_on: post.created_at.to_rfc3339(),
            updated_on: post.updated_at.to_rfc3339(),
            title: post.title,
            slug: post.slug,
            content: post.content,
            author_username: post.author_username,
        }
    }
}

fn taglines(tags: &[Tag]) -> Vec<String> {
    tags.iter().map(|t| t.tagline.clone()).collect()
}

// ============================================================================
// Comment Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: i64,
    pub url: String,
    /// Post the comment belongs to
    pub post: String,
    pub author_username: String,
    pub author: String,
    pub parent: Option<i64>,
    pub body: String,
    pub status: String,
    pub likes: i64,
    pub replies_count: i64,
    /// Replies listing, only for top-level comments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children_url: Option<String>,
    pub created_on: String,
    pub updated_on: String,
}

impl CommentResponse {
    pub fn new(comment: Comment, urls: Urls<'_>) -> Self {
        let post_slug = comment.post_slug.as_str();
        Self {
            id: comment.id,
            url: urls.comment(post_slug, comment.id),
            post: urls.post(post_slug),
            author: urls.profile(&comment.author_username),
            children_url: comment
                .is_top_level()
                .then(|| urls.children(post_slug, comment.id)),
            parent: comment.parent_id,
            status: comment.status.to_string(),
            likes: comment.like_count,
            replies_count: comment.reply_count,
            created_on: comment.created_at.to_rfc3339(),
            updated_on: comment.updated_at.to_rfc3339(),
            body: comment.body,
            author_username: comment.author_username,
        }
    }
}

// ============================================================================
// User Response Types
// ============================================================================

/// Public profile; `email` is only filled for the profile owner
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub bio: String,
    pub date_joined: String,
    pub posts: String,
    pub comments: String,
    pub post_count: i64,
}

impl ProfileResponse {
    pub fn new(user: User, viewer: Option<&User>, post_count: i64, urls: Urls<'_>) -> Self {
        let is_owner = viewer.is_some_and(|v| v.owns(user.id));
        Self {
            posts: urls.profile_objects(&user.username, "posts"),
            comments: urls.profile_objects(&user.username, "comments"),
            email: is_owner.then_some(user.email),
            date_joined: user.created_at.to_rfc3339(),
            bio: user.bio,
            username: user.username,
            post_count,
        }
    }
}

// ============================================================================
// Toggle and Message Responses
// ============================================================================

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub updated: bool,
    pub liked: bool,
    pub likes: i64,
}

impl LikeResponse {
    pub fn new((liked, likes): (bool, i64)) -> Self {
        Self {
            updated: true,
            liked,
            likes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ReportResponse {
    /// `what` names the object in the already-reported message
    pub fn new(reported: bool, what: &str) -> Self {
        Self {
            updated: reported,
            message: (!reported).then(|| format!("{} already reported", what)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommentStatus, PostStatus};
    use chrono::Utc;

    fn post() -> Post {
        Post {
            id: 3,
            title: "Hello".into(),
            slug: "hello-alice-2026-01-02".into(),
            content: "x".repeat(300),
            author_id: 1,
            author_username: "alice".into(),
            status: PostStatus::Published,
            hit_count: 4,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn comment(parent_id: Option<i64>) -> Comment {
        Comment {
            id: 9,
            post_id: 3,
            post_slug: "p".into(),
            author_id: 2,
            author_username: "bob".into(),
            parent_id,
            body: "nice".into(),
            status: CommentStatus::Published,
            like_count: 1,
            reply_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_list_item_truncates_content() {
        let tags = vec![Tag { id: 1, tagline: "rust".into() }];
        let item = PostListItem::new(post(), &tags, Urls::new("http://h"));
        assert_eq!(item.content.chars().count(), EXCERPT_LEN);
        assert_eq!(item.url, "http://h/blog/post/hello-alice-2026-01-02/");
        assert_eq!(item.author, "http://h/user/profile/alice/");
        assert_eq!(item.tags, vec!["rust"]);
        assert_eq!(item.status, "published");
    }

    #[test]
    fn test_detail_keeps_full_content() {
        let detail = PostDetail {
            post: post(),
            tags: vec![],
            likes: 2,
            is_liked: true,
            comments_count: 5,
        };
        let response = PostResponse::new(detail, Urls::new("http://h"));
        assert_eq!(response.content.len(), 300);
        assert_eq!(
            response.comments_url,
            "http://h/blog/post/hello-alice-2026-01-02/comments/"
        );
        assert_eq!(response.hit_count, 4);
    }

    #[test]
    fn test_children_url_only_for_top_level() {
        let urls = Urls::new("http://h");
        let top = CommentResponse::new(comment(None), urls);
        assert_eq!(
            top.children_url.as_deref(),
            Some("http://h/blog/post/p/comments/9/children/")
        );
        let reply = CommentResponse::new(comment(Some(1)), urls);
        assert!(reply.children_url.is_none());
        assert_eq!(reply.parent, Some(1));
    }

    #[test]
    fn test_profile_email_only_for_owner() {
        let mut user = User::new("alice".into(), "a@example.com".into(), "h".into());
        user.id = 1;
        let mut other = user.clone();
        other.id = 2;

        let urls = Urls::new("http://h");
        let own = ProfileResponse::new(user.clone(), Some(&user), 0, urls);
        assert_eq!(own.email.as_deref(), Some("a@example.com"));
        assert!(ProfileResponse::new(user.clone(), Some(&other), 0, urls).email.is_none());
        assert!(ProfileResponse::new(user, None, 0, urls).email.is_none());
    }

    #[test]
    fn test_report_response() {
        let json = serde_json::to_value(ReportResponse::new(false, "Post")).unwrap();
        assert_eq!(json, serde_json::json!({"updated": false, "message": "Post already reported"}));
        let json = serde_json::to_value(ReportResponse::new(true, "Comment")).unwrap();
        assert_eq!(json, serde_json::json!({"updated": true}));
    }
}
