//! Post service
//!
//! Implements the post rules:
//! - Drafts are visible to their author only; anyone else gets `NotFound`
//! - Only the author may edit or delete a post
//! - Slugs are derived from `title-username-date` and made unique by the
//!   database's unique index, retrying with a random suffix on conflict
//! - Content is sanitized on every write and tags are reconciled

use crate::db::repositories::{CommentRepository, PostRepository, ReportRepository, Thread};
use crate::models::{
    CreatePostInput, ListParams, NewPost, PagedResult, Post, PostChanges, Tag, UpdatePostInput,
    User,
};
use crate::services::sanitize::sanitize_html;
use crate::services::tag::{normalize_taglines, TagService};
use crate::services::{required_text, FieldErrors};
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;

/// Longest accepted title, in characters
pub const MAX_TITLE_LEN: usize = 200;

/// Content characters shown in list views
pub const EXCERPT_LEN: usize = 200;

const MAX_SLUG_ATTEMPTS: usize = 10;
const SLUG_SUFFIX_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SLUG_SUFFIX_LEN: usize = 2;

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    /// Post does not exist or is not visible to the requester
    #[error("Post not found")]
    NotFound,

    /// Requester is not the author
    #[error("You do not have permission to modify this post")]
    Forbidden,

    /// Invalid input
    #[error("Validation error: {0}")]
    Validation(FieldErrors),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<FieldErrors> for PostServiceError {
    fn from(errors: FieldErrors) -> Self {
        PostServiceError::Validation(errors)
    }
}

/// Everything the detail view shows about a post
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: Post,
    pub tags: Vec<Tag>,
    pub likes: i64,
    pub is_liked: bool,
    /// Top-level comments visible to the requester
    pub comments_count: i64,
}

/// Lowercase URL slug: ASCII letters and digits kept, whitespace, `-` and
/// `_` turned into single hyphens, everything else dropped.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        "post".to_string()
    } else {
        slug
    }
}

/// Slug for a post before any collision suffix
pub fn base_slug(title: &str, username: &str, date: DateTime<Utc>) -> String {
    slugify(&format!("{}-{}-{}", title, username, date.format("%Y-%m-%d")))
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SLUG_SUFFIX_LEN)
        .map(|_| SLUG_SUFFIX_CHARS[rng.gen_range(0..SLUG_SUFFIX_CHARS.len())] as char)
        .collect()
}

fn slug_candidate(base: &str, attempt: usize) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{}-{}", base, random_suffix())
    }
}

/// True when `slug` is `base` or `base` plus a collision suffix
fn slug_has_base(slug: &str, base: &str) -> bool {
    match slug.strip_prefix(base) {
        Some("") => true,
        Some(rest) => {
            rest.len() == SLUG_SUFFIX_LEN + 1
                && rest.starts_with('-')
                && rest[1..].bytes().all(|b| SLUG_SUFFIX_CHARS.contains(&b))
        }
        None => false,
    }
}

/// Post service
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
    reports: Arc<dyn ReportRepository>,
    tags: Arc<TagService>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        comments: Arc<dyn CommentRepository>,
        reports: Arc<dyn ReportRepository>,
        tags: Arc<TagService>,
    ) -> Self {
        Self {
            posts,
            comments,
            reports,
            tags,
        }
    }

    /// Create a post authored by `author`.
    pub async fn create(
        &self,
        author: &User,
        input: CreatePostInput,
    ) -> Result<Post, PostServiceError> {
        let mut errors = FieldErrors::new();
        let title = required_text(&mut errors, "title", input.title.as_deref(), MAX_TITLE_LEN);
        let content = required_text(&mut errors, "content", input.content.as_deref(), usize::MAX);
        let taglines = match input.tags.as_deref().map(normalize_taglines) {
            Some(Err(tag_errors)) => {
                errors.extend(tag_errors);
                None
            }
            Some(Ok(taglines)) => Some(taglines),
            None => None,
        };
        errors.into_result()?;
        let (Some(title), Some(content)) = (title, content) else {
            return Err(anyhow!("validated post input missing title or content").into());
        };

        let base = base_slug(&title, &author.username, Utc::now());
        let mut new_post = NewPost {
            title,
            slug: base.clone(),
            content: sanitize_html(&content)?,
            author_id: author.id,
            status: input.status.unwrap_or_default(),
        };

        let mut created = None;
        for attempt in 0..MAX_SLUG_ATTEMPTS {
            new_post.slug = slug_candidate(&base, attempt);
            if let Some(post) = self.posts.create(&new_post).await? {
                created = Some(post);
                break;
            }
            tracing::debug!("Slug '{}' taken, retrying", new_post.slug);
        }
        let post = created
            .ok_or_else(|| anyhow!("Could not allocate a unique slug for '{}'", base))?;

        if let Some(taglines) = taglines {
            self.tags.reconcile(post.id, &taglines).await?;
        }

        tracing::info!("Post '{}' created by {}", post.slug, author.username);
        Ok(post)
    }

    /// Apply a partial update; only the author may edit.
    pub async fn update(
        &self,
        slug: &str,
        requester: &User,
        input: UpdatePostInput,
    ) -> Result<Post, PostServiceError> {
        let post = self.editable(slug, requester).await?;

        let mut errors = FieldErrors::new();
        let title = input
            .title
            .as_deref()
            .and_then(|t| required_text(&mut errors, "title", Some(t), MAX_TITLE_LEN));
        let content = input
            .content
            .as_deref()
            .and_then(|c| required_text(&mut errors, "content", Some(c), usize::MAX));
        let taglines = match input.tags.as_deref().map(normalize_taglines) {
            Some(Err(tag_errors)) => {
                errors.extend(tag_errors);
                None
            }
            Some(Ok(taglines)) => Some(taglines),
            None => None,
        };
        errors.into_result()?;

        let mut changes = PostChanges {
            title: title.unwrap_or_else(|| post.title.clone()),
            slug: post.slug.clone(),
            content: match content {
                Some(c) => sanitize_html(&c)?,
                None => post.content.clone(),
            },
            status: input.status.unwrap_or(post.status),
        };

        let base = base_slug(&changes.title, &post.author_username, post.created_at);
        let keep_slug = input.title.is_none() || slug_has_base(&post.slug, &base);

        let mut updated = None;
        for attempt in 0..MAX_SLUG_ATTEMPTS {
            if !keep_slug {
                changes.slug = slug_candidate(&base, attempt);
            }
            if let Some(saved) = self.posts.update(post.id, &changes).await? {
                updated = Some(saved);
                break;
            }
            if keep_slug {
                break;
            }
            tracing::debug!("Slug '{}' taken, retrying", changes.slug);
        }
        let updated = updated
            .ok_or_else(|| anyhow!("Could not save post {} with a unique slug", post.id))?;

        if let Some(taglines) = taglines {
            self.tags.reconcile(updated.id, &taglines).await?;
        }

        Ok(updated)
    }

    /// Delete a post and everything hanging off it; only the author may.
    pub async fn delete(&self, slug: &str, requester: &User) -> Result<(), PostServiceError> {
        let post = self.editable(slug, requester).await?;
        self.posts.delete(post.id).await?;
        tracing::info!("Post '{}' deleted by {}", post.slug, requester.username);
        Ok(())
    }

    /// A post the viewer may see, or `NotFound`
    pub async fn get_visible(
        &self,
        slug: &str,
        viewer: Option<&User>,
    ) -> Result<Post, PostServiceError> {
        match self.posts.get_by_slug(slug).await? {
            Some(post) if post.is_visible_to(viewer) => Ok(post),
            _ => Err(PostServiceError::NotFound),
        }
    }

    /// Detail view of a post. Counts as a hit.
    pub async fn view(
        &self,
        slug: &str,
        viewer: Option<&User>,
    ) -> Result<PostDetail, PostServiceError> {
        let mut post = self.get_visible(slug, viewer).await?;
        post.hit_count = self.posts.increment_hits(post.id).await?;
        self.detail(post, viewer).await
    }

    /// Attach tags, like state and comment count to a post
    pub async fn detail(
        &self,
        post: Post,
        viewer: Option<&User>,
    ) -> Result<PostDetail, PostServiceError> {
        let tags = self.tags.tags_for_post(post.id).await?;
        let likes = self.posts.like_count(post.id).await?;
        let is_liked = match viewer {
            Some(user) => self.posts.is_liked(post.id, user.id).await?,
            None => false,
        };
        let (_, comments_count) = self
            .comments
            .list_for_post(
                post.id,
                Thread::TopLevel,
                viewer.map(|u| u.id),
                &ListParams::new(1, 1),
            )
            .await?;

        Ok(PostDetail {
            post,
            tags,
            likes,
            is_liked,
            comments_count,
        })
    }

    /// Published posts, newest first, optionally filtered by search terms
    pub async fn list_published(
        &self,
        search: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        let terms: Vec<String> = search
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let (posts, total) = self.posts.list_published(&terms, params).await?;
        Ok(PagedResult::new(posts, total, params))
    }

    /// Posts of one author; drafts are included only for the author.
    pub async fn list_by_author(
        &self,
        author: &User,
        viewer: Option<&User>,
        params: &ListParams,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        let include_drafts = viewer.is_some_and(|v| v.owns(author.id));
        let (posts, total) = self
            .posts
            .list_by_author(author.id, include_drafts, params)
            .await?;
        Ok(PagedResult::new(posts, total, params))
    }

    /// Number of posts by `author` that `viewer` can see
    pub async fn count_by_author(
        &self,
        author: &User,
        viewer: Option<&User>,
    ) -> Result<i64, PostServiceError> {
        Ok(self
            .list_by_author(author, viewer, &ListParams::new(1, 1))
            .await?
            .total)
    }

    pub async fn tags_for_posts(
        &self,
        posts: &[Post],
    ) -> Result<HashMap<i64, Vec<Tag>>, PostServiceError> {
        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        Ok(self.tags.tags_for_posts(&ids).await?)
    }

    /// Flip the user's like, returning `(liked, like_count)`.
    pub async fn toggle_like(
        &self,
        slug: &str,
        user: &User,
    ) -> Result<(bool, i64), PostServiceError> {
        let post = self.get_visible(slug, Some(user)).await?;
        let liked = self.posts.toggle_like(post.id, user.id).await?;
        let likes = self.posts.like_count(post.id).await?;
        Ok((liked, likes))
    }

    /// Report a post; `false` when the user already reported it.
    pub async fn report(&self, slug: &str, user: &User) -> Result<bool, PostServiceError> {
        let post = self.get_visible(slug, Some(user)).await?;
        let reported = self.reports.report_post(post.id, user.id).await?;
        if reported {
            tracing::info!("Post '{}' reported by {}", post.slug, user.username);
        }
        Ok(reported)
    }

    async fn editable(&self, slug: &str, requester: &User) -> Result<Post, PostServiceError> {
        let post = self.get_visible(slug, Some(requester)).await?;
        if !requester.owns(post.author_id) {
            return Err(PostServiceError::Forbidden);
        }
        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxCommentRepository, SqlxPostRepository, SqlxReportRepository, SqlxTagRepository,
        SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::PostStatus;
    use proptest::prelude::*;

    struct Fixture {
        service: PostService,
        alice: User,
        bob: User,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let users = SqlxUserRepository::new(pool.clone());
        let alice = users
            .create(&User::new("alice".into(), "alice@example.com".into(), "h".into()))
            .await
            .unwrap();
        let bob = users
            .create(&User::new("bob".into(), "bob@example.com".into(), "h".into()))
            .await
            .unwrap();

        let service = PostService::new(
            SqlxPostRepository::boxed(pool.clone()),
            SqlxCommentRepository::boxed(pool.clone()),
            SqlxReportRepository::boxed(pool.clone()),
            Arc::new(TagService::new(SqlxTagRepository::boxed(pool))),
        );
        Fixture { service, alice, bob }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  --Rust_and   Axum-- "), "rust-and-axum");
        assert_eq!(slugify("Ünïcödé"), "ncd");
        assert_eq!(slugify("!!!"), "post");
        assert_eq!(slugify(""), "post");
    }

    #[test]
    fn test_base_slug_includes_username_and_date() {
        let date = DateTime::parse_from_rfc3339("2024-03-05T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(base_slug("My Post", "Alice", date), "my-post-alice-2024-03-05");
    }

    #[test]
    fn test_slug_has_base() {
        assert!(slug_has_base("a-b", "a-b"));
        assert!(slug_has_base("a-b-x9", "a-b"));
        assert!(!slug_has_base("a-b-xyz", "a-b"));
        assert!(!slug_has_base("a-b-X9", "a-b"));
        assert!(!slug_has_base("other", "a-b"));
    }

    proptest! {
        #[test]
        fn prop_slugify_output_is_url_safe(input in "\\PC{0,80}") {
            let slug = slugify(&input);
            prop_assert!(!slug.is_empty());
            prop_assert!(slug.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-'));
            prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
        }
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let f = setup().await;
        let err = f
            .service
            .create(&f.alice, CreatePostInput { title: Some("  ".into()), ..Default::default() })
            .await
            .unwrap_err();
        match err {
            PostServiceError::Validation(errors) => {
                assert!(errors.contains("title"));
                assert!(errors.contains("content"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_same_title_same_day_gets_distinct_slugs() {
        let f = setup().await;
        let first = f.service.create(&f.alice, CreatePostInput::new("Hello", "a")).await.unwrap();
        let second = f.service.create(&f.alice, CreatePostInput::new("Hello", "b")).await.unwrap();

        assert_ne!(first.slug, second.slug);
        assert!(first.slug.starts_with("hello-alice-"));
        assert!(slug_has_base(&second.slug, &first.slug));
        assert_eq!(first.status, PostStatus::Draft);
    }

    #[tokio::test]
    async fn test_content_is_sanitized() {
        let f = setup().await;
        let post = f
            .service
            .create(&f.alice, CreatePostInput::new("T", "<p>ok</p><script>x()</script>"))
            .await
            .unwrap();
        assert_eq!(post.content, "<p>ok</p>");
    }

    #[tokio::test]
    async fn test_draft_hidden_from_others() {
        let f = setup().await;
        let post = f.service.create(&f.alice, CreatePostInput::new("Secret", "c")).await.unwrap();

        assert!(matches!(
            f.service.get_visible(&post.slug, None).await,
            Err(PostServiceError::NotFound)
        ));
        assert!(matches!(
            f.service.view(&post.slug, Some(&f.bob)).await,
            Err(PostServiceError::NotFound)
        ));
        assert!(f.service.view(&post.slug, Some(&f.alice)).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_requires_owner() {
        let f = setup().await;
        let post = f
            .service
            .create(&f.alice, CreatePostInput::new("Public", "c").with_status(PostStatus::Published))
            .await
            .unwrap();

        let err = f
            .service
            .update(&post.slug, &f.bob, UpdatePostInput::default().title("Mine"))
            .await
            .unwrap_err();
        assert!(matches!(err, PostServiceError::Forbidden));
        assert!(matches!(
            f.service.delete(&post.slug, &f.bob).await,
            Err(PostServiceError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_update_is_partial_and_regenerates_slug() {
        let f = setup().await;
        let post = f
            .service
            .create(&f.alice, CreatePostInput::new("First", "body").with_tags(["a", "b"]))
            .await
            .unwrap();

        let updated = f
            .service
            .update(&post.slug, &f.alice, UpdatePostInput::default().status(PostStatus::Published))
            .await
            .unwrap();
        assert_eq!(updated.slug, post.slug);
        assert_eq!(updated.content, "body");
        assert_eq!(updated.status, PostStatus::Published);

        let renamed = f
            .service
            .update(&post.slug, &f.alice, UpdatePostInput::default().title("Second").tags(["b", "c"]))
            .await
            .unwrap();
        let expected = base_slug("Second", "alice", post.created_at);
        assert_eq!(renamed.slug, expected);
        assert_eq!(renamed.status, PostStatus::Published);

        let detail = f.service.view(&renamed.slug, None).await.unwrap();
        let tags: Vec<_> = detail.tags.iter().map(|t| t.tagline.as_str()).collect();
        assert_eq!(tags, vec!["b", "c"]);
        assert_eq!(detail.post.hit_count, 1);
    }

    #[tokio::test]
    async fn test_like_toggle_and_report_once() {
        let f = setup().await;
        let post = f
            .service
            .create(&f.alice, CreatePostInput::new("Likeable", "c").with_status(PostStatus::Published))
            .await
            .unwrap();

        assert_eq!(f.service.toggle_like(&post.slug, &f.bob).await.unwrap(), (true, 1));
        assert_eq!(f.service.toggle_like(&post.slug, &f.bob).await.unwrap(), (false, 0));

        assert!(f.service.report(&post.slug, &f.bob).await.unwrap());
        assert!(!f.service.report(&post.slug, &f.bob).await.unwrap());
    }

    #[tokio::test]
    async fn test_listing_visibility() {
        let f = setup().await;
        for title in ["one", "two", "three"] {
            f.service
                .create(&f.alice, CreatePostInput::new(title, "c").with_status(PostStatus::Published))
                .await
                .unwrap();
        }
        f.service.create(&f.alice, CreatePostInput::new("draft", "c")).await.unwrap();

        let params = ListParams::default();
        let public = f.service.list_published(None, &params).await.unwrap();
        let titles: Vec<_> = public.items.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["three", "two", "one"]);

        let own = f.service.list_by_author(&f.alice, Some(&f.alice), &params).await.unwrap();
        assert_eq!(own.total, 4);
        assert_eq!(f.service.count_by_author(&f.alice, Some(&f.bob)).await.unwrap(), 3);

        let found = f.service.list_published(Some("  TW  "), &params).await.unwrap();
        assert_eq!(found.total, 1);
    }

    #[tokio::test]
    async fn test_delete_by_owner() {
        let f = setup().await;
        let post = f.service.create(&f.alice, CreatePostInput::new("Gone", "c")).await.unwrap();
        f.service.delete(&post.slug, &f.alice).await.unwrap();
        assert!(matches!(
            f.service.get_visible(&post.slug, Some(&f.alice)).await,
            Err(PostServiceError::NotFound)
        ));
    }
}
