//! Post API endpoints
//!
//! Handles HTTP requests for blog posts:
//! - GET /blog/ - Published posts, newest first, with search
//! - POST /blog/post/ - Create a post
//! - GET /blog/post/{slug}/ - Post detail (counts a hit)
//! - PATCH /blog/post/{slug}/ - Partial update by the author
//! - DELETE /blog/post/{slug}/ - Delete by the author
//! - GET /blog/post/{slug}/like/ - Toggle like
//! - GET /blog/post/{slug}/report/ - Report once

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::api::common::{paginate, JsonBody, PageQuery, Paginated, Urls};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::api::responses::{LikeResponse, PostListItem, PostResponse, ReportResponse};
use crate::models::{CreatePostInput, UpdatePostInput};

/// Build public post routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/blog/", get(list_posts))
        .route("/blog/post/{slug}/", get(get_post))
}

/// Build protected post routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/blog/post/", post(create_post))
        .route(
            "/blog/post/{slug}/",
            axum::routing::patch(update_post).delete(delete_post),
        )
        .route("/blog/post/{slug}/like/", get(like_post))
        .route("/blog/post/{slug}/report/", get(report_post))
}

/// GET /blog/ - List published posts
async fn list_posts(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<PostListItem>>, ApiError> {
    let params = query.params()?;
    let result = state
        .post_service
        .list_published(query.search(), &params)
        .await?;
    let tags = state.post_service.tags_for_posts(&result.items).await?;

    let urls = Urls::new(state.base_url());
    let page = paginate(result, &query, urls, &urls.blog(), viewer.user(), |post| {
        let post_tags = tags.get(&post.id).map(Vec::as_slice).unwrap_or_default();
        PostListItem::new(post, post_tags, urls)
    })?;
    Ok(Json(page))
}

/// POST /blog/post/ - Create a post
async fn create_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    JsonBody(input): JsonBody<CreatePostInput>,
) -> Result<(StatusCode, Json<PostResponse>), ApiError> {
    let post = state.post_service.create(&user, input).await?;
    let detail = state.post_service.detail(post, Some(&user)).await?;

    Ok((
        StatusCode::CREATED,
        Json(PostResponse::new(detail, Urls::new(state.base_url()))),
    ))
}

/// GET /blog/post/{slug}/ - Post detail
async fn get_post(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(slug): Path<String>,
) -> Result<Json<PostResponse>, ApiError> {
    let detail = state.post_service.view(&slug, viewer.user()).await?;
    Ok(Json(PostResponse::new(detail, Urls::new(state.base_url()))))
}

/// PATCH /blog/post/{slug}/ - Update a post
async fn update_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(slug): Path<String>,
    JsonBody(input): JsonBody<UpdatePostInput>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = state.post_service.update(&slug, &user, input).await?;
    let detail = state.post_service.detail(post, Some(&user)).await?;
    Ok(Json(PostResponse::new(detail, Urls::new(state.base_url()))))
}

/// DELETE /blog/post/{slug}/ - Delete a post
async fn delete_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.post_service.delete(&slug, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /blog/post/{slug}/like/ - Toggle the requester's like
async fn like_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(slug): Path<String>,
) -> Result<Json<LikeResponse>, ApiError> {
    let toggled = state.post_service.toggle_like(&slug, &user).await?;
    Ok(Json(LikeResponse::new(toggled)))
}

/// GET /blog/post/{slug}/report/ - Report a post
async fn report_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(slug): Path<String>,
) -> Result<Json<ReportResponse>, ApiError> {
    let reported = state.post_service.report(&slug, &user).await?;
    Ok(Json(ReportResponse::new(reported, "Post")))
}
