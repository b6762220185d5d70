//! Comment API endpoints
//!
//! Comments hang off a post; replies are one level deep and listed
//! separately from the top-level thread.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};

use crate::api::common::{paginate, parse_id, JsonBody, PageQuery, Paginated, Urls};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::api::responses::{CommentResponse, LikeResponse, ReportResponse};
use crate::models::{CreateCommentInput, UpdateCommentInput};

const COMMENT: &str = "Comment";

/// Build public comment routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/blog/post/{slug}/comments/", get(list_comments))
        .route("/blog/post/{slug}/comments/{id}/", get(get_comment))
        .route("/blog/post/{slug}/comments/{id}/children/", get(list_children))
}

/// Build protected comment routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/blog/post/{slug}/comments/", post(create_comment))
        .route("/blog/post/{slug}/comments/{id}/", patch(update_comment))
        .route("/blog/post/{slug}/comments/{id}/like/", get(like_comment))
        .route("/blog/post/{slug}/comments/{id}/report/", get(report_comment))
}

/// GET /blog/post/{slug}/comments/ - Top-level comments of a post
async fn list_comments(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<CommentResponse>>, ApiError> {
    let params = query.params()?;
    let result = state
        .comment_service
        .list_top_level(&slug, viewer.user(), &params)
        .await?;

    let urls = Urls::new(state.base_url());
    let page = paginate(result, &query, urls, &urls.comments(&slug), viewer.user(), |c| {
        CommentResponse::new(c, urls)
    })?;
    Ok(Json(page))
}

/// POST /blog/post/{slug}/comments/ - Comment on a post or reply to a comment
async fn create_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(slug): Path<String>,
    JsonBody(input): JsonBody<CreateCommentInput>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    let comment = state.comment_service.create(&slug, &user, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(CommentResponse::new(comment, Urls::new(state.base_url()))),
    ))
}

/// GET /blog/post/{slug}/comments/{id}/
async fn get_comment(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path((slug, id)): Path<(String, String)>,
) -> Result<Json<CommentResponse>, ApiError> {
    let id = parse_id(&id, COMMENT)?;
    let comment = state.comment_service.get(&slug, id, viewer.user()).await?;
    Ok(Json(CommentResponse::new(comment, Urls::new(state.base_url()))))
}

/// PATCH /blog/post/{slug}/comments/{id}/ - Edit by the author
async fn update_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((slug, id)): Path<(String, String)>,
    JsonBody(input): JsonBody<UpdateCommentInput>,
) -> Result<Json<CommentResponse>, ApiError> {
    let id = parse_id(&id, COMMENT)?;
    let comment = state.comment_service.update(&slug, id, &user, input).await?;
    Ok(Json(CommentResponse::new(comment, Urls::new(state.base_url()))))
}

/// GET /blog/post/{slug}/comments/{id}/children/ - Replies to a comment
async fn list_children(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path((slug, id)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<CommentResponse>>, ApiError> {
    let id = parse_id(&id, COMMENT)?;
    let params = query.params()?;
    let result = state
        .comment_service
        .list_replies(&slug, id, viewer.user(), &params)
        .await?;

    let urls = Urls::new(state.base_url());
    let page = paginate(result, &query, urls, &urls.children(&slug, id), viewer.user(), |c| {
        CommentResponse::new(c, urls)
    })?;
    Ok(Json(page))
}

/// GET /blog/post/{slug}/comments/{id}/like/
async fn like_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((slug, id)): Path<(String, String)>,
) -> Result<Json<LikeResponse>, ApiError> {
    let id = parse_id(&id, COMMENT)?;
    let toggled = state.comment_service.toggle_like(&slug, id, &user).await?;
    Ok(Json(LikeResponse::new(toggled)))
}

/// GET /blog/post/{slug}/comments/{id}/report/
async fn report_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((slug, id)): Path<(String, String)>,
) -> Result<Json<ReportResponse>, ApiError> {
    let id = parse_id(&id, COMMENT)?;
    let reported = state.comment_service.report(&slug, id, &user).await?;
    Ok(Json(ReportResponse::new(reported, COMMENT)))
}
