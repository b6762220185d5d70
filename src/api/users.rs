//! User profile API endpoints
//!
//! - GET /user/profile/{username}/ - Public profile
//! - PATCH /user/profile/{username}/ - Edit bio and email (owner only)
//! - GET /user/profile/{username}/{object_type}/ - The user's posts or comments

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};

use crate::api::common::{paginate, JsonBody, PageQuery, Urls};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::api::responses::{CommentResponse, PostListItem, ProfileResponse};
use crate::models::{UpdateProfileInput, User};

/// Build public profile routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/user/profile/{username}/", get(get_profile))
        .route("/user/profile/{username}/{object_type}/", get(list_user_objects))
}

/// Build protected profile routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/user/profile/{username}/", patch(update_profile))
}

async fn profile_response(
    state: &AppState,
    user: User,
    viewer: Option<&User>,
) -> Result<ProfileResponse, ApiError> {
    let post_count = state.post_service.count_by_author(&user, viewer).await?;
    Ok(ProfileResponse::new(
        user,
        viewer,
        post_count,
        Urls::new(state.base_url()),
    ))
}

/// GET /user/profile/{username}/
async fn get_profile(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = state.user_service.get_by_username(&username).await?;
    Ok(Json(profile_response(&state, user, viewer.user()).await?))
}

/// PATCH /user/profile/{username}/
async fn update_profile(
    State(state): State<AppState>,
    AuthenticatedUser(requester): AuthenticatedUser,
    Path(username): Path<String>,
    JsonBody(input): JsonBody<UpdateProfileInput>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = state
        .user_service
        .update_profile(&username, &requester, input)
        .await?;
    Ok(Json(profile_response(&state, user, Some(&requester)).await?))
}

/// GET /user/profile/{username}/{object_type}/
///
/// The owner sees drafts too; everyone else only published content.
async fn list_user_objects(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path((username, object_type)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    if object_type != "posts" && object_type != "comments" {
        return Err(ApiError::not_found("Unknown object type"));
    }

    let author = state.user_service.get_by_username(&username).await?;
    let params = query.params()?;
    let urls = Urls::new(state.base_url());
    let listing = urls.profile_objects(&author.username, &object_type);

    if object_type == "posts" {
        let result = state
            .post_service
            .list_by_author(&author, viewer.user(), &params)
            .await?;
        let tags = state.post_service.tags_for_posts(&result.items).await?;
        let page = paginate(result, &query, urls, &listing, viewer.user(), |post| {
            let post_tags = tags.get(&post.id).map(Vec::as_slice).unwrap_or_default();
            PostListItem::new(post, post_tags, urls)
        })?;
        Ok(Json(page).into_response())
    } else {
        let result = state
            .comment_service
            .list_by_author(&author, viewer.user(), &params)
            .await?;
        let page = paginate(result, &query, urls, &listing, viewer.user(), |c| {
            CommentResponse::new(c, urls)
        })?;
        Ok(Json(page).into_response())
    }
}
