//! API middleware
//!
//! Contains:
//! - `AppState`, the shared services handed to every handler
//! - `ApiError`, the JSON error body and its status mapping
//! - Bearer token authentication (`optional_auth`, `require_auth`)
//! - `AuthenticatedUser` / `MaybeUser` extractors

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::Config;
use crate::db::repositories::{
    SqlxCommentRepository, SqlxPostRepository, SqlxReportRepository, SqlxTagRepository,
    SqlxTokenBlacklistRepository, SqlxUserRepository,
};
use crate::models::User;
use crate::services::{
    AccountTokenGenerator, CommentService, CommentServiceError, EmailService, FieldErrors,
    PostService, PostServiceError, TagService, TokenError, TokenService, UserService,
    UserServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub user_service: Arc<UserService>,
    pub token_service: Arc<TokenService>,
    pub post_service: Arc<PostService>,
    pub comment_service: Arc<CommentService>,
}

impl AppState {
    /// Wire repositories and services over one pool
    pub fn new(pool: SqlitePool, config: Config, email: EmailService) -> Self {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let post_repo = SqlxPostRepository::boxed(pool.clone());
        let comment_repo = SqlxCommentRepository::boxed(pool.clone());
        let report_repo = SqlxReportRepository::boxed(pool.clone());
        let tag_service = Arc::new(TagService::new(SqlxTagRepository::boxed(pool.clone())));

        let user_service = UserService::new(
            user_repo,
            AccountTokenGenerator::new(
                config.auth.secret_key.clone(),
                config.auth.account_token_timeout_secs,
            ),
            Arc::new(email),
            config.server.base_url(),
        );
        let token_service =
            TokenService::new(&config.auth, SqlxTokenBlacklistRepository::boxed(pool));
        let post_service = PostService::new(
            post_repo.clone(),
            comment_repo.clone(),
            report_repo.clone(),
            tag_service,
        );
        let comment_service = CommentService::new(comment_repo, post_repo, report_repo);

        Self {
            config: Arc::new(config),
            user_service: Arc::new(user_service),
            token_service: Arc::new(token_service),
            post_service: Arc::new(post_service),
            comment_service: Arc::new(comment_service),
        }
    }

    /// Public base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.config.server.base_url()
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// The requesting user, if a valid bearer token was sent
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// 400 with a field-keyed `details` map
    pub fn fields(errors: FieldErrors) -> Self {
        let details = serde_json::to_value(&errors).unwrap_or_default();
        Self::with_details("VALIDATION_ERROR", "Invalid input.", details)
    }

    /// Log the cause and answer with a generic 500
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {:#}", cause);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<PostServiceError> for ApiError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::NotFound => ApiError::not_found("Post not found"),
            PostServiceError::Forbidden => ApiError::forbidden(err.to_string()),
            PostServiceError::Validation(errors) => ApiError::fields(errors),
            PostServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(err: CommentServiceError) -> Self {
        match err {
            CommentServiceError::NotFound(_) => ApiError::not_found(err.to_string()),
            CommentServiceError::Forbidden => ApiError::forbidden(err.to_string()),
            CommentServiceError::Validation(errors) => ApiError::fields(errors),
            CommentServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::Validation(errors) => ApiError::fields(errors),
            UserServiceError::InvalidCredentials => ApiError::unauthorized(err.to_string()),
            UserServiceError::InvalidLink => ApiError::validation_error(err.to_string()),
            UserServiceError::NotFound => ApiError::not_found(err.to_string()),
            UserServiceError::Forbidden => ApiError::forbidden(err.to_string()),
            UserServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InternalError(e) => ApiError::internal(e),
            other => ApiError::unauthorized(other.to_string()),
        }
    }
}

/// Extract the bearer token from the Authorization header
fn extract_bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}

/// Resolve an access token to an active user
async fn user_for_token(state: &AppState, token: &str) -> Result<User, ApiError> {
    let claims = state.token_service.verify_access(token).map_err(|e| {
        tracing::warn!("Rejected bearer token: {}", e);
        ApiError::unauthorized("Given token not valid for any token type")
    })?;
    let user_id = claims.user_id()?;

    match state.user_service.get_by_id(user_id).await? {
        Some(user) if user.is_active => Ok(user),
        _ => Err(ApiError::unauthorized("User not found or inactive")),
    }
}

/// Authentication middleware applied to every route.
///
/// Requests without a bearer token pass through anonymously; a token that
/// is present but invalid is rejected.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(token) = extract_bearer_token(&request) {
        let user = user_for_token(&state, &token).await?;
        request.extensions_mut().insert(AuthenticatedUser(user));
    }
    Ok(next.run(request).await)
}

/// Reject anonymous requests on protected routes
pub async fn require_auth(request: Request, next: Next) -> Result<Response, ApiError> {
    if request.extensions().get::<AuthenticatedUser>().is_none() {
        return Err(ApiError::unauthorized(
            "Authentication credentials were not provided.",
        ));
    }
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication credentials were not provided."))
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .map(|user| user.0.clone()),
        ))
    }
}
