//! Account API endpoints
//!
//! Handles HTTP requests for the account lifecycle:
//! - POST /user/signup/ - Register an inactive account and mail a confirmation link
//! - GET /user/confirm_email/{uidb64}/{token}/ - Activate the account
//! - POST /user/token/ - Obtain an access/refresh pair
//! - POST /user/token/refresh/ - Rotate a refresh token
//! - POST /user/token/blacklist/ - Revoke a refresh token
//! - PATCH /user/change_password/ - Change password (authenticated)
//! - POST /user/reset_password/ - Mail a password reset link
//! - PATCH /user/reset_password/{uidb64}/{token}/ - Set a new password

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::JsonBody;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::MessageResponse;
use crate::models::RegisterInput;
use crate::services::TokenPair;

/// Request body for token issuance
#[derive(Debug, Deserialize)]
pub struct TokenObtainRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for refresh token rotation
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Request body for refresh token revocation
#[derive(Debug, Deserialize)]
pub struct BlacklistRequest {
    pub refresh_token: String,
}

/// Request body for password change
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password1: String,
    #[serde(default)]
    pub new_password2: String,
}

/// Request body for a password reset link
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub email: String,
}

/// Request body for setting a new password from a reset link
#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    #[serde(default)]
    pub new_password1: String,
    #[serde(default)]
    pub new_password2: String,
}

/// Response for successful signup
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub username: String,
    pub email: String,
    pub message: String,
}

/// Build public account routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/user/signup/", post(signup))
        .route("/user/confirm_email/{uidb64}/{token}/", get(confirm_email))
        .route("/user/token/", post(obtain_token))
        .route("/user/token/refresh/", post(refresh_token))
        .route("/user/token/blacklist/", post(blacklist_token))
        .route("/user/reset_password/", post(request_password_reset))
        .route("/user/reset_password/{uidb64}/{token}/", patch(reset_password))
}

/// Build protected account routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/user/change_password/", patch(change_password))
}

/// POST /user/signup/
async fn signup(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<RegisterInput>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    let user = state.user_service.signup(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            username: user.username,
            email: user.email,
            message: "Account created. Check your email to activate it.".to_string(),
        }),
    ))
}

/// GET /user/confirm_email/{uidb64}/{token}/
async fn confirm_email(
    State(state): State<AppState>,
    Path((uidb64, token)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.user_service.confirm_email(&uidb64, &token).await?;
    Ok(Json(MessageResponse::new("Account activated")))
}

/// POST /user/token/
async fn obtain_token(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<TokenObtainRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let user = state
        .user_service
        .authenticate(&body.username, &body.password)
        .await?;
    let pair = state.token_service.issue_pair(&user)?;
    tracing::info!("Issued tokens for {}", user.username);
    Ok(Json(pair))
}

/// POST /user/token/refresh/ - The presented token is blacklisted
async fn refresh_token(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    Ok(Json(state.token_service.refresh(&body.refresh).await?))
}

/// POST /user/token/blacklist/
async fn blacklist_token(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<BlacklistRequest>,
) -> Result<StatusCode, ApiError> {
    let claims = state.token_service.revoke(&body.refresh_token).await?;
    tracing::info!("Refresh token revoked for {}", claims.username);
    Ok(StatusCode::RESET_CONTENT)
}

/// PATCH /user/change_password/
async fn change_password(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    JsonBody(body): JsonBody<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .user_service
        .change_password(
            &user,
            &body.old_password,
            &body.new_password1,
            &body.new_password2,
        )
        .await?;
    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// POST /user/reset_password/ - Same answer whether or not the address is known
async fn request_password_reset(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ResetRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.user_service.request_password_reset(&body.email).await?;
    Ok(Json(MessageResponse::new(
        "If the address belongs to an account, a password reset link has been sent",
    )))
}

/// PATCH /user/reset_password/{uidb64}/{token}/
async fn reset_password(
    State(state): State<AppState>,
    Path((uidb64, token)): Path<(String, String)>,
    JsonBody(body): JsonBody<SetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .user_service
        .reset_password(&uidb64, &token, &body.new_password1, &body.new_password2)
        .await?;
    Ok(Json(MessageResponse::new("Password has been reset")))
}
