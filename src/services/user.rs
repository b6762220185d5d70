//! User service
//!
//! Account lifecycle:
//! - Signup creates an inactive user and mails a confirmation link
//! - Confirming the link activates the account
//! - Password change (authenticated) and password reset (by emailed link)
//! - Credential checks for token issuance
//! - Profile reads and owner-only profile edits

use crate::db::is_unique_violation;
use crate::db::repositories::UserRepository;
use crate::models::{RegisterInput, UpdateProfileInput, User};
use crate::services::account_token::{decode_uid, encode_uid, AccountTokenGenerator, TokenPurpose};
use crate::services::email::EmailService;
use crate::services::password::{hash_password, validate_password, verify_password};
use crate::services::{check_max_chars, compiled, FieldErrors, LazyRegex, BLANK_MESSAGE};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Longest accepted bio, in characters
pub const MAX_BIO_LEN: usize = 500;

const MAX_USERNAME_LEN: usize = 150;
const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";

static USERNAME_RE: LazyRegex = Lazy::new(|| Regex::new(r"^[\w.@+-]+$"));
static EMAIL_RE: LazyRegex = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$"));

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid input
    #[error("Validation error: {0}")]
    Validation(FieldErrors),

    /// Unknown user, wrong password or inactive account
    #[error("No active account found with the given credentials")]
    InvalidCredentials,

    /// Bad uid or expired/used token in an account link
    #[error("Activation link is invalid or has expired")]
    InvalidLink,

    #[error("User not found")]
    NotFound,

    /// Requester may not modify this profile
    #[error("You do not have permission to modify this profile")]
    Forbidden,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<FieldErrors> for UserServiceError {
    fn from(errors: FieldErrors) -> Self {
        UserServiceError::Validation(errors)
    }
}

/// User service for accounts and authentication
pub struct UserService {
    repo: Arc<dyn UserRepository>,
    tokens: AccountTokenGenerator,
    email: Arc<EmailService>,
    base_url: String,
}

impl UserService {
    /// `base_url` is the public URL used to build account links.
    pub fn new(
        repo: Arc<dyn UserRepository>,
        tokens: AccountTokenGenerator,
        email: Arc<EmailService>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            tokens,
            email,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Register an inactive account and mail its confirmation link.
    pub async fn signup(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_lowercase();

        let mut errors = FieldErrors::new();
        validate_username(&mut errors, &username)?;
        validate_email(&mut errors, &email)?;

        if !errors.contains("username") && self.repo.get_by_username(&username).await?.is_some() {
            errors.add("username", "A user with that username already exists.");
        }
        if !errors.contains("email") && self.repo.get_by_email(&email).await?.is_some() {
            errors.add("email", "A user with that email already exists.");
        }

        if input.password.is_empty() {
            errors.add("password", BLANK_MESSAGE);
        } else if input.password != input.password2 {
            errors.add("password2", PASSWORD_MISMATCH);
        } else {
            for problem in validate_password(&input.password, &username) {
                errors.add("password", problem);
            }
        }
        errors.into_result()?;

        let password_hash = hash_password(&input.password)?;
        let user = match self
            .repo
            .create(&User::new(username, email, password_hash))
            .await
        {
            Ok(user) => user,
            Err(err) if is_unique_violation(&err) => {
                return Err(FieldErrors::single(
                    "username",
                    "A user with that username or email already exists.",
                )
                .into());
            }
            Err(err) => return Err(err.into()),
        };

        let link = self.account_link("user/confirm_email", &user, TokenPurpose::Activation)?;
        if let Err(err) = self.email.send_activation(&user.email, &user.username, &link).await {
            tracing::warn!("Failed to send activation email to {}: {:#}", user.email, err);
        }

        tracing::info!("User {} signed up", user.username);
        Ok(user)
    }

    /// Activate the account named by an emailed confirmation link.
    pub async fn confirm_email(&self, uidb64: &str, token: &str) -> Result<User, UserServiceError> {
        let mut user = self.user_for_link(uidb64, token, TokenPurpose::Activation).await?;
        self.repo.set_active(user.id, true).await?;
        user.is_active = true;
        tracing::info!("User {} activated", user.username);
        Ok(user)
    }

    /// Check credentials for token issuance. Inactive accounts are rejected.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, UserServiceError> {
        let Some(user) = self.repo.get_by_username(username.trim()).await? else {
            return Err(UserServiceError::InvalidCredentials);
        };
        if !user.is_active || !verify_password(password, &user.password_hash)? {
            tracing::warn!("Failed login for {}", user.username);
            return Err(UserServiceError::InvalidCredentials);
        }
        Ok(user)
    }

    /// Change the password of a signed-in user.
    pub async fn change_password(
        &self,
        user: &User,
        old_password: &str,
        new_password1: &str,
        new_password2: &str,
    ) -> Result<(), UserServiceError> {
        let mut errors = FieldErrors::new();
        if !verify_password(old_password, &user.password_hash)? {
            errors.add(
                "old_password",
                "Your old password was entered incorrectly. Please enter it again.",
            );
        }
        check_new_password(&mut errors, &user.username, new_password1, new_password2);
        errors.into_result()?;

        self.repo
            .set_password(user.id, &hash_password(new_password1)?)
            .await?;
        tracing::info!("User {} changed their password", user.username);
        Ok(())
    }

    /// Mail a reset link if the address belongs to an account.
    ///
    /// Unknown addresses succeed silently.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), UserServiceError> {
        let Some(user) = self.repo.get_by_email(email.trim()).await? else {
            tracing::debug!("Password reset requested for unknown address");
            return Ok(());
        };

        let link = self.account_link("user/reset_password", &user, TokenPurpose::PasswordReset)?;
        if let Err(err) = self.email.send_password_reset(&user.email, &user.username, &link).await {
            tracing::warn!("Failed to send password reset email to {}: {:#}", user.email, err);
        }
        Ok(())
    }

    /// Set a new password through an emailed reset link.
    pub async fn reset_password(
        &self,
        uidb64: &str,
        token: &str,
        new_password1: &str,
        new_password2: &str,
    ) -> Result<(), UserServiceError> {
        let user = self.user_for_link(uidb64, token, TokenPurpose::PasswordReset).await?;

        let mut errors = FieldErrors::new();
        check_new_password(&mut errors, &user.username, new_password1, new_password2);
        errors.into_result()?;

        self.repo
            .set_password(user.id, &hash_password(new_password1)?)
            .await?;
        tracing::info!("User {} reset their password", user.username);
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.repo.get_by_id(id).await?)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<User, UserServiceError> {
        self.repo
            .get_by_username(username)
            .await?
            .ok_or(UserServiceError::NotFound)
    }

    /// Edit bio and email of `username`; only that user may.
    pub async fn update_profile(
        &self,
        username: &str,
        requester: &User,
        input: UpdateProfileInput,
    ) -> Result<User, UserServiceError> {
        let user = self.get_by_username(username).await?;
        if !requester.owns(user.id) {
            return Err(UserServiceError::Forbidden);
        }

        let mut errors = FieldErrors::new();
        let bio = input.bio.unwrap_or_else(|| user.bio.clone());
        check_max_chars(&mut errors, "bio", &bio, MAX_BIO_LEN);

        let email = match input.email {
            Some(email) => {
                let email = email.trim().to_lowercase();
                validate_email(&mut errors, &email)?;
                if !errors.contains("email") {
                    if let Some(other) = self.repo.get_by_email(&email).await? {
                        if other.id != user.id {
                            errors.add("email", "A user with that email already exists.");
                        }
                    }
                }
                email
            }
            None => user.email.clone(),
        };
        errors.into_result()?;

        match self.repo.update_profile(user.id, &bio, &email).await {
            Ok(()) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(FieldErrors::single("email", "A user with that email already exists.").into());
            }
            Err(err) => return Err(err.into()),
        }

        Ok(User {
            bio,
            email,
            ..user
        })
    }

    fn account_link(
        &self,
        path: &str,
        user: &User,
        purpose: TokenPurpose,
    ) -> Result<String, UserServiceError> {
        let token = self.tokens.make_token(user, purpose)?;
        Ok(format!(
            "{}/{}/{}/{}/",
            self.base_url,
            path,
            encode_uid(user.id),
            token
        ))
    }

    async fn user_for_link(
        &self,
        uidb64: &str,
        token: &str,
        purpose: TokenPurpose,
    ) -> Result<User, UserServiceError> {
        let Some(id) = decode_uid(uidb64) else {
            return Err(UserServiceError::InvalidLink);
        };
        match self.repo.get_by_id(id).await? {
            Some(user) if self.tokens.check_token(&user, purpose, token) => Ok(user),
            _ => {
                tracing::warn!("Rejected {:?} link for uid {}", purpose, id);
                Err(UserServiceError::InvalidLink)
            }
        }
    }
}

fn validate_username(errors: &mut FieldErrors, username: &str) -> anyhow::Result<()> {
    if username.is_empty() {
        errors.add("username", BLANK_MESSAGE);
        return Ok(());
    }
    check_max_chars(errors, "username", username, MAX_USERNAME_LEN);
    if !compiled(&USERNAME_RE)?.is_match(username) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
    Ok(())
}

fn validate_email(errors: &mut FieldErrors, email: &str) -> anyhow::Result<()> {
    if email.is_empty() {
        errors.add("email", BLANK_MESSAGE);
    } else if !compiled(&EMAIL_RE)?.is_match(email) {
        errors.add("email", "Enter a valid email address.");
    }
    Ok(())
}

fn check_new_password(errors: &mut FieldErrors, username: &str, new1: &str, new2: &str) {
    if new1.is_empty() {
        errors.add("new_password1", BLANK_MESSAGE);
    } else if new1 != new2 {
        errors.add("new_password2", PASSWORD_MISMATCH);
    } else {
        for problem in validate_password(new1, username) {
            errors.add("new_password2", problem);
        }
    }
}
