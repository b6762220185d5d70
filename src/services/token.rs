//! JWT access and refresh tokens
//!
//! Both kinds are HS256 JWTs signed with the server secret. Refresh tokens
//! are single use: refreshing blacklists the presented token's `jti` and
//! issues a new pair.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::db::repositories::TokenBlacklistRepository;
use crate::models::User;

/// Error types for token operations
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Malformed, wrongly signed or expired token
    #[error("Token is invalid or expired")]
    Invalid,

    /// A refresh token was presented where an access token is required, or
    /// the other way round
    #[error("Token has wrong type")]
    WrongType,

    /// Refresh token already used or blacklisted
    #[error("Token is blacklisted")]
    Blacklisted,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub username: String,
    pub token_type: TokenType,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, TokenError> {
        self.sub.parse().map_err(|_| TokenError::Invalid)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or_else(Utc::now)
    }
}

/// An access/refresh pair as returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issues, verifies and revokes JWTs
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
    blacklist: Arc<dyn TokenBlacklistRepository>,
}

impl TokenService {
    pub fn new(config: &AuthConfig, blacklist: Arc<dyn TokenBlacklistRepository>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret_key.as_bytes()),
            access_lifetime: Duration::minutes(config.access_token_minutes),
            refresh_lifetime: Duration::days(config.refresh_token_days),
            blacklist,
        }
    }

    /// Issue a fresh access/refresh pair for a user
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, TokenError> {
        self.issue_pair_for(user.id, &user.username)
    }

    /// Verify an access token and return its claims
    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.decode_as(token, TokenType::Access)
    }

    /// Rotate a refresh token: blacklist it and issue a new pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, TokenError> {
        let claims = self.revoke(refresh_token).await?;
        self.issue_pair_for(claims.user_id()?, &claims.username)
    }

    /// Blacklist a refresh token so it can no longer be used.
    pub async fn revoke(&self, refresh_token: &str) -> Result<Claims, TokenError> {
        let claims = self.decode_as(refresh_token, TokenType::Refresh)?;
        let newly_blacklisted = self
            .blacklist
            .blacklist(&claims.jti, claims.user_id()?, claims.expires_at())
            .await?;
        if !newly_blacklisted {
            tracing::warn!("Rejected reuse of refresh token {}", claims.jti);
            return Err(TokenError::Blacklisted);
        }
        Ok(claims)
    }

    /// Delete blacklist entries whose tokens have expired anyway.
    ///
    /// Maintenance operation, run periodically by the server.
    pub async fn purge_expired(&self) -> Result<u64, TokenError> {
        let removed = self.blacklist.purge_expired(Utc::now()).await?;
        if removed > 0 {
            tracing::info!("Purged {} expired blacklisted token(s)", removed);
        }
        Ok(removed)
    }

    fn issue_pair_for(&self, user_id: i64, username: &str) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.encode_token(user_id, username, TokenType::Access)?,
            refresh: self.encode_token(user_id, username, TokenType::Refresh)?,
        })
    }

    fn encode_token(
        &self,
        user_id: i64,
        username: &str,
        token_type: TokenType,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let lifetime = match token_type {
            TokenType::Access => self.access_lifetime,
            TokenType::Refresh => self.refresh_lifetime,
        };
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            token_type,
            jti: Uuid::new_v4().simple().to_string(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::InternalError(anyhow::anyhow!("Failed to sign token: {}", e)))
    }

    fn decode_as(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!("Token rejected: {}", e);
                TokenError::Invalid
            })?
            .claims;

        if claims.token_type != expected {
            return Err(TokenError::WrongType);
        }
        Ok(claims)
    }
}
