//! One-time account tokens for email confirmation and password reset
//!
//! A token is `<unix-timestamp>-<signature>` where the signature is an
//! HMAC-SHA256 over the user's id, password hash, active flag and the
//! timestamp. Changing any of those (activating the account, setting a new
//! password) invalidates every outstanding token.

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::models::User;

type HmacSha256 = Hmac<Sha256>;

/// What a token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    Activation,
    PasswordReset,
}

impl TokenPurpose {
    fn salt(self) -> &'static str {
        match self {
            TokenPurpose::Activation => "quillpost.account.activation",
            TokenPurpose::PasswordReset => "quillpost.account.password-reset",
        }
    }
}

/// Makes and checks account tokens
#[derive(Clone)]
pub struct AccountTokenGenerator {
    secret: String,
    timeout_secs: i64,
}

impl AccountTokenGenerator {
    pub fn new(secret: impl Into<String>, timeout_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            timeout_secs,
        }
    }

    pub fn make_token(&self, user: &User, purpose: TokenPurpose) -> Result<String> {
        self.make_token_at(user, purpose, Utc::now().timestamp())
    }

    /// True when `token` was made for this user and purpose, the user's
    /// state has not changed since, and it has not expired.
    pub fn check_token(&self, user: &User, purpose: TokenPurpose, token: &str) -> bool {
        self.check_token_at(user, purpose, token, Utc::now().timestamp())
    }

    fn make_token_at(&self, user: &User, purpose: TokenPurpose, timestamp: i64) -> Result<String> {
        let mac = self.mac(user, purpose, timestamp)?;
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{}-{}", timestamp, signature))
    }

    fn check_token_at(&self, user: &User, purpose: TokenPurpose, token: &str, now: i64) -> bool {
        let Some((timestamp, signature)) = token.split_once('-') else {
            return false;
        };
        let Ok(timestamp) = timestamp.parse::<i64>() else {
            return false;
        };
        let Ok(signature) = URL_SAFE_NO_PAD.decode(signature) else {
            return false;
        };

        if now - timestamp > self.timeout_secs || timestamp > now {
            return false;
        }

        match self.mac(user, purpose, timestamp) {
            Ok(mac) => mac.verify_slice(&signature).is_ok(),
            Err(_) => false,
        }
    }

    fn mac(&self, user: &User, purpose: TokenPurpose, timestamp: i64) -> Result<HmacSha256> {
        let key = format!("{}{}", purpose.salt(), self.secret);
        let mut mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|e| anyhow!("Invalid account token key: {}", e))?;
        mac.update(user.id.to_string().as_bytes());
        mac.update(user.password_hash.as_bytes());
        mac.update(if user.is_active { b"1" } else { b"0" });
        mac.update(timestamp.to_string().as_bytes());
        Ok(mac)
    }
}

/// URL-safe encoding of a user id
pub fn encode_uid(id: i64) -> String {
    URL_SAFE_NO_PAD.encode(id.to_string())
}

pub fn decode_uid(uidb64: &str) -> Option<i64> {
    let bytes = URL_SAFE_NO_PAD.decode(uidb64.trim_end_matches('=')).ok()?;
    String::from_utf8(bytes).ok()?.parse().ok()
}
