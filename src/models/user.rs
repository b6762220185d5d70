//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account.
///
/// Accounts start inactive and are activated through the emailed
/// confirmation link; inactive accounts cannot obtain tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2, PHC string)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Free-form profile text
    pub bio: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build an inactive user ready to be inserted.
    ///
    /// The password must already be hashed with
    /// `services::password::hash_password`.
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username,
            email,
            password_hash,
            bio: String::new(),
            is_active: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when this user authored the object owned by `author_id`.
    pub fn owns(&self, author_id: i64) -> bool {
        self.id == author_id
    }
}

/// Input for account signup
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password2: String,
}

impl RegisterInput {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let password = password.into();
        Self {
            username: username.into(),
            email: email.into(),
            password2: password.clone(),
            password,
        }
    }
}

/// Partial profile update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileInput {
    pub bio: Option<String>,
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_is_inactive() {
        let user = User::new("alice".into(), "alice@example.com".into(), "hash".into());
        assert!(!user.is_active);
        assert_eq!(user.id, 0);
        assert!(user.bio.is_empty());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("alice".into(), "alice@example.com".into(), "secret".into());
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
        assert!(!json.contains("password_hash"));
    }

    #[test]
    fn test_register_input_new_confirms_password() {
        let input = RegisterInput::new("bob", "bob@example.com", "pw12345678");
        assert_eq!(input.password, input.password2);
    }
}
