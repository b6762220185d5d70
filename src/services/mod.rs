//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories. They are
//! responsible for:
//! - Validating input and collecting field errors
//! - Enforcing visibility and ownership rules
//! - Allocating slugs, sanitizing HTML and reconciling tags
//! - Issuing and checking account tokens and JWTs

pub mod account_token;
pub mod comment;
pub mod email;
pub mod password;
pub mod post;
pub mod sanitize;
pub mod tag;
pub mod token;
pub mod user;

pub use account_token::{decode_uid, encode_uid, AccountTokenGenerator, TokenPurpose};
pub use comment::{CommentService, CommentServiceError};
pub use email::{EmailService, OutgoingEmail, Outbox};
pub use password::{hash_password, validate_password, verify_password};
pub use post::{slugify, PostDetail, PostService, PostServiceError, EXCERPT_LEN};
pub use sanitize::sanitize_html;
pub use tag::{normalize_taglines, TagService};
pub use token::{Claims, TokenError, TokenPair, TokenService, TokenType};
pub use user::{UserService, UserServiceError};

use anyhow::anyhow;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A lazily compiled pattern; compile errors surface on first use
pub(crate) type LazyRegex = Lazy<Result<Regex, regex::Error>>;

pub const BLANK_MESSAGE: &str = "This field may not be blank.";
pub const REQUIRED_MESSAGE: &str = "This field is required.";

/// Validation failures keyed by input field name.
///
/// Serializes as `{"field": ["message", ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// A collection holding one message
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn extend(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Require a non-blank string field, returning it trimmed.
pub(crate) fn required_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&str>,
    max_chars: usize,
) -> Option<String> {
    match value.map(str::trim) {
        None => {
            errors.add(field, REQUIRED_MESSAGE);
            None
        }
        Some("") => {
            errors.add(field, BLANK_MESSAGE);
            None
        }
        Some(text) => {
            check_max_chars(errors, field, text, max_chars);
            Some(text.to_string())
        }
    }
}

pub(crate) fn check_max_chars(errors: &mut FieldErrors, field: &str, text: &str, max_chars: usize) {
    if text.chars().count() > max_chars {
        errors.add(
            field,
            format!("Ensure this field has no more than {} characters.", max_chars),
        );
    }
}

pub(crate) fn compiled(pattern: &'static LazyRegex) -> anyhow::Result<&'static Regex> {
    pattern
        .as_ref()
        .map_err(|e| anyhow!("Regex error: {}", e))
}
