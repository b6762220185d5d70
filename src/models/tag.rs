//! Tag model

use serde::{Deserialize, Serialize};

/// Maximum tagline length in characters
pub const MAX_TAGLINE_LEN: usize = 50;

/// A tag attached to posts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: i64,
    /// Unique label
    pub tagline: String,
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.tagline)
    }
}
