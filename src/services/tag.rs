//! Tag service
//!
//! Tags are attached to posts by tagline. Saving a post reconciles its tag
//! set against the requested taglines: missing tags are created or reused,
//! tags no longer listed are detached.

use crate::db::repositories::TagRepository;
use crate::models::{Tag, MAX_TAGLINE_LEN};
use crate::services::{check_max_chars, FieldErrors};
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Trim and deduplicate requested taglines, dropping empty ones.
///
/// Order of first appearance is kept. Overlong taglines are reported under
/// the `tags` field.
pub fn normalize_taglines(raw: &[String]) -> Result<Vec<String>, FieldErrors> {
    let mut errors = FieldErrors::new();
    let mut seen = HashSet::new();
    let mut taglines = Vec::new();

    for tagline in raw.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        check_max_chars(&mut errors, "tags", tagline, MAX_TAGLINE_LEN);
        if seen.insert(tagline) {
            taglines.push(tagline.to_string());
        }
    }

    errors.into_result().map(|_| taglines)
}

/// Tag service for post tagging
pub struct TagService {
    repo: Arc<dyn TagRepository>,
}

impl TagService {
    pub fn new(repo: Arc<dyn TagRepository>) -> Self {
        Self { repo }
    }

    /// Make the post's tags exactly `taglines` (already normalized).
    pub async fn reconcile(&self, post_id: i64, taglines: &[String]) -> Result<Vec<Tag>> {
        let current = self.repo.get_by_post(post_id).await?;
        let wanted: HashSet<&str> = taglines.iter().map(String::as_str).collect();
        let present: HashSet<&str> = current.iter().map(|t| t.tagline.as_str()).collect();

        for tag in current.iter().filter(|t| !wanted.contains(t.tagline.as_str())) {
            self.repo.detach(post_id, tag.id).await?;
        }

        for tagline in taglines.iter().filter(|t| !present.contains(t.as_str())) {
            let tag = self.repo.get_or_create(tagline).await?;
            self.repo.attach(post_id, tag.id).await?;
        }

        self.repo.get_by_post(post_id).await
    }

    pub async fn tags_for_post(&self, post_id: i64) -> Result<Vec<Tag>> {
        self.repo.get_by_post(post_id).await
    }

    pub async fn tags_for_posts(&self, post_ids: &[i64]) -> Result<HashMap<i64, Vec<Tag>>> {
        self.repo.get_by_posts(post_ids).await
    }
}
