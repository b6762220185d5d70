//! HTML sanitization for post content
//!
//! Content is reduced to a small set of formatting tags. Inline styles keep
//! only colour and size properties, and images must point at an absolute
//! http(s) URL.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::services::{compiled, LazyRegex};
use std::borrow::Cow;
use std::collections::HashSet;

const ALLOWED_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "table", "tbody", "tr", "td", "img", "strong", "em", "u",
    "s", "hr", "p", "a", "span", "ol", "ul", "li", "pre", "div", "q", "big", "kbd", "ins", "small",
    "code", "var", "del", "cite", "sup", "sub",
];

const ALLOWED_STYLE_PROPERTIES: &[&str] = &["color", "width", "height"];

static SANITIZER: Lazy<ammonia::Builder<'static>> = Lazy::new(|| {
    let mut builder = ammonia::Builder::empty();
    builder
        .add_tags(ALLOWED_TAGS)
        .add_clean_content_tags(&["script", "style"])
        .add_generic_attributes(&["style"])
        .add_tag_attributes("img", &["src", "alt"])
        .add_tag_attributes("a", &["href", "title"])
        .add_url_schemes(&["http", "https", "mailto"])
        .attribute_filter(|_element, attribute, value| {
            if attribute == "style" {
                filter_style(value).map(Cow::Owned)
            } else {
                Some(Cow::Borrowed(value))
            }
        });
    builder
});

/// Matches a whole `<img ...>` tag, quoted attribute values included
static IMG_TAG: LazyRegex = Lazy::new(|| Regex::new(r#"<img\b(?:[^>"]|"[^"]*")*>"#));

static IMG_SRC: LazyRegex = Lazy::new(|| Regex::new(r#"\ssrc="([^"]*)""#));

/// Sanitize user-supplied HTML.
pub fn sanitize_html(html: &str) -> anyhow::Result<String> {
    let cleaned = SANITIZER.clean(html).to_string();
    Ok(strip_non_http_images(&cleaned, compiled(&IMG_TAG)?, compiled(&IMG_SRC)?))
}

/// Keep only whitelisted declarations of a `style` attribute.
fn filter_style(value: &str) -> Option<String> {
    let allowed: HashSet<&str> = ALLOWED_STYLE_PROPERTIES.iter().copied().collect();
    let kept: Vec<String> = value
        .split(';')
        .filter_map(|declaration| {
            let (property, val) = declaration.split_once(':')?;
            let property = property.trim().to_ascii_lowercase();
            let val = val.trim();
            (allowed.contains(property.as_str()) && !val.is_empty())
                .then(|| format!("{}: {}", property, val))
        })
        .collect();

    if kept.is_empty() {
        None
    } else {
        Some(kept.join("; "))
    }
}

fn strip_non_http_images(html: &str, img_tag: &Regex, img_src: &Regex) -> String {
    img_tag
        .replace_all(html, |caps: &Captures| {
            let tag = &caps[0];
            let keep = img_src
                .captures(tag)
                .is_some_and(|src| src[1].starts_with("http"));
            if keep {
                tag.to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}
