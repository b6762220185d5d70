//! Common API utilities and shared types
//!
//! Pagination query parsing, the paginated response envelope, absolute URL
//! building and a JSON body extractor whose rejections use `ApiError`.

use axum::extract::{rejection::JsonRejection, FromRequest};
use serde::{Deserialize, Serialize};

use crate::api::middleware::ApiError;
use crate::models::{ListParams, PagedResult, User, DEFAULT_PAGE_SIZE};

// ============================================================================
// Request bodies
// ============================================================================

/// `axum::Json` with rejections reported as `VALIDATION_ERROR`
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation_error(rejection.body_text())
    }
}

/// Parse a numeric path segment, treating garbage as a missing object
pub fn parse_id(raw: &str, what: &str) -> Result<i64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::not_found(format!("{} not found", what)))
}

// ============================================================================
// URLs
// ============================================================================

/// Builds absolute URLs below the public base URL
#[derive(Debug, Clone, Copy)]
pub struct Urls<'a> {
    base: &'a str,
}

impl<'a> Urls<'a> {
    pub fn new(base: &'a str) -> Self {
        Self { base }
    }

    pub fn absolute(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn blog(&self) -> String {
        self.absolute("/blog/")
    }

    pub fn new_post(&self) -> String {
        self.absolute("/blog/post/")
    }

    pub fn post(&self, slug: &str) -> String {
        self.absolute(&format!("/blog/post/{}/", urlencoding::encode(slug)))
    }

    pub fn comments(&self, slug: &str) -> String {
        format!("{}comments/", self.post(slug))
    }

    pub fn comment(&self, slug: &str, id: i64) -> String {
        format!("{}{}/", self.comments(slug), id)
    }

    pub fn children(&self, slug: &str, id: i64) -> String {
        format!("{}children/", self.comment(slug, id))
    }

    pub fn profile(&self, username: &str) -> String {
        self.absolute(&format!("/user/profile/{}/", urlencoding::encode(username)))
    }

    pub fn profile_objects(&self, username: &str, object_type: &str) -> String {
        format!("{}{}/", self.profile(username), object_type)
    }

    pub fn signup(&self) -> String {
        self.absolute("/user/signup/")
    }

    pub fn token(&self) -> String {
        self.absolute("/user/token/")
    }
}

// ============================================================================
// Pagination
// ============================================================================

/// Pagination and search query parameters.
///
/// Kept as strings so that malformed values can be answered the same way
/// as out-of-range ones.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub search: Option<String>,
}

impl PageQuery {
    /// Page 0, or a page that is not a number, is an invalid page.
    pub fn params(&self) -> Result<ListParams, ApiError> {
        let page = match self.page.as_deref() {
            None => 1,
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| invalid_page())?,
        };
        let page_size = self
            .page_size
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Ok(ListParams::new(page, page_size))
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Query string for another page, keeping page size and search
    fn query_string(&self, page: u32) -> String {
        let mut parts = vec![format!("page={}", page)];
        if let Some(size) = &self.page_size {
            parts.push(format!("page_size={}", urlencoding::encode(size)));
        }
        if let Some(search) = &self.search {
            parts.push(format!("search={}", urlencoding::encode(search)));
        }
        parts.join("&")
    }
}

fn invalid_page() -> ApiError {
    ApiError::not_found("Invalid page.")
}

#[derive(Debug, Serialize)]
pub struct PageLinks {
    pub next: Option<String>,
    pub previous: Option<String>,
}

/// Paginated list response
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub links: PageLinks,
    pub count: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_profile_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_new_post_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_obtain_pair: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign_up_url: Option<String>,
    pub results: Vec<T>,
}

/// Wrap one page of results in the response envelope.
///
/// `listing` is the absolute URL of the listing itself. Out of range pages
/// are rejected, except page 1 of an empty listing.
pub fn paginate<T, U>(
    result: PagedResult<T>,
    query: &PageQuery,
    urls: Urls<'_>,
    listing: &str,
    viewer: Option<&User>,
    to_item: impl FnMut(T) -> U,
) -> Result<Paginated<U>, ApiError> {
    if !result.is_valid_page() {
        return Err(invalid_page());
    }

    let link = |page: u32| format!("{}?{}", listing, query.query_string(page));
    let links = PageLinks {
        next: result.has_next().then(|| link(result.page + 1)),
        previous: result.has_prev().then(|| link(result.page - 1)),
    };
    let total_pages = result.total_pages();

    let (user_profile_url, create_new_post_url, token_obtain_pair, sign_up_url) = match viewer {
        Some(user) => (Some(urls.profile(&user.username)), Some(urls.new_post()), None, None),
        None => (None, None, Some(urls.token()), Some(urls.signup())),
    };

    let page = result.page;
    let page_size = result.per_page;
    let count = result.total;
    Ok(Paginated {
        links,
        count,
        page,
        page_size,
        total_pages,
        user_profile_url,
        create_new_post_url,
        token_obtain_pair,
        sign_up_url,
        results: result.items.into_iter().map(to_item).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn query(page: Option<&str>, size: Option<&str>, search: Option<&str>) -> PageQuery {
        PageQuery {
            page: page.map(str::to_string),
            page_size: size.map(str::to_string),
            search: search.map(str::to_string),
        }
    }

    fn user() -> User {
        User::new("alice".into(), "alice@example.com".into(), "h".into())
    }

    #[test]
    fn test_params_defaults_and_clamping() {
        assert_eq!(query(None, None, None).params().unwrap(), ListParams::new(1, 15));
        assert_eq!(query(Some("2"), Some("500"), None).params().unwrap().per_page, 50);
        assert_eq!(query(None, Some("junk"), None).params().unwrap().per_page, 15);
        assert!(query(Some("abc"), None, None).params().is_err());
    }

    #[test]
    fn test_links_keep_page_size_and_search() {
        let q = query(Some("2"), Some("2"), Some("rust axum"));
        let params = q.params().unwrap();
        let result = PagedResult::new(vec![3, 4], 5, &params);
        let page = paginate(result, &q, Urls::new("http://h"), "http://h/blog/", None, |x| x).unwrap();

        assert_eq!(
            page.links.next.as_deref(),
            Some("http://h/blog/?page=3&page_size=2&search=rust%20axum")
        );
        assert_eq!(
            page.links.previous.as_deref(),
            Some("http://h/blog/?page=1&page_size=2&search=rust%20axum")
        );
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.sign_up_url.as_deref(), Some("http://h/user/signup/"));
        assert!(page.user_profile_url.is_none());
    }

    #[test]
    fn test_authenticated_extras() {
        let q = PageQuery::default();
        let result: PagedResult<i32> = PagedResult::new(vec![], 0, &q.params().unwrap());
        let viewer = user();
        let page = paginate(result, &q, Urls::new("http://h"), "http://h/blog/", Some(&viewer), |x| x).unwrap();

        assert_eq!(page.user_profile_url.as_deref(), Some("http://h/user/profile/alice/"));
        assert_eq!(page.create_new_post_url.as_deref(), Some("http://h/blog/post/"));
        assert!(page.token_obtain_pair.is_none());
        assert!(page.links.next.is_none() && page.links.previous.is_none());

        let json = serde_json::to_value(&page).unwrap();
        assert!(json.get("sign_up_url").is_none());
        assert_eq!(json["count"], 0);
    }

    #[test]
    fn test_invalid_pages_rejected() {
        let q = query(Some("4"), Some("10"), None);
        let result: PagedResult<i32> = PagedResult::new(vec![], 30, &q.params().unwrap());
        assert!(paginate(result, &q, Urls::new("http://h"), "http://h/blog/", None, |x| x).is_err());

        let q = query(Some("0"), None, None);
        let result: PagedResult<i32> = PagedResult::new(vec![], 30, &q.params().unwrap());
        assert!(paginate(result, &q, Urls::new("http://h"), "http://h/blog/", None, |x| x).is_err());
    }

    #[test]
    fn test_urls() {
        let urls = Urls::new("http://h");
        assert_eq!(urls.children("a-b", 7), "http://h/blog/post/a-b/comments/7/children/");
        assert_eq!(urls.profile_objects("bob", "posts"), "http://h/user/profile/bob/posts/");
        assert_eq!(urls.profile("a+b@c"), "http://h/user/profile/a%2Bb%40c/");
    }

    proptest! {
        #[test]
        fn prop_next_link_iff_not_last_page(total in 0i64..200, size in 1u32..60, page in 1u32..20) {
            let q = query(Some(&page.to_string()), Some(&size.to_string()), None);
            let params = q.params().unwrap();
            let result: PagedResult<i32> = PagedResult::new(vec![], total, &params);
            let pages = result.total_pages();
            match paginate(result, &q, Urls::new("http://h"), "http://h/blog/", None, |x| x) {
                Ok(envelope) => {
                    prop_assert!(page <= pages);
                    prop_assert_eq!(envelope.links.next.is_some(), page < pages);
                    prop_assert_eq!(envelope.links.previous.is_some(), page > 1);
                }
                Err(_) => prop_assert!(page > pages),
            }
        }
    }
}
