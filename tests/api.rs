//! End-to-end API tests against an in-memory database.

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

use quillpost::{
    api::{self, AppState},
    config::Config,
    db,
    services::{EmailService, Outbox},
};

const BASE: &str = "http://testserver";
const PASSWORD: &str = "correct-horse-battery";

struct TestApp {
    server: TestServer,
    outbox: Outbox,
}

async fn spawn_app() -> TestApp {
    let pool = db::create_test_pool().await.unwrap();
    db::migrations::run_migrations(&pool).await.unwrap();

    let mut config = Config::default();
    config.server.public_url = BASE.to_string();
    let (email, outbox) = EmailService::in_memory("Quillpost <noreply@testserver>");

    let state = AppState::new(pool, config, email);
    let server = TestServer::new(api::build_router(state)).unwrap();
    TestApp { server, outbox }
}

/// Path part of the first link in the last email sent to `to`
fn link_path(outbox: &Outbox, to: &str) -> String {
    let email = outbox.last_to(to).expect("no email sent");
    let link = email
        .body
        .split_whitespace()
        .find(|word| word.starts_with(BASE))
        .expect("no link in email");
    link.trim_start_matches(BASE).to_string()
}

impl TestApp {
    async fn signup(&self, username: &str) -> String {
        let email = format!("{}@example.com", username);
        let response = self
            .server
            .post("/user/signup/")
            .json(&json!({
                "username": username,
                "email": email,
                "password": PASSWORD,
                "password2": PASSWORD,
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        email
    }

    async fn login(&self, username: &str, password: &str) -> axum_test::TestResponse {
        self.server
            .post("/user/token/")
            .json(&json!({"username": username, "password": password}))
            .await
    }

    /// Sign up, activate and return an access token
    async fn user(&self, username: &str) -> String {
        let email = self.signup(username).await;
        let confirm = self.server.get(&link_path(&self.outbox, &email)).await;
        assert_eq!(confirm.status_code(), StatusCode::OK);

        let response = self.login(username, PASSWORD).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        response.json::<Value>()["access"].as_str().unwrap().to_string()
    }

    async fn create_post(&self, token: &str, body: Value) -> Value {
        let response = self
            .server
            .post("/blog/post/")
            .authorization_bearer(token)
            .json(&body)
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        response.json::<Value>()
    }
}

#[tokio::test]
async fn test_api_root_and_fallback() {
    let app = spawn_app().await;

    let root = app.server.get("/").await.json::<Value>();
    assert_eq!(root["blog"], "http://testserver/blog/");
    assert_eq!(root["signup"], "http://testserver/user/signup/");

    let missing = app.server.get("/nope/").await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(missing.json::<Value>()["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_inactive_account_cannot_log_in() {
    let app = spawn_app().await;
    app.signup("alice").await;

    let response = app.login("alice", PASSWORD).await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let bad_link = app.server.get("/user/confirm_email/Mg/1-abc/").await;
    assert_eq!(bad_link.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signup_validation_errors() {
    let app = spawn_app().await;
    let response = app
        .server
        .post("/user/signup/")
        .json(&json!({
            "username": "bad name!",
            "email": "not-an-email",
            "password": "12345678",
            "password2": "different",
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    let details = &body["error"]["details"];
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(details["username"].is_array());
    assert!(details["email"].is_array());
    assert!(details["password"].is_array() || details["password2"].is_array());
}

#[tokio::test]
async fn test_drafts_hidden_from_others() {
    let app = spawn_app().await;
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;

    for title in ["One", "Two", "Three"] {
        app.create_post(&alice, json!({"title": title, "content": "text", "status": "published"}))
            .await;
    }
    let draft = app
        .create_post(&alice, json!({"title": "Secret", "content": "draft text"}))
        .await;
    assert_eq!(draft["status"], "draft");
    let draft_path = format!("/blog/post/{}/", draft["slug"].as_str().unwrap());

    let listing = app.server.get("/blog/").await.json::<Value>();
    assert_eq!(listing["count"], 3);
    let titles: Vec<_> = listing["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, vec!["Three", "Two", "One"]);
    assert_eq!(listing["sign_up_url"], "http://testserver/user/signup/");

    let own = app
        .server
        .get("/user/profile/alice/posts/")
        .authorization_bearer(&alice)
        .await
        .json::<Value>();
    assert_eq!(own["count"], 4);
    assert_eq!(own["user_profile_url"], "http://testserver/user/profile/alice/");

    let public = app.server.get("/user/profile/alice/posts/").await.json::<Value>();
    assert_eq!(public["count"], 3);

    assert_eq!(app.server.get(&draft_path).await.status_code(), StatusCode::NOT_FOUND);
    let as_bob = app.server.get(&draft_path).authorization_bearer(&bob).await;
    assert_eq!(as_bob.status_code(), StatusCode::NOT_FOUND);
    let as_alice = app.server.get(&draft_path).authorization_bearer(&alice).await;
    assert_eq!(as_alice.status_code(), StatusCode::OK);

    let unknown = app.server.get("/user/profile/alice/likes/").await;
    assert_eq!(unknown.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ownership_and_authentication_errors() {
    let app = spawn_app().await;
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let post = app
        .create_post(&alice, json!({"title": "Mine", "content": "c", "status": "published"}))
        .await;
    let path = format!("/blog/post/{}/", post["slug"].as_str().unwrap());

    let anonymous = app.server.patch(&path).json(&json!({"content": "x"})).await;
    assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);

    let other = app
        .server
        .patch(&path)
        .authorization_bearer(&bob)
        .json(&json!({"content": "x"}))
        .await;
    assert_eq!(other.status_code(), StatusCode::FORBIDDEN);

    let garbage = app.server.get("/blog/").authorization_bearer("not-a-jwt").await;
    assert_eq!(garbage.status_code(), StatusCode::UNAUTHORIZED);

    let deleted = app.server.delete(&path).authorization_bearer(&alice).await;
    assert_eq!(deleted.status_code(), StatusCode::NO_CONTENT);
    assert_eq!(app.server.get(&path).await.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_post_update_and_tags() {
    let app = spawn_app().await;
    let alice = app.user("alice").await;
    let post = app
        .create_post(
            &alice,
            json!({
                "title": "First",
                "content": "<p>hi</p><script>alert(1)</script>",
                "tags": ["rust", " axum ", ""],
            }),
        )
        .await;
    assert_eq!(post["content"], "<p>hi</p>");
    let mut tags: Vec<_> = post["tags"].as_array().unwrap().clone();
    tags.sort_by_key(|t| t.as_str().unwrap().to_string());
    assert_eq!(tags, vec![json!("axum"), json!("rust")]);

    let path = format!("/blog/post/{}/", post["slug"].as_str().unwrap());
    let updated = app
        .server
        .patch(&path)
        .authorization_bearer(&alice)
        .json(&json!({"title": "Renamed", "tags": ["tokio"]}))
        .await
        .json::<Value>();
    assert_eq!(updated["title"], "Renamed");
    assert!(updated["slug"].as_str().unwrap().starts_with("renamed-alice-"));
    assert_eq!(updated["tags"], json!(["tokio"]));
    assert_eq!(updated["content"], "<p>hi</p>");
    assert_eq!(updated["status"], "draft");

    let invalid = app
        .server
        .patch(&format!("/blog/post/{}/", updated["slug"].as_str().unwrap()))
        .authorization_bearer(&alice)
        .json(&json!({"title": "   "}))
        .await;
    assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
    assert!(invalid.json::<Value>()["error"]["details"]["title"].is_array());
}

#[tokio::test]
async fn test_same_title_same_day_gets_distinct_slugs() {
    let app = spawn_app().await;
    let alice = app.user("alice").await;
    let body = json!({"title": "Hello World", "content": "c", "status": "published"});

    let first = app.create_post(&alice, body.clone()).await;
    let second = app.create_post(&alice, body).await;
    assert_ne!(first["slug"], second["slug"]);
    assert!(first["slug"].as_str().unwrap().starts_with("hello-world-alice-"));
}

#[tokio::test]
async fn test_detail_counts_hits_and_likes_toggle() {
    let app = spawn_app().await;
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let post = app
        .create_post(&alice, json!({"title": "Liked", "content": "c", "status": "published"}))
        .await;
    let path = format!("/blog/post/{}/", post["slug"].as_str().unwrap());

    app.server.get(&path).await;
    let detail = app.server.get(&path).await.json::<Value>();
    assert_eq!(detail["hit_count"], 2);

    let like_path = format!("{}like/", path);
    let liked = app.server.get(&like_path).authorization_bearer(&bob).await.json::<Value>();
    assert_eq!(liked, json!({"updated": true, "liked": true, "likes": 1}));

    let detail = app.server.get(&path).authorization_bearer(&bob).await.json::<Value>();
    assert_eq!(detail["is_liked"], true);

    let unliked = app.server.get(&like_path).authorization_bearer(&bob).await.json::<Value>();
    assert_eq!(unliked, json!({"updated": true, "liked": false, "likes": 0}));

    let anonymous = app.server.get(&like_path).await;
    assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_report_only_once() {
    let app = spawn_app().await;
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let post = app
        .create_post(&alice, json!({"title": "Spam", "content": "c", "status": "published"}))
        .await;
    let path = format!("/blog/post/{}/report/", post["slug"].as_str().unwrap());

    let first = app.server.get(&path).authorization_bearer(&bob).await.json::<Value>();
    assert_eq!(first, json!({"updated": true}));
    let second = app.server.get(&path).authorization_bearer(&bob).await.json::<Value>();
    assert_eq!(second, json!({"updated": false, "message": "Post already reported"}));
}

#[tokio::test]
async fn test_comment_threads() {
    let app = spawn_app().await;
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let post = app
        .create_post(&alice, json!({"title": "Talk", "content": "c", "status": "published"}))
        .await;
    let comments = format!("/blog/post/{}/comments/", post["slug"].as_str().unwrap());

    let top = app
        .server
        .post(&comments)
        .authorization_bearer(&bob)
        .json(&json!({"body": "first!"}))
        .await;
    assert_eq!(top.status_code(), StatusCode::CREATED);
    let top = top.json::<Value>();
    assert_eq!(top["status"], "published");
    let top_id = top["id"].as_i64().unwrap();

    let reply = app
        .server
        .post(&comments)
        .authorization_bearer(&alice)
        .json(&json!({"body": "thanks", "parent": top_id}))
        .await
        .json::<Value>();
    assert_eq!(reply["parent"], top_id);

    let nested = app
        .server
        .post(&comments)
        .authorization_bearer(&bob)
        .json(&json!({"body": "too deep", "parent": reply["id"]}))
        .await;
    assert_eq!(nested.status_code(), StatusCode::BAD_REQUEST);
    assert!(nested.json::<Value>()["error"]["details"]["parent"].is_array());

    let listing = app.server.get(&comments).await.json::<Value>();
    assert_eq!(listing["count"], 1);
    assert_eq!(listing["results"][0]["replies_count"], 1);

    let children = app
        .server
        .get(top["children_url"].as_str().unwrap().trim_start_matches(BASE))
        .await
        .json::<Value>();
    assert_eq!(children["count"], 1);
    assert_eq!(children["results"][0]["body"], "thanks");

    let edit_path = format!("{}{}/", comments, top_id);
    let forbidden = app
        .server
        .patch(&edit_path)
        .authorization_bearer(&alice)
        .json(&json!({"body": "edited"}))
        .await;
    assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);

    let bad_id = app.server.get(&format!("{}abc/", comments)).await;
    assert_eq!(bad_id.status_code(), StatusCode::NOT_FOUND);

    let report_path = format!("{}report/", edit_path);
    app.server.get(&report_path).authorization_bearer(&alice).await;
    let again = app.server.get(&report_path).authorization_bearer(&alice).await.json::<Value>();
    assert_eq!(again["message"], "Comment already reported");
}

#[tokio::test]
async fn test_comment_on_draft_post_is_not_found() {
    let app = spawn_app().await;
    let alice = app.user("alice").await;
    let post = app.create_post(&alice, json!({"title": "Draft", "content": "c"})).await;

    let response = app
        .server
        .post(&format!("/blog/post/{}/comments/", post["slug"].as_str().unwrap()))
        .authorization_bearer(&alice)
        .json(&json!({"body": "note to self"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pagination_links_and_invalid_pages() {
    let app = spawn_app().await;
    let alice = app.user("alice").await;
    for i in 0..5 {
        app.create_post(
            &alice,
            json!({"title": format!("Post {}", i), "content": "c", "status": "published"}),
        )
        .await;
    }

    let page = app
        .server
        .get("/blog/")
        .add_query_param("page", 2)
        .add_query_param("page_size", 2)
        .await
        .json::<Value>();
    assert_eq!(page["total_pages"], 3);
    assert_eq!(page["count"], 5);
    assert_eq!(page["links"]["next"], "http://testserver/blog/?page=3&page_size=2");
    assert_eq!(page["links"]["previous"], "http://testserver/blog/?page=1&page_size=2");

    let past_end = app
        .server
        .get("/blog/")
        .add_query_param("page", 4)
        .add_query_param("page_size", 2)
        .await;
    assert_eq!(past_end.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(past_end.json::<Value>()["error"]["message"], "Invalid page.");

    let search = app
        .server
        .get("/blog/")
        .add_query_param("search", "post 3")
        .await
        .json::<Value>();
    assert_eq!(search["count"], 1);
}

/// Query parameters of an absolute listing link
fn link_params(link: &str) -> Vec<(String, String)> {
    link.split_once('?')
        .map(|(_, query)| query)
        .unwrap_or_default()
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn slugs(page: &Value) -> Vec<String> {
    page["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["slug"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_walking_pages_reproduces_full_listing() {
    let app = spawn_app().await;
    let alice = app.user("alice").await;
    for i in 0..11 {
        let status = if i % 4 == 1 { "draft" } else { "published" };
        app.create_post(
            &alice,
            json!({"title": format!("Walk {}", i), "content": "c", "status": status}),
        )
        .await;
    }

    let full = app
        .server
        .get("/blog/")
        .add_query_param("page_size", 50)
        .await
        .json::<Value>();
    let expected = slugs(&full);
    assert_eq!(full["count"], 8);
    assert_eq!(expected.len(), 8);

    let mut walked = Vec::new();
    let mut pages = 0;
    let mut request = app.server.get("/blog/").add_query_param("page_size", 3);
    loop {
        let page = request.await.json::<Value>();
        pages += 1;
        walked.extend(slugs(&page));
        let Some(next) = page["links"]["next"].as_str() else {
            break;
        };
        request = app.server.get("/blog/");
        for (key, value) in link_params(next) {
            request = request.add_query_param(&key, value);
        }
    }

    assert_eq!(pages, 3);
    assert_eq!(walked, expected);
}

#[tokio::test]
async fn test_refresh_rotation_and_blacklist() {
    let app = spawn_app().await;
    app.user("alice").await;
    let pair = app.login("alice", PASSWORD).await.json::<Value>();
    let refresh = pair["refresh"].as_str().unwrap();

    let rotated = app
        .server
        .post("/user/token/refresh/")
        .json(&json!({"refresh": refresh}))
        .await;
    assert_eq!(rotated.status_code(), StatusCode::OK);
    let rotated = rotated.json::<Value>();

    let reused = app
        .server
        .post("/user/token/refresh/")
        .json(&json!({"refresh": refresh}))
        .await;
    assert_eq!(reused.status_code(), StatusCode::UNAUTHORIZED);

    let new_refresh = rotated["refresh"].as_str().unwrap();
    let blacklisted = app
        .server
        .post("/user/token/blacklist/")
        .json(&json!({"refresh_token": new_refresh}))
        .await;
    assert_eq!(blacklisted.status_code(), StatusCode::RESET_CONTENT);

    let after = app
        .server
        .post("/user/token/refresh/")
        .json(&json!({"refresh": new_refresh}))
        .await;
    assert_eq!(after.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_change_and_reset() {
    let app = spawn_app().await;
    let token = app.user("alice").await;

    let wrong_old = app
        .server
        .patch("/user/change_password/")
        .authorization_bearer(&token)
        .json(&json!({
            "old_password": "wrong",
            "new_password1": "another-good-one",
            "new_password2": "another-good-one",
        }))
        .await;
    assert_eq!(wrong_old.status_code(), StatusCode::BAD_REQUEST);

    let changed = app
        .server
        .patch("/user/change_password/")
        .authorization_bearer(&token)
        .json(&json!({
            "old_password": PASSWORD,
            "new_password1": "another-good-one",
            "new_password2": "another-good-one",
        }))
        .await;
    assert_eq!(changed.status_code(), StatusCode::OK);
    assert_eq!(app.login("alice", PASSWORD).await.status_code(), StatusCode::UNAUTHORIZED);

    let unknown = app
        .server
        .post("/user/reset_password/")
        .json(&json!({"email": "nobody@example.com"}))
        .await;
    assert_eq!(unknown.status_code(), StatusCode::OK);
    assert!(app.outbox.last_to("nobody@example.com").is_none());

    app.server
        .post("/user/reset_password/")
        .json(&json!({"email": "ALICE@example.com"}))
        .await;
    let reset_path = link_path(&app.outbox, "alice@example.com");
    assert!(reset_path.starts_with("/user/reset_password/"));

    let reset = app
        .server
        .patch(&reset_path)
        .json(&json!({"new_password1": "fresh-password-1", "new_password2": "fresh-password-1"}))
        .await;
    assert_eq!(reset.status_code(), StatusCode::OK);
    assert_eq!(app.login("alice", "fresh-password-1").await.status_code(), StatusCode::OK);

    let reused = app
        .server
        .patch(&reset_path)
        .json(&json!({"new_password1": "third-password-1", "new_password2": "third-password-1"}))
        .await;
    assert_eq!(reused.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_profile_view_and_edit() {
    let app = spawn_app().await;
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;

    let public = app.server.get("/user/profile/alice/").await.json::<Value>();
    assert_eq!(public["username"], "alice");
    assert!(public.get("email").is_none());
    assert_eq!(public["posts"], "http://testserver/user/profile/alice/posts/");

    let own = app
        .server
        .get("/user/profile/alice/")
        .authorization_bearer(&alice)
        .await
        .json::<Value>();
    assert_eq!(own["email"], "alice@example.com");

    let edited = app
        .server
        .patch("/user/profile/alice/")
        .authorization_bearer(&alice)
        .json(&json!({"bio": "Writes about Rust"}))
        .await
        .json::<Value>();
    assert_eq!(edited["bio"], "Writes about Rust");

    let forbidden = app
        .server
        .patch("/user/profile/alice/")
        .authorization_bearer(&bob)
        .json(&json!({"bio": "hacked"}))
        .await;
    assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);

    let missing = app.server.get("/user/profile/nobody/").await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
}

async fn bob_comments(app: &TestApp, token: &str) -> Value {
    app.server
        .get("/user/profile/bob/comments/")
        .authorization_bearer(token)
        .await
        .json::<Value>()
}

#[tokio::test]
async fn test_own_comments_skip_posts_turned_draft() {
    let app = spawn_app().await;
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let post = app
        .create_post(&alice, json!({"title": "Open", "content": "c", "status": "published"}))
        .await;
    let slug = post["slug"].as_str().unwrap();

    let created = app
        .server
        .post(&format!("/blog/post/{}/comments/", slug))
        .authorization_bearer(&bob)
        .json(&json!({"body": "nice"}))
        .await;
    assert_eq!(created.status_code(), StatusCode::CREATED);

    assert_eq!(bob_comments(&app, &bob).await["count"], 1);

    let hidden = app
        .server
        .patch(&format!("/blog/post/{}/", slug))
        .authorization_bearer(&alice)
        .json(&json!({"status": "draft"}))
        .await;
    assert_eq!(hidden.status_code(), StatusCode::OK);

    let own = bob_comments(&app, &bob).await;
    assert_eq!(own["count"], 0);
    assert!(own["results"].as_array().unwrap().is_empty());
    assert_eq!(bob_comments(&app, &alice).await["count"], 0);
}
