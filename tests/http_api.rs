//! End-to-end tests for the JSON API.
//!
//! Requests go through the full router (auth middleware included) via
//! `tower::ServiceExt::oneshot`. Remote feeds are served by wiremock on
//! loopback, so private feed hosts are allowed in the test state.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use feedbox::api::{create_router, AppState};
use feedbox::auth::issue_token;
use feedbox::feed::{HttpFeedSource, RefreshPolicy, Refresher};
use feedbox::storage::{Database, NewSubscription};
use http_body_util::BodyExt;
use secrecy::ExposeSecret;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Mock Blog</title>
    <link>https://blog.example.com/</link>
    <description>Posts</description>
    <item><title>One</title><link>https://blog.example.com/1</link></item>
    <item><title>Two</title><link>https://blog.example.com/2</link></item>
  </channel>
</rss>"#;

struct TestApp {
    router: Router,
    db: Database,
    token: String,
}

async fn test_app(auth_disabled: bool) -> TestApp {
    test_app_with_policy(auth_disabled, RefreshPolicy::Isolate).await
}

async fn test_app_with_policy(auth_disabled: bool, policy: RefreshPolicy) -> TestApp {
    let db = Database::open(":memory:").await.unwrap();
    let source = HttpFeedSource::new(reqwest::Client::new())
        .with_max_retries(0)
        .with_retry_base(Duration::from_millis(10));
    let refresher = Arc::new(Refresher::new(db.clone(), source).with_policy(policy));
    let issued = issue_token(&db, None).await.unwrap();

    let router = create_router(AppState {
        db: db.clone(),
        refresher,
        auth_disabled,
        allow_private_feeds: true,
    });

    TestApp {
        router,
        db,
        token: issued.token.expose_secret().to_string(),
    }
}

async fn mock_feed(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, header::HeaderMap, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, body.to_vec())
    }

    fn request(&self, method: &str, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
    }

    async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let (status, _, body) = self
            .send(self.request("GET", uri).body(Body::empty()).unwrap())
            .await;
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    async fn post(&self, uri: &str) -> StatusCode {
        self.send(self.request("POST", uri).body(Body::empty()).unwrap())
            .await
            .0
    }

    async fn delete(&self, uri: &str) -> StatusCode {
        self.send(self.request("DELETE", uri).body(Body::empty()).unwrap())
            .await
            .0
    }

    async fn subscribe(&self, url: &str) -> (StatusCode, header::HeaderMap, Value) {
        let body = serde_json::json!({ "url": url }).to_string();
        let (status, headers, body) = self
            .send(
                self.request("POST", "/subscribe")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await;
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, headers, json)
    }
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_missing_token_is_rejected() {
    let app = test_app(false).await;
    let request = Request::builder().uri("/ping").body(Body::empty()).unwrap();

    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_unknown_token_is_rejected() {
    let app = test_app(false).await;
    let request = Request::builder()
        .uri("/ping")
        .header(header::AUTHORIZATION, "Bearer not-a-real-token")
        .body(Body::empty())
        .unwrap();

    assert_eq!(app.send(request).await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_valid_token_is_accepted() {
    let app = test_app(false).await;
    let (status, _, body) = app
        .send(app.request("GET", "/ping").body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"pong");
}

#[tokio::test]
async fn test_lowercase_bearer_scheme_is_accepted() {
    let app = test_app(false).await;
    let request = Request::builder()
        .uri("/ping")
        .header(header::AUTHORIZATION, format!("bearer {}", app.token))
        .body(Body::empty())
        .unwrap();

    assert_eq!(app.send(request).await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_expired_token_is_rejected_and_deleted() {
    let app = test_app(false).await;
    let expired = issue_token(&app.db, Some(chrono::Duration::seconds(-60)))
        .await
        .unwrap();

    let request = Request::builder()
        .uri("/ping")
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", expired.token.expose_secret()),
        )
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(request).await.0, StatusCode::UNAUTHORIZED);

    let stored = app.db.find_token(&expired.record.token_hash).await.unwrap();
    assert!(stored.is_none());
}

#[tokio::test]
async fn test_disabled_auth_accepts_anonymous_requests() {
    let app = test_app(true).await;
    let request = Request::builder().uri("/ping").body(Body::empty()).unwrap();

    assert_eq!(app.send(request).await.0, StatusCode::OK);
}

// ============================================================================
// Subscriptions
// ============================================================================

#[tokio::test]
async fn test_subscribe_then_resubscribe_redirects() {
    let server = MockServer::start().await;
    mock_feed(&server, "/feed.xml", 200, FEED).await;
    let app = test_app(false).await;
    let url = format!("{}/feed.xml", server.uri());

    let (status, headers, json) = app.subscribe(&url).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["title"], "Mock Blog");
    assert_eq!(json["feed_type"], "rss");
    let id = json["id"].as_i64().unwrap();
    assert_eq!(
        headers[header::LOCATION],
        format!("/subscriptions/{}", id).as_str()
    );

    // The feed's current items are stored with the subscription
    let (status, articles) = app
        .get_json(&format!("/subscriptions/{}/articles", id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(articles.as_array().unwrap().len(), 2);

    let (status, headers, _) = app.subscribe(&url).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(
        headers[header::LOCATION],
        format!("/subscriptions/{}", id).as_str()
    );

    let (_, all) = app.get_json("/subscriptions").await;
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_subscribe_to_missing_feed_is_bad_request() {
    let server = MockServer::start().await;
    mock_feed(&server, "/missing.xml", 404, "").await;
    let app = test_app(false).await;

    let (status, _, json) = app
        .subscribe(&format!("{}/missing.xml", server.uri()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_subscribe_rejects_non_http_url() {
    let app = test_app(false).await;
    let (status, _, _) = app.subscribe("file:///etc/passwd").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_subscribe_rejects_malformed_body() {
    let app = test_app(false).await;
    let (status, _, _) = app
        .send(
            app.request("POST", "/subscribe")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_feed_info_reports_existing_subscription() {
    let server = MockServer::start().await;
    mock_feed(&server, "/feed.xml", 200, FEED).await;
    let app = test_app(false).await;
    let url = format!("{}/feed.xml", server.uri());

    let (status, info) = app.get_json(&format!("/feedinfo?url={}", url)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["title"], "Mock Blog");
    assert_eq!(info["link"], "https://blog.example.com/");
    assert!(info["id"].is_null());

    let (_, _, created) = app.subscribe(&url).await;
    let (_, info) = app.get_json(&format!("/feedinfo?url={}", url)).await;
    assert_eq!(info["id"], created["id"]);
}

#[tokio::test]
async fn test_unknown_subscription_is_not_found() {
    let app = test_app(false).await;
    let (status, json) = app.get_json("/subscriptions/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");

    let (status, _) = app.get_json("/subscriptions/999/articles").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Articles
// ============================================================================

async fn subscribed_app(server: &MockServer) -> (TestApp, Vec<i64>) {
    mock_feed(server, "/feed.xml", 200, FEED).await;
    let app = test_app(false).await;
    let (_, _, created) = app.subscribe(&format!("{}/feed.xml", server.uri())).await;
    let id = created["id"].as_i64().unwrap();

    let (_, articles) = app
        .get_json(&format!("/subscriptions/{}/articles", id))
        .await;
    let ids = articles
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_i64().unwrap())
        .collect();
    (app, ids)
}

#[tokio::test]
async fn test_mark_read_is_idempotent() {
    let server = MockServer::start().await;
    let (app, ids) = subscribed_app(&server).await;

    let (_, unread) = app.get_json("/unread").await;
    assert_eq!(unread.as_array().unwrap().len(), 2);
    assert_eq!(unread[0]["subscription"]["title"], "Mock Blog");

    let uri = format!("/articles/{}/markread", ids[0]);
    assert_eq!(app.post(&uri).await, StatusCode::NO_CONTENT);
    assert_eq!(app.post(&uri).await, StatusCode::NO_CONTENT);

    let (_, article) = app.get_json(&format!("/articles/{}", ids[0])).await;
    assert_eq!(article["is_new"], false);

    let (_, unread) = app.get_json("/unread").await;
    assert_eq!(unread.as_array().unwrap().len(), 1);

    assert_eq!(app.post("/articles/999/markread").await, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_read_later_queue() {
    let server = MockServer::start().await;
    let (app, ids) = subscribed_app(&server).await;

    // Removing an article that is not queued is a 404
    let uri = format!("/articles/{}/readlater", ids[0]);
    assert_eq!(app.delete(&uri).await, StatusCode::NOT_FOUND);

    assert_eq!(app.post(&uri).await, StatusCode::NO_CONTENT);
    let (status, queue) = app.get_json("/readlater").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue.as_array().unwrap().len(), 1);
    assert_eq!(queue[0]["id"], ids[0]);
    assert_eq!(queue[0]["is_read_later"], true);

    let (_, page) = app.get_json("/readlater?page=2&limit=1").await;
    assert!(page.as_array().unwrap().is_empty());

    assert_eq!(app.delete(&uri).await, StatusCode::NO_CONTENT);
    let (_, queue) = app.get_json("/readlater").await;
    assert!(queue.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_mark_read_leaves_read_later_queue() {
    let server = MockServer::start().await;
    let (app, ids) = subscribed_app(&server).await;

    app.post(&format!("/articles/{}/readlater", ids[1])).await;
    app.post(&format!("/articles/{}/markread", ids[1])).await;

    let (_, queue) = app.get_json("/readlater").await;
    assert!(queue.as_array().unwrap().is_empty());
}

// ============================================================================
// Refresh
// ============================================================================

#[tokio::test]
async fn test_refresh_returns_new_articles() {
    let server = MockServer::start().await;
    let (app, _) = subscribed_app(&server).await;

    // Everything was stored at subscribe time
    let (_, _, body) = app
        .send(app.request("POST", "/refresh").body(Body::empty()).unwrap())
        .await;
    let fresh: Value = serde_json::from_slice(&body).unwrap();
    assert!(fresh.as_array().unwrap().is_empty());

    server.reset().await;
    let updated = FEED.replace(
        "<item><title>One</title>",
        "<item><title>Three</title><link>https://blog.example.com/3</link></item><item><title>One</title>",
    );
    mock_feed(&server, "/feed.xml", 200, &updated).await;

    let (status, _, body) = app
        .send(app.request("POST", "/refresh").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    let fresh: Value = serde_json::from_slice(&body).unwrap();
    let fresh = fresh.as_array().unwrap();
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0]["url"], "https://blog.example.com/3");
    assert_eq!(fresh[0]["is_new"], true);
}

#[tokio::test]
async fn test_refresh_failure_is_internal_error() {
    let server = MockServer::start().await;
    mock_feed(&server, "/gone.xml", 404, "").await;
    let app = test_app_with_policy(false, RefreshPolicy::FailFast).await;
    app.db
        .insert_subscription(&NewSubscription {
            feed_type: "rss".into(),
            url: format!("{}/gone.xml", server.uri()),
            title: "Gone".into(),
            description: None,
            thumbnail: None,
        })
        .await
        .unwrap();

    let (status, _, body) = app
        .send(app.request("POST", "/refresh").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["code"], "INTERNAL_ERROR");
}

#[tokio::test]
async fn test_refresh_isolates_missing_feed() {
    let server = MockServer::start().await;
    mock_feed(&server, "/gone.xml", 404, "").await;
    let app = test_app(false).await;
    app.db
        .insert_subscription(&NewSubscription {
            feed_type: "rss".into(),
            url: format!("{}/gone.xml", server.uri()),
            title: "Gone".into(),
            description: None,
            thumbnail: None,
        })
        .await
        .unwrap();

    let (status, _, body) = app
        .send(app.request("POST", "/refresh").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    let fresh: Value = serde_json::from_slice(&body).unwrap();
    assert!(fresh.as_array().unwrap().is_empty());
}
