//! Integration tests for the refresh lifecycle against a mock HTTP feed server.
//!
//! Each test creates its own in-memory SQLite database and wiremock server.
//! The feed content served by the mock is swapped between passes to simulate
//! a site publishing new items.

use feedbox::feed::{FetchError, HttpFeedSource, RefreshError, RefreshPolicy, Refresher};
use feedbox::storage::{Database, NewSubscription, Subscription};
use pretty_assertions::assert_eq;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rss(items: &[(&str, Option<&str>)]) -> String {
    let body: String = items
        .iter()
        .map(|(link, pub_date)| {
            let date = pub_date
                .map(|d| format!("<pubDate>{}</pubDate>", d))
                .unwrap_or_default();
            format!(
                "<item><title>{link}</title><link>{link}</link>{date}</item>",
                link = link,
                date = date
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Mock</title>{}</channel></rss>"#,
        body
    )
}

async fn serve(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn subscribe(db: &Database, url: String) -> Subscription {
    db.insert_subscription(&NewSubscription {
        feed_type: "rss".into(),
        url,
        title: "Mock".into(),
        description: None,
        thumbnail: None,
    })
    .await
    .unwrap()
}

async fn setup() -> (Database, Refresher) {
    let db = Database::open(":memory:").await.unwrap();
    let source = HttpFeedSource::new(reqwest::Client::new())
        .with_max_retries(0)
        .with_retry_base(Duration::from_millis(10));
    let refresher = Refresher::new(db.clone(), source).with_fetch_timeout(Duration::from_secs(5));
    (db, refresher)
}

// ============================================================================
// Reconciliation
// ============================================================================

#[tokio::test]
async fn test_new_feed_items_appear_after_refresh() {
    let server = MockServer::start().await;
    let (db, refresher) = setup().await;
    let sub = subscribe(&db, format!("{}/feed", server.uri())).await;

    serve(
        &server,
        "/feed",
        rss(&[
            ("https://example.com/a", Some("Tue, 14 Nov 2023 22:13:20 GMT")),
            ("https://example.com/b", None),
        ]),
    )
    .await;

    let first = refresher.refresh_all().await.unwrap();
    assert_eq!(first.new_articles.len(), 2);
    assert_eq!(
        first.new_articles[0].created_at.timestamp(),
        1_700_000_000,
        "published date is kept"
    );

    // The site publishes "c" on top of the existing items
    server.reset().await;
    serve(
        &server,
        "/feed",
        rss(&[
            ("https://example.com/c", None),
            ("https://example.com/a", Some("Tue, 14 Nov 2023 22:13:20 GMT")),
            ("https://example.com/b", None),
        ]),
    )
    .await;

    let second = refresher.refresh_all().await.unwrap();
    let urls: Vec<&str> = second.new_articles.iter().map(|a| a.url.as_str()).collect();
    assert_eq!(urls, vec!["https://example.com/c"]);

    let stored = db.get_articles_for_subscription(sub.id).await.unwrap();
    assert_eq!(stored.len(), 3);

    let third = refresher.refresh_all().await.unwrap();
    assert!(third.new_articles.is_empty());
}

#[tokio::test]
async fn test_removed_items_are_kept() {
    let server = MockServer::start().await;
    let (db, refresher) = setup().await;
    let sub = subscribe(&db, format!("{}/feed", server.uri())).await;

    serve(&server, "/feed", rss(&[("https://example.com/old", None)])).await;
    refresher.refresh_all().await.unwrap();

    server.reset().await;
    serve(&server, "/feed", rss(&[("https://example.com/new", None)])).await;
    refresher.refresh_all().await.unwrap();

    let stored = db.get_articles_for_subscription(sub.id).await.unwrap();
    assert_eq!(stored.len(), 2);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_missing_feed_does_not_block_others() {
    let server = MockServer::start().await;
    let (db, refresher) = setup().await;
    subscribe(&db, format!("{}/good", server.uri())).await;
    let gone = subscribe(&db, format!("{}/gone", server.uri())).await;

    serve(&server, "/good", rss(&[("https://example.com/1", None)])).await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let report = refresher.refresh_all().await.unwrap();
    assert_eq!(report.new_articles.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].subscription_id, gone.id);
    assert!(report.failures[0].error.is_not_found());
}

#[tokio::test]
async fn test_fail_fast_reports_the_failing_feed() {
    let server = MockServer::start().await;
    let (db, refresher) = setup().await;
    let refresher = refresher.with_policy(RefreshPolicy::FailFast);
    let broken = subscribe(&db, format!("{}/broken", server.uri())).await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not a feed</html>"))
        .mount(&server)
        .await;

    match refresher.refresh_all().await {
        Err(RefreshError::Fetch {
            subscription_id,
            source: FetchError::Parse(_),
            ..
        }) => assert_eq!(subscription_id, broken.id),
        other => panic!("Expected a parse failure, got {:?}", other),
    }
    assert!(db.list_articles().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_slow_feed_is_cut_off() {
    let server = MockServer::start().await;
    let (db, refresher) = setup().await;
    let refresher = refresher.with_fetch_timeout(Duration::from_millis(200));
    subscribe(&db, format!("{}/slow", server.uri())).await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss(&[("https://example.com/1", None)]))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let report = refresher.refresh_all().await.unwrap();
    assert!(report.new_articles.is_empty());
    assert!(matches!(report.failures[0].error, FetchError::Timeout));
}
