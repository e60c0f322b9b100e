//! End-to-end pipeline tests: fetch → parse → reconcile against a live mock
//! origin and an in-memory database per test.
//!
//! These exercise the properties the engine actually promises: idempotent
//! re-ingestion, canonical-URL dedup across redirects, and sweep-level
//! isolation of per-feed failures.

use std::sync::Arc;
use std::time::Duration;

use feedmill::engine::{Engine, IngestOutcome, IngestRequest, Subscriber};
use feedmill::feed::Fetcher;
use feedmill::ratelimit::RateLimiter;
use feedmill::storage::Database;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RSS_TWO_ITEMS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Example Feed</title>
  <link>https://example.com/</link>
  <item><guid>a</guid><title>Alpha</title><link>https://example.com/a</link></item>
  <item><guid>b</guid><title>Beta</title><link>https://example.com/b</link></item>
</channel></rss>"#;

const RSS_THREE_ITEMS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Example Feed</title>
  <link>https://example.com/</link>
  <item><guid>a</guid><title>Alpha</title></item>
  <item><guid>b</guid><title>Beta</title></item>
  <item><guid>c</guid><title>Gamma</title></item>
</channel></rss>"#;

fn engine_with(db: Database, refresh_interval: Duration) -> Engine {
    let fetcher =
        Fetcher::new_allowing_private_networks(Duration::from_secs(1), 1024 * 1024).unwrap();
    let limiter = Arc::new(RateLimiter::new(Duration::from_secs(60), 1000));
    Engine::new(db, fetcher, limiter, refresh_interval, 4)
}

async fn subscribe(engine: &Engine, url: &str, user: Option<&str>) -> (i64, usize) {
    let outcome = engine
        .invoke(
            "caller",
            IngestRequest::SubscribeUrl {
                feed_url: url.to_string(),
                subscriber: user.map(|user_id| Subscriber {
                    user_id: user_id.to_string(),
                    folder_id: None,
                }),
            },
        )
        .await
        .unwrap();
    match outcome {
        IngestOutcome::Subscribed { feed, new_articles } => (feed.id, new_articles),
        other => panic!("expected Subscribed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_subscribe_stores_feed_articles_and_subscription() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RSS_TWO_ITEMS))
        .mount(&mock_server)
        .await;

    let db = Database::open(":memory:").await.unwrap();
    let engine = engine_with(db.clone(), Duration::from_secs(900));

    let (feed_id, new_articles) =
        subscribe(&engine, &format!("{}/feed", mock_server.uri()), Some("user-1")).await;

    assert_eq!(new_articles, 2);
    assert_eq!(db.count_articles(feed_id).await.unwrap(), 2);

    let feed = db.get_feed(feed_id).await.unwrap().unwrap();
    assert_eq!(feed.title, "Example Feed");
    assert_eq!(feed.site_url.as_deref(), Some("https://example.com/"));
    assert!(feed.last_fetched_at.is_some());

    let sub = db.get_subscription("user-1", feed_id).await.unwrap().unwrap();
    assert_eq!(sub.feed_id, feed_id);
}

#[tokio::test]
async fn test_repeat_ingestion_is_idempotent() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RSS_TWO_ITEMS))
        .mount(&mock_server)
        .await;

    let db = Database::open(":memory:").await.unwrap();
    let engine = engine_with(db.clone(), Duration::from_secs(900));
    let url = format!("{}/feed", mock_server.uri());

    let (feed_id, first) = subscribe(&engine, &url, None).await;
    assert_eq!(first, 2);

    // Second run over the same document: zero net new rows
    let (second_id, second) = subscribe(&engine, &url, None).await;
    assert_eq!(second_id, feed_id);
    assert_eq!(second, 0);
    assert_eq!(db.count_articles(feed_id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_targeted_refresh_picks_up_new_items() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RSS_TWO_ITEMS))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RSS_THREE_ITEMS))
        .mount(&mock_server)
        .await;

    let db = Database::open(":memory:").await.unwrap();
    let engine = engine_with(db.clone(), Duration::from_secs(900));

    let (feed_id, _) = subscribe(&engine, &format!("{}/feed", mock_server.uri()), None).await;

    let outcome = engine
        .invoke("caller", IngestRequest::RefreshFeed { feed_id })
        .await
        .unwrap();
    let IngestOutcome::Refreshed {
        feed_id: refreshed_id,
        new_articles,
    } = outcome
    else {
        panic!("expected Refreshed outcome");
    };

    assert_eq!(refreshed_id, feed_id);
    // Only the item that was not already stored counts
    assert_eq!(new_articles, 1);
    assert_eq!(db.count_articles(feed_id).await.unwrap(), 3);
}

#[tokio::test]
async fn test_redirected_aliases_resolve_to_one_feed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/canonical"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/canonical"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RSS_TWO_ITEMS))
        .mount(&mock_server)
        .await;

    let db = Database::open(":memory:").await.unwrap();
    let engine = engine_with(db.clone(), Duration::from_secs(900));

    // Subscribe via the alias, then via the canonical URL directly
    let (id_via_alias, _) = subscribe(&engine, &format!("{}/old", mock_server.uri()), None).await;
    let (id_direct, _) =
        subscribe(&engine, &format!("{}/canonical", mock_server.uri()), None).await;

    assert_eq!(id_via_alias, id_direct);

    // Only the canonical URL exists as a feed row; the alias never does
    let canonical = format!("{}/canonical", mock_server.uri());
    let feed = db.get_feed_by_url(&canonical).await.unwrap().unwrap();
    assert_eq!(feed.id, id_direct);
    assert!(db
        .get_feed_by_url(&format!("{}/old", mock_server.uri()))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_sweep_isolates_failing_feed() {
    let mock_server = MockServer::start().await;

    for feed_path in ["/one", "/two", "/three"] {
        Mock::given(method("GET"))
            .and(path(feed_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS_TWO_ITEMS))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
    }
    // After subscription, /one and /three keep answering; /two hangs past
    // the 1s fetch budget
    Mock::given(method("GET"))
        .and(path("/two"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(RSS_TWO_ITEMS)
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RSS_THREE_ITEMS))
        .mount(&mock_server)
        .await;

    let db = Database::open(":memory:").await.unwrap();
    // Zero refresh interval: everything already fetched becomes due as soon
    // as the clock moves past its last fetch second
    let engine = engine_with(db.clone(), Duration::ZERO);

    let (_id1, _) = subscribe(&engine, &format!("{}/one", mock_server.uri()), None).await;
    let (id2, _) = subscribe(&engine, &format!("{}/two", mock_server.uri()), None).await;
    let (_id3, _) = subscribe(&engine, &format!("{}/three", mock_server.uri()), None).await;

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let outcome = engine.invoke("caller", IngestRequest::Sweep).await.unwrap();
    let IngestOutcome::Swept { results } = outcome else {
        panic!("expected Swept outcome");
    };

    assert_eq!(results.len(), 3);

    let failures: Vec<_> = results.iter().filter(|entry| !entry.success).collect();
    assert_eq!(failures.len(), 1, "exactly one feed should fail: {results:?}");
    assert_eq!(failures[0].feed_id, id2);
    assert!(failures[0].error.is_some());

    for entry in results.iter().filter(|entry| entry.success) {
        assert_eq!(entry.article_count, Some(1));
    }
}

#[tokio::test]
async fn test_sweep_skips_fresh_feeds() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RSS_TWO_ITEMS))
        .mount(&mock_server)
        .await;

    let db = Database::open(":memory:").await.unwrap();
    let engine = engine_with(db.clone(), Duration::from_secs(900));

    subscribe(&engine, &format!("{}/feed", mock_server.uri()), None).await;

    // Just fetched, nothing is due
    let results = engine.sweep().await.unwrap();
    assert!(results.is_empty());
}
