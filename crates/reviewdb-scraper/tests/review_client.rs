//! Integration tests for `ReviewClient` and `ReviewPager`.
//!
//! Uses `wiremock` to stand in for both the storefront and the media API, so
//! no real network traffic is made. Page delay is zero and the retry backoff
//! is a few milliseconds so the suite runs on the real clock.

use std::time::Duration;

use futures::TryStreamExt;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reviewdb_core::AppRef;
use reviewdb_scraper::{
    ReviewClient, RetryPolicy, ScraperError, ScraperSettings, Token, TokenCache, TokenProvider,
};

const REVIEWS_PATH: &str = "/v1/catalog/us/apps/284882215/reviews";

fn test_settings(server: &MockServer) -> ScraperSettings {
    ScraperSettings {
        user_agents: vec!["reviewdb-test/0.1".to_owned()],
        page_delay: Duration::ZERO,
        retry: RetryPolicy::new(3, Duration::from_millis(5)),
        request_timeout_secs: 5,
        ..ScraperSettings::default()
    }
    .with_base_url(&server.uri())
}

fn seeded_tokens(settings: &ScraperSettings, token: &str) -> TokenCache {
    let provider = TokenProvider::new(settings).expect("failed to build TokenProvider");
    TokenCache::with_token(provider, Token::new(token))
}

fn facebook() -> AppRef {
    AppRef::new("us", "facebook", "284882215").unwrap()
}

/// A page of `count` reviews whose ids start at `first_id`.
fn reviews_page(first_id: usize, count: usize, next_offset: Option<usize>) -> serde_json::Value {
    let data: Vec<_> = (first_id..first_id + count)
        .map(|id| {
            json!({
                "id": id.to_string(),
                "type": "user-reviews",
                "attributes": {
                    "date": format!("2024-01-01T00:00:{:02}Z", id % 60),
                    "review": format!("review body {id}"),
                    "rating": (id % 5) + 1,
                    "isEdited": false,
                    "userName": format!("user-{id}"),
                    "title": format!("title {id}")
                }
            })
        })
        .collect();

    let next = next_offset.map(|offset| {
        format!("/v1/catalog/us/apps/284882215/reviews?l=en-GB&offset={offset}&platform=web")
    });
    json!({ "data": data, "next": next })
}

async fn mount_page(server: &MockServer, offset: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(REVIEWS_PATH))
        .and(query_param("offset", offset))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn landing_html(token: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n\
         <meta name=\"web-experience-app/config/environment\" content=\"%7B%22MEDIA_API%22%3A%7B%22token%22%3A%22{token}%22%7D%7D\">\n\
         </head>\n</html>\n"
    )
}

// ---------------------------------------------------------------------------
// Multi-page walk
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_all_reviews_concatenates_pages_in_order() {
    let server = MockServer::start().await;
    mount_page(&server, "1", reviews_page(1, 20, Some(21))).await;
    mount_page(&server, "21", reviews_page(21, 20, Some(41))).await;
    mount_page(&server, "41", reviews_page(41, 7, None)).await;

    let settings = test_settings(&server);
    let tokens = seeded_tokens(&settings, "test-token");
    let client = ReviewClient::new(settings).unwrap();

    let reviews = client
        .fetch_all_reviews(&tokens, facebook(), 1_000)
        .await
        .expect("fetch should succeed");

    assert_eq!(reviews.len(), 47);
    let ids: Vec<_> = reviews
        .iter()
        .map(|r| r.review_id.clone().unwrap())
        .collect();
    let expected: Vec<_> = (1..=47).map(|id| id.to_string()).collect();
    assert_eq!(ids, expected, "page order must be preserved");
    assert!(reviews.iter().all(|r| r.app_id == "284882215"));
}

#[tokio::test]
async fn pager_requests_strictly_increasing_offsets() {
    let server = MockServer::start().await;
    mount_page(&server, "1", reviews_page(1, 20, Some(21))).await;
    mount_page(&server, "21", reviews_page(21, 20, Some(41))).await;
    mount_page(&server, "41", reviews_page(41, 20, None)).await;

    let settings = test_settings(&server);
    let tokens = seeded_tokens(&settings, "test-token");
    let client = ReviewClient::new(settings).unwrap();
    let mut pager = client.pager(&tokens, facebook());

    let mut cursors = Vec::new();
    while let Some(page) = pager.next_page().await.unwrap() {
        cursors.push(page.cursor.clone());
    }

    assert_eq!(cursors, vec!["1", "21", "41"]);
    assert_eq!(pager.yielded(), 60);
    assert!(pager.cursor().is_none());

    let offsets: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter_map(|req| {
            req.url
                .query_pairs()
                .find(|(k, _)| k == "offset")
                .map(|(_, v)| v.into_owned())
        })
        .collect();
    assert_eq!(offsets, vec!["1", "21", "41"]);
}

#[tokio::test]
async fn request_carries_auth_and_browser_headers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(REVIEWS_PATH))
        .and(header("authorization", "bearer test-token"))
        .and(header("accept", "application/json"))
        .and(header("user-agent", "reviewdb-test/0.1"))
        .and(header(
            "referer",
            format!("{}/us/app/facebook/id284882215", server.uri()).as_str(),
        ))
        .and(query_param("limit", "20"))
        .and(query_param("platform", "web"))
        .and(query_param("additionalPlatforms", "appletv,ipad,iphone,mac"))
        .and(query_param("l", "en-GB"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reviews_page(1, 3, None)))
        .expect(1)
        .mount(&server)
        .await;

    let settings = test_settings(&server);
    let tokens = seeded_tokens(&settings, "test-token");
    let client = ReviewClient::new(settings).unwrap();

    let reviews = client
        .fetch_all_reviews(&tokens, facebook(), 1_000)
        .await
        .unwrap();
    assert_eq!(reviews.len(), 3);
}

#[tokio::test]
async fn into_stream_yields_reviews_across_pages() {
    let server = MockServer::start().await;
    mount_page(&server, "1", reviews_page(1, 20, Some(21))).await;
    mount_page(&server, "21", reviews_page(21, 5, None)).await;

    let settings = test_settings(&server);
    let tokens = seeded_tokens(&settings, "test-token");
    let client = ReviewClient::new(settings).unwrap();

    let reviews: Vec<_> = client
        .pager(&tokens, facebook())
        .into_stream()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(reviews.len(), 25);
}

#[tokio::test]
async fn resume_from_starts_at_given_offset() {
    let server = MockServer::start().await;
    mount_page(&server, "41", reviews_page(41, 4, None)).await;

    let settings = test_settings(&server);
    let tokens = seeded_tokens(&settings, "test-token");
    let client = ReviewClient::new(settings).unwrap();

    let mut pager = client.pager(&tokens, facebook()).resume_from("41");
    let page = pager.next_page().await.unwrap().expect("one page");
    assert_eq!(page.cursor, "41");
    assert_eq!(page.reviews.len(), 4);
    assert!(pager.next_page().await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Termination
// ---------------------------------------------------------------------------

#[tokio::test]
async fn not_found_ends_stream_without_error() {
    let server = MockServer::start().await;
    mount_page(&server, "1", reviews_page(1, 20, Some(21))).await;

    Mock::given(method("GET"))
        .and(path(REVIEWS_PATH))
        .and(query_param("offset", "21"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let settings = test_settings(&server);
    let tokens = seeded_tokens(&settings, "test-token");
    let client = ReviewClient::new(settings).unwrap();

    let reviews = client
        .fetch_all_reviews(&tokens, facebook(), 1_000)
        .await
        .expect("404 must end the stream, not fail it");
    assert_eq!(reviews.len(), 20);
}

#[tokio::test]
async fn not_found_on_first_page_yields_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REVIEWS_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let settings = test_settings(&server);
    let tokens = seeded_tokens(&settings, "test-token");
    let client = ReviewClient::new(settings).unwrap();

    let reviews = client
        .fetch_all_reviews(&tokens, facebook(), 1_000)
        .await
        .unwrap();
    assert!(reviews.is_empty());
}

#[tokio::test]
async fn max_records_truncates_final_page() {
    let server = MockServer::start().await;
    mount_page(&server, "1", reviews_page(1, 20, Some(21))).await;
    mount_page(&server, "21", reviews_page(21, 20, Some(41))).await;

    Mock::given(method("GET"))
        .and(path(REVIEWS_PATH))
        .and(query_param("offset", "41"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reviews_page(41, 20, None)))
        .expect(0)
        .mount(&server)
        .await;

    let settings = test_settings(&server);
    let tokens = seeded_tokens(&settings, "test-token");
    let client = ReviewClient::new(settings).unwrap();

    let reviews = client
        .fetch_all_reviews(&tokens, facebook(), 25)
        .await
        .unwrap();
    assert_eq!(reviews.len(), 25);
    assert_eq!(reviews.last().unwrap().review_id.as_deref(), Some("25"));
}

#[tokio::test]
async fn zero_max_records_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reviews_page(1, 20, None)))
        .expect(0)
        .mount(&server)
        .await;

    let settings = test_settings(&server);
    let tokens = seeded_tokens(&settings, "test-token");
    let client = ReviewClient::new(settings).unwrap();

    let reviews = client
        .fetch_all_reviews(&tokens, facebook(), 0)
        .await
        .unwrap();
    assert!(reviews.is_empty());
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rate_limit_on_third_page_is_retried_at_same_offset() {
    let server = MockServer::start().await;
    mount_page(&server, "1", reviews_page(1, 20, Some(21))).await;
    mount_page(&server, "21", reviews_page(21, 20, Some(41))).await;

    Mock::given(method("GET"))
        .and(path(REVIEWS_PATH))
        .and(query_param("offset", "41"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_page(&server, "41", reviews_page(41, 10, None)).await;

    let settings = test_settings(&server);
    let tokens = seeded_tokens(&settings, "test-token");
    let client = ReviewClient::new(settings).unwrap();

    let reviews = client
        .fetch_all_reviews(&tokens, facebook(), 1_000)
        .await
        .expect("a single 429 must be absorbed by the retry policy");
    assert_eq!(reviews.len(), 50);

    let third_page_requests = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|req| req.url.query_pairs().any(|(k, v)| k == "offset" && v == "41"))
        .count();
    assert_eq!(third_page_requests, 2, "429 must re-issue the same offset");
}

#[tokio::test]
async fn sustained_rate_limit_exhausts_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REVIEWS_PATH))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let settings = test_settings(&server);
    let tokens = seeded_tokens(&settings, "test-token");
    let client = ReviewClient::new(settings).unwrap();

    let err = client
        .fetch_all_reviews(&tokens, facebook(), 1_000)
        .await
        .unwrap_err();
    match err {
        ScraperError::RateLimitExhausted { attempts, context } => {
            assert_eq!(attempts, 3);
            assert!(context.contains("284882215"), "context: {context}");
            assert!(context.contains("offset 1"), "context: {context}");
        }
        other => panic!("expected RateLimitExhausted, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Token refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unauthorized_triggers_one_token_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(REVIEWS_PATH))
        .and(header("authorization", "bearer stale-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(REVIEWS_PATH))
        .and(header("authorization", "bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reviews_page(1, 2, None)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/us/app/facebook/id284882215"))
        .respond_with(ResponseTemplate::new(200).set_body_string(landing_html("fresh-token")))
        .expect(1)
        .mount(&server)
        .await;

    let settings = test_settings(&server);
    let tokens = seeded_tokens(&settings, "stale-token");
    let client = ReviewClient::new(settings).unwrap();

    let reviews = client
        .fetch_all_reviews(&tokens, facebook(), 1_000)
        .await
        .expect("refreshed token should succeed");
    assert_eq!(reviews.len(), 2);
}

#[tokio::test]
async fn second_auth_failure_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(REVIEWS_PATH))
        .respond_with(ResponseTemplate::new(403))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/us/app/facebook/id284882215"))
        .respond_with(ResponseTemplate::new(200).set_body_string(landing_html("also-rejected")))
        .mount(&server)
        .await;

    let settings = test_settings(&server);
    let tokens = seeded_tokens(&settings, "stale-token");
    let client = ReviewClient::new(settings).unwrap();

    let err = client
        .fetch_all_reviews(&tokens, facebook(), 1_000)
        .await
        .unwrap_err();
    assert!(
        matches!(err, ScraperError::Unauthorized { status: 403, .. }),
        "expected Unauthorized(403), got {err:?}"
    );
}

// ---------------------------------------------------------------------------
// Fatal errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn server_error_is_fatal_and_keeps_failing_cursor() {
    let server = MockServer::start().await;
    mount_page(&server, "1", reviews_page(1, 20, Some(21))).await;
    Mock::given(method("GET"))
        .and(path(REVIEWS_PATH))
        .and(query_param("offset", "21"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let settings = test_settings(&server);
    let tokens = seeded_tokens(&settings, "test-token");
    let client = ReviewClient::new(settings).unwrap();
    let mut pager = client.pager(&tokens, facebook());

    assert_eq!(pager.next_page().await.unwrap().unwrap().reviews.len(), 20);
    let err = pager.next_page().await.unwrap_err();
    assert!(
        matches!(err, ScraperError::UnexpectedStatus { status: 500, .. }),
        "expected UnexpectedStatus(500), got {err:?}"
    );
    assert_eq!(pager.cursor(), Some("21"));
    assert_eq!(pager.yielded(), 20);
}

#[tokio::test]
async fn malformed_body_is_a_deserialize_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REVIEWS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let settings = test_settings(&server);
    let tokens = seeded_tokens(&settings, "test-token");
    let client = ReviewClient::new(settings).unwrap();

    let err = client
        .fetch_all_reviews(&tokens, facebook(), 1_000)
        .await
        .unwrap_err();
    assert!(
        matches!(err, ScraperError::Deserialize { .. }),
        "expected Deserialize, got {err:?}"
    );
}

#[tokio::test]
async fn repeated_cursor_is_rejected() {
    let server = MockServer::start().await;
    mount_page(&server, "1", reviews_page(1, 20, Some(1))).await;

    let settings = test_settings(&server);
    let tokens = seeded_tokens(&settings, "test-token");
    let client = ReviewClient::new(settings).unwrap();

    let err = client
        .fetch_all_reviews(&tokens, facebook(), 1_000)
        .await
        .unwrap_err();
    match err {
        ScraperError::CursorCycle { app_id, cursor } => {
            assert_eq!(app_id, "284882215");
            assert_eq!(cursor, "1");
        }
        other => panic!("expected CursorCycle, got {other:?}"),
    }
}

#[tokio::test]
async fn transport_failure_is_http_error() {
    // Nothing listens on the discard port.
    let settings = ScraperSettings {
        page_delay: Duration::ZERO,
        request_timeout_secs: 2,
        ..ScraperSettings::default()
    }
    .with_base_url("http://127.0.0.1:9");
    let tokens = seeded_tokens(&settings, "test-token");
    let client = ReviewClient::new(settings).unwrap();

    let err = client
        .fetch_all_reviews(&tokens, facebook(), 1_000)
        .await
        .unwrap_err();
    assert!(
        matches!(err, ScraperError::Http(_)),
        "expected Http, got {err:?}"
    );
}
